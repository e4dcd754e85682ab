mod config;
mod error;
mod ingest;
mod logging;
mod models;
mod rest;
mod store;

use brsense_core::SoilProbeDecoder;
use config::CONFIG;
use std::io;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
pub async fn main() -> io::Result<()> {
    let _tracer_provider = logging::init_tracing(CONFIG.log_level(), CONFIG.otel_stdout());
    for warning in CONFIG.warnings() {
        warn!("{}", warning);
    }

    let database_url = match CONFIG.database_url() {
        Some(url) => url,
        None => {
            error!("DATABASE_URL must be set");
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "DATABASE_URL must be set",
            ));
        }
    };

    let db_conn = models::establish_db_connection(database_url, CONFIG.db_max_connections())
        .await
        .map_err(|e| {
            error!("Failed connecting database: {}", e);
            io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
        })?;
    models::run_migrations(&db_conn).await.map_err(|e| {
        error!("Failed migrating database: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    info!("Database ready");

    let store = Arc::new(store::PgStore::new(db_conn));
    let decoder = SoilProbeDecoder::new(CONFIG.decoder_config());
    let ingestor = Arc::new(ingest::Ingestor::new(store.clone(), decoder));
    let guard = rest::UplinkGuard::new(
        CONFIG.uplink_shared_token().map(str::to_owned),
        CONFIG.uplink_allowed_ips(),
        CONFIG.uplink_trusted_proxies(),
    );
    if CONFIG.uplink_shared_token().is_none() {
        warn!("UPLINK_SHARED_TOKEN is not set, every sender is accepted");
    }

    let context = rest::UplinkContext::new(ingestor, store, guard, CONFIG.max_uplink_bytes());
    rest::dispatch_server_daemon(context, CONFIG.server_port()).await;
    Ok(())
}
