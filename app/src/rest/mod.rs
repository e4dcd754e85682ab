use crate::error::UplinkError;
use crate::ingest::Ingestor;
use crate::store::RequestAudit;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::Filter;

mod doc_routes;
mod metric_routes;
mod uplink_routes;

pub use uplink_routes::UplinkGuard;

/// Everything a request handler needs, shared by all routes
pub struct UplinkContext {
    pub(crate) ingestor: Arc<Ingestor>,
    pub(crate) audit: Arc<dyn RequestAudit>,
    pub(crate) guard: UplinkGuard,
    pub(crate) max_body_bytes: u64,
}

impl UplinkContext {
    pub fn new(
        ingestor: Arc<Ingestor>,
        audit: Arc<dyn RequestAudit>,
        guard: UplinkGuard,
        max_body_bytes: u64,
    ) -> Arc<Self> {
        Arc::new(UplinkContext {
            ingestor,
            audit,
            guard,
            max_body_bytes,
        })
    }
}

pub fn routes(
    context: &Arc<UplinkContext>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    uplink_routes::routes(context)
        .or(metric_routes::routes(context))
        .or(doc_routes::routes())
}

pub async fn dispatch_server_daemon(context: Arc<UplinkContext>, port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed listening for shutdown signal: {}", e);
        }
        info!("Shutting down webserver");
    };

    let (bound, server) =
        warp::serve(routes(&context)).bind_with_graceful_shutdown(addr, shutdown);
    info!(addr = %bound, "Starting webserver");
    server.await;
}

fn build_response<T: serde::Serialize>(
    resp: Result<T, UplinkError>,
) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    match resp {
        Ok(data) => Ok(Box::new(warp::reply::json(&data))),
        Err(err) => Ok(error_response(&err)),
    }
}

fn error_response(err: &UplinkError) -> Box<dyn warp::Reply> {
    let status = match err {
        UplinkError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        UplinkError::Document(_) => StatusCode::BAD_REQUEST,
    };
    warn!("{}", err);
    let body = dto::ErrorResponseDto {
        error: err.to_string(),
    };
    Box::new(warp::reply::with_status(warp::reply::json(&body), status))
}

pub mod dto {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct ErrorResponseDto {
        pub error: String,
    }
}
