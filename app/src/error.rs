use brsense_core::error::DocumentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DBError {
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Did not find device: {0}")]
    DeviceNotFound(String),
}

#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("Invalid or missing uplink token (source ip: {0})")]
    Unauthorized(String),
    #[error("Bad payload: {0}")]
    Document(#[from] DocumentError),
}
