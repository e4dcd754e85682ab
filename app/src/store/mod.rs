use crate::error::DBError;
use crate::models::device::DeviceDao;
use crate::models::reading::ReadingDao;
use crate::models::request_log::RequestStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod postgres;
pub use postgres::PgStore;

#[cfg(test)]
pub(crate) mod memory;

/// Source of ingestion batches
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Opens a batch, nothing written through it is visible before `commit`
    async fn begin(&self) -> Result<Box<dyn ReadingBatch>, DBError>;

    /// Liveness check, yields the number of known devices
    async fn device_count(&self) -> Result<i64, DBError>;
}

/// All writes of one delivery. Dropping a batch without committing discards it.
#[async_trait]
pub trait ReadingBatch: Send {
    async fn find_device(&mut self, esn: &str) -> Result<Option<DeviceDao>, DBError>;

    /// Insert-or-fetch, safe against a concurrent insert of the same esn
    async fn save_device(
        &mut self,
        esn: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<DeviceDao, DBError>;

    async fn touch_device(&mut self, device_id: i32, now: DateTime<Utc>) -> Result<(), DBError>;

    async fn save_reading(&mut self, reading: &ReadingDao) -> Result<(), DBError>;

    /// Marks the start of one message, see `rollback_message`
    async fn begin_message(&mut self) -> Result<(), DBError>;

    async fn release_message(&mut self) -> Result<(), DBError>;

    /// Discards everything written since `begin_message`
    async fn rollback_message(&mut self) -> Result<(), DBError>;

    async fn commit(self: Box<Self>) -> Result<(), DBError>;

    async fn rollback(self: Box<Self>) -> Result<(), DBError>;
}

/// Raw request audit trail, kept apart from the ingestion batch so a failed
/// batch still leaves its request behind.
#[async_trait]
pub trait RequestAudit: Send + Sync {
    async fn open(&self, client_ip: &str, raw_body: &str) -> Result<i32, DBError>;

    async fn close(
        &self,
        request_id: i32,
        status: RequestStatus,
        log_message: &str,
    ) -> Result<(), DBError>;
}
