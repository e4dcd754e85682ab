use super::{ReadingBatch, ReadingStore, RequestAudit};
use crate::error::DBError;
use crate::models::device::DeviceDao;
use crate::models::reading::ReadingDao;
use crate::models::request_log::RequestStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryState {
    pub devices: Vec<DeviceDao>,
    pub readings: Vec<ReadingDao>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RequestRecord {
    pub client_ip: String,
    pub raw_body: String,
    pub status: RequestStatus,
    pub log_message: Option<String>,
}

/// Transactional stand-in for Postgres: a batch works on a copy of the state
/// and swaps it in on commit.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    requests: Mutex<Vec<RequestRecord>>,
    fail_begin: bool,
    fail_commit: bool,
    fail_readings_for: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_begin() -> Self {
        MemoryStore {
            fail_begin: true,
            ..Self::default()
        }
    }

    pub fn failing_commit() -> Self {
        MemoryStore {
            fail_commit: true,
            ..Self::default()
        }
    }

    /// Every reading of the given esn fails to persist
    pub fn failing_readings_for(esn: &str) -> Self {
        MemoryStore {
            fail_readings_for: Some(esn.to_owned()),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().clone()
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().clone()
    }
}

fn injected(reason: &str) -> DBError {
    DBError::SQLError(sqlx::Error::Protocol(reason.to_owned()))
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReadingBatch>, DBError> {
        if self.fail_begin {
            return Err(DBError::SQLError(sqlx::Error::PoolTimedOut));
        }
        Ok(Box::new(MemoryBatch {
            store: self.state.clone(),
            staged: self.state.lock().clone(),
            savepoint: None,
            fail_commit: self.fail_commit,
            fail_readings_for: self.fail_readings_for.clone(),
        }))
    }

    async fn device_count(&self) -> Result<i64, DBError> {
        Ok(self.state.lock().devices.len() as i64)
    }
}

#[async_trait]
impl RequestAudit for MemoryStore {
    async fn open(&self, client_ip: &str, raw_body: &str) -> Result<i32, DBError> {
        let mut requests = self.requests.lock();
        requests.push(RequestRecord {
            client_ip: client_ip.to_owned(),
            raw_body: raw_body.to_owned(),
            status: RequestStatus::Processing,
            log_message: None,
        });
        Ok(requests.len() as i32)
    }

    async fn close(
        &self,
        request_id: i32,
        status: RequestStatus,
        log_message: &str,
    ) -> Result<(), DBError> {
        let mut requests = self.requests.lock();
        let record = requests
            .get_mut(request_id as usize - 1)
            .ok_or_else(|| injected("unknown request"))?;
        record.status = status;
        record.log_message = Some(log_message.to_owned());
        Ok(())
    }
}

struct MemoryBatch {
    store: Arc<Mutex<MemoryState>>,
    staged: MemoryState,
    savepoint: Option<MemoryState>,
    fail_commit: bool,
    fail_readings_for: Option<String>,
}

#[async_trait]
impl ReadingBatch for MemoryBatch {
    async fn find_device(&mut self, esn: &str) -> Result<Option<DeviceDao>, DBError> {
        Ok(self.staged.devices.iter().find(|d| d.esn() == esn).cloned())
    }

    async fn save_device(
        &mut self,
        esn: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<DeviceDao, DBError> {
        if let Some(device) = self.find_device(esn).await? {
            return Ok(device);
        }
        let device = DeviceDao {
            id: self.staged.devices.len() as i32 + 1,
            esn: esn.to_owned(),
            name: Some(name.to_owned()),
            updated_at: now.naive_utc(),
        };
        self.staged.devices.push(device.clone());
        Ok(device)
    }

    async fn touch_device(&mut self, device_id: i32, now: DateTime<Utc>) -> Result<(), DBError> {
        let device = self
            .staged
            .devices
            .iter_mut()
            .find(|d| d.id() == device_id)
            .ok_or_else(|| DBError::DeviceNotFound(device_id.to_string()))?;
        device.updated_at = now.naive_utc();
        Ok(())
    }

    async fn save_reading(&mut self, reading: &ReadingDao) -> Result<(), DBError> {
        if let Some(esn) = &self.fail_readings_for {
            let owner = self
                .staged
                .devices
                .iter()
                .find(|d| d.id() == reading.device_id);
            if owner.map(|d| d.esn() == esn).unwrap_or(false) {
                return Err(injected("reading rejected"));
            }
        }
        self.staged.readings.push(reading.clone());
        Ok(())
    }

    async fn begin_message(&mut self) -> Result<(), DBError> {
        self.savepoint = Some(self.staged.clone());
        Ok(())
    }

    async fn release_message(&mut self) -> Result<(), DBError> {
        self.savepoint = None;
        Ok(())
    }

    async fn rollback_message(&mut self) -> Result<(), DBError> {
        if let Some(savepoint) = self.savepoint.take() {
            self.staged = savepoint;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DBError> {
        if self.fail_commit {
            return Err(injected("commit rejected"));
        }
        let MemoryBatch { store, staged, .. } = *self;
        *store.lock() = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DBError> {
        Ok(())
    }
}
