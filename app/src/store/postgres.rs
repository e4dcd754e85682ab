use super::{ReadingBatch, ReadingStore, RequestAudit};
use crate::error::DBError;
use crate::models::{
    self,
    device::{self, DeviceDao},
    reading::{self, ReadingDao},
    request_log::{self, RequestStatus},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

const MESSAGE_SAVEPOINT: &str = "ingest_message";

#[derive(Clone, Debug)]
pub struct PgStore {
    db_conn: PgPool,
}

impl PgStore {
    pub fn new(db_conn: PgPool) -> Self {
        PgStore { db_conn }
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn ReadingBatch>, DBError> {
        let tx = self.db_conn.begin().await?;
        Ok(Box::new(PgBatch { tx }))
    }

    async fn device_count(&self) -> Result<i64, DBError> {
        models::check_schema(&self.db_conn).await
    }
}

#[async_trait]
impl RequestAudit for PgStore {
    async fn open(&self, client_ip: &str, raw_body: &str) -> Result<i32, DBError> {
        request_log::insert(&self.db_conn, client_ip, raw_body, Utc::now().naive_utc()).await
    }

    async fn close(
        &self,
        request_id: i32,
        status: RequestStatus,
        log_message: &str,
    ) -> Result<(), DBError> {
        request_log::finish(&self.db_conn, request_id, status, log_message).await
    }
}

struct PgBatch {
    tx: Transaction<'static, Postgres>,
}

impl PgBatch {
    async fn savepoint_stmnt(&mut self, stmnt: &str) -> Result<(), DBError> {
        sqlx::query(&format!("{} {}", stmnt, MESSAGE_SAVEPOINT))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReadingBatch for PgBatch {
    async fn find_device(&mut self, esn: &str) -> Result<Option<DeviceDao>, DBError> {
        device::find_by_esn(&mut self.tx, esn).await
    }

    async fn save_device(
        &mut self,
        esn: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<DeviceDao, DBError> {
        device::insert_or_fetch(&mut self.tx, esn, name, now.naive_utc()).await
    }

    async fn touch_device(&mut self, device_id: i32, now: DateTime<Utc>) -> Result<(), DBError> {
        device::touch(&mut self.tx, device_id, now.naive_utc()).await
    }

    async fn save_reading(&mut self, reading: &ReadingDao) -> Result<(), DBError> {
        reading::insert(&mut self.tx, reading).await
    }

    async fn begin_message(&mut self) -> Result<(), DBError> {
        self.savepoint_stmnt("SAVEPOINT").await
    }

    async fn release_message(&mut self) -> Result<(), DBError> {
        self.savepoint_stmnt("RELEASE SAVEPOINT").await
    }

    async fn rollback_message(&mut self) -> Result<(), DBError> {
        self.savepoint_stmnt("ROLLBACK TO SAVEPOINT").await
    }

    async fn commit(self: Box<Self>) -> Result<(), DBError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DBError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
