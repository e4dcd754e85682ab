use crate::error::DBError;
use chrono::NaiveDateTime;
use sqlx::PgConnection;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct DeviceDao {
    pub(crate) id: i32,
    pub(crate) esn: String,
    pub(crate) name: Option<String>,
    pub(crate) updated_at: NaiveDateTime,
}

impl DeviceDao {
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn esn(&self) -> &str {
        &self.esn
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }
}

pub fn default_name(esn: &str) -> String {
    format!("Sonda {}", esn)
}

pub async fn find_by_esn(conn: &mut PgConnection, esn: &str) -> Result<Option<DeviceDao>, DBError> {
    Ok(
        sql_stmnt!(DeviceDao, "SELECT * FROM device WHERE esn = $1", esn)
            .fetch_optional(conn)
            .await?,
    )
}

/// Creates the device unless it already exists, returns the stored row either
/// way. Concurrent deliveries for the same esn end up with the same row.
pub async fn insert_or_fetch(
    conn: &mut PgConnection,
    esn: &str,
    name: &str,
    now: NaiveDateTime,
) -> Result<DeviceDao, DBError> {
    sql_stmnt!(
        "INSERT INTO device (esn, name, created_at, updated_at) VALUES ($1, $2, $3, $3) \
         ON CONFLICT (esn) DO NOTHING",
        esn,
        name,
        now
    )
    .execute(&mut *conn)
    .await?;

    find_by_esn(conn, esn)
        .await?
        .ok_or_else(|| DBError::DeviceNotFound(esn.to_owned()))
}

pub async fn touch(conn: &mut PgConnection, device_id: i32, now: NaiveDateTime) -> Result<(), DBError> {
    sql_stmnt!(
        "UPDATE device SET updated_at = $2 WHERE id = $1",
        device_id,
        now
    )
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn delete(conn: &mut PgConnection, esn: &str) -> Result<(), DBError> {
    sql_stmnt!("DELETE FROM device WHERE esn = $1", esn)
        .execute(conn)
        .await?;
    Ok(())
}
