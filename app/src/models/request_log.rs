use crate::error::DBError;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Processing,
    Success,
    Error,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Processing => "PROCESSING",
            RequestStatus::Success => "SUCCESS",
            RequestStatus::Error => "ERROR",
            RequestStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(sqlx::FromRow)]
struct IdRecord {
    id: i32,
}

pub async fn insert(
    conn: &sqlx::PgPool,
    client_ip: &str,
    raw_body: &str,
    now: NaiveDateTime,
) -> Result<i32, DBError> {
    let record = sql_stmnt!(
        IdRecord,
        "INSERT INTO request_log (timestamp, client_ip, raw_body, status) \
         VALUES ($1, $2, $3, $4) RETURNING id",
        now,
        client_ip,
        raw_body,
        RequestStatus::Processing.as_str()
    )
    .fetch_one(conn)
    .await?;
    Ok(record.id)
}

pub async fn finish(
    conn: &sqlx::PgPool,
    request_id: i32,
    status: RequestStatus,
    log_message: &str,
) -> Result<(), DBError> {
    sql_stmnt!(
        "UPDATE request_log SET status = $2, log_message = $3 WHERE id = $1",
        request_id,
        status.as_str(),
        log_message
    )
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[derive(sqlx::FromRow, Debug)]
pub(crate) struct RequestLogDao {
    pub(crate) client_ip: Option<String>,
    pub(crate) raw_body: Option<String>,
    pub(crate) status: String,
    pub(crate) log_message: Option<String>,
}

#[cfg(test)]
pub(crate) async fn get(conn: &sqlx::PgPool, request_id: i32) -> Result<RequestLogDao, DBError> {
    Ok(
        sql_stmnt!(RequestLogDao, "SELECT client_ip, raw_body, status, log_message FROM request_log WHERE id = $1", request_id)
            .fetch_one(conn)
            .await?,
    )
}
