use crate::error::DBError;
use brsense_core::DecodedSample;
use chrono::NaiveDateTime;
use sqlx::PgConnection;

/// A decoded sample attributed to its device
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct ReadingDao {
    pub(crate) device_id: i32,
    pub(crate) timestamp: NaiveDateTime,
    pub(crate) depth_cm: f64,
    pub(crate) moisture_pct: Option<f64>,
    pub(crate) temperature_c: Option<f64>,
    pub(crate) rain_cm: Option<f64>,
    pub(crate) battery_level: Option<f64>,
    pub(crate) solar_level: Option<f64>,
    pub(crate) reading_kind: String,
}

impl ReadingDao {
    pub fn from_sample(device_id: i32, sample: &DecodedSample) -> Self {
        ReadingDao {
            device_id,
            timestamp: sample.timestamp.naive_utc(),
            depth_cm: sample.depth_cm,
            moisture_pct: sample.moisture_pct,
            temperature_c: sample.temperature_c,
            rain_cm: sample.rain_cm,
            battery_level: sample.battery_level,
            solar_level: sample.solar_level,
            reading_kind: sample.kind.as_char().to_string(),
        }
    }
}

pub async fn insert(conn: &mut PgConnection, reading: &ReadingDao) -> Result<(), DBError> {
    sql_stmnt!(
        "INSERT INTO reading (device_id, timestamp, depth_cm, moisture_pct, temperature_c, \
         rain_cm, battery_level, solar_level, reading_kind) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        reading.device_id,
        reading.timestamp,
        reading.depth_cm,
        reading.moisture_pct,
        reading.temperature_c,
        reading.rain_cm,
        reading.battery_level,
        reading.solar_level,
        &reading.reading_kind
    )
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn read_for_device(
    conn: &mut PgConnection,
    device_id: i32,
) -> Result<Vec<ReadingDao>, DBError> {
    Ok(sql_stmnt!(
        ReadingDao,
        "SELECT device_id, timestamp, depth_cm, moisture_pct, temperature_c, rain_cm, \
         battery_level, solar_level, reading_kind FROM reading WHERE device_id = $1 ORDER BY id",
        device_id
    )
    .fetch_all(conn)
    .await?)
}
