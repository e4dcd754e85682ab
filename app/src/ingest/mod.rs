use crate::error::DBError;
use crate::models::device::{self, DeviceDao};
use crate::models::reading::ReadingDao;
use crate::store::{ReadingBatch, ReadingStore};
use brsense_core::{extract, Envelope, IngestionOutcome, RawMessage, SoilProbeDecoder};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Turns extracted messages into devices and readings, one batch per delivery
pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
    decoder: SoilProbeDecoder,
}

impl Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor").finish()
    }
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>, decoder: SoilProbeDecoder) -> Self {
        Ingestor { store, decoder }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// Persists every attributable message of the envelope.
    ///
    /// A failing message is rolled back on its own and recorded in the
    /// outcome. Failing to open or commit the batch fails the whole delivery.
    #[tracing::instrument(skip_all)]
    pub async fn ingest(&self, envelope: &Envelope) -> IngestionOutcome {
        if let Envelope::Provisioning(provisioning) = envelope {
            for message in &provisioning.messages {
                info!(
                    esn = %message.esn,
                    prov_id = message.prov_id.as_deref().unwrap_or_default(),
                    "Provisioning confirmed"
                );
            }
        }

        let messages = extract(envelope);
        let mut outcome = IngestionOutcome {
            messages_seen: messages.len(),
            ..IngestionOutcome::default()
        };
        if messages.is_empty() {
            debug!("Nothing to ingest");
            return outcome;
        }

        let mut batch = match self.store.begin().await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed opening ingestion batch: {}", e);
                return outcome.failed(e);
            }
        };

        for message in messages.iter() {
            if let Err(e) = self.ingest_isolated(batch.as_mut(), message, &mut outcome).await {
                error!("Failed isolating message: {}", e);
                if let Err(e) = batch.rollback().await {
                    warn!("Rollback failed: {}", e);
                }
                return outcome.failed(e);
            }
        }

        match batch.commit().await {
            Ok(()) => {
                info!(
                    messages = outcome.messages_processed,
                    readings = outcome.readings_saved,
                    failed = outcome.errors.len(),
                    "Ingested delivery"
                );
                outcome
            }
            Err(e) => {
                error!("Failed committing ingestion batch: {}", e);
                outcome.failed(e)
            }
        }
    }

    /// Runs one message inside its own savepoint. Only savepoint handling
    /// errors bubble up, message errors end up in the outcome.
    async fn ingest_isolated(
        &self,
        batch: &mut dyn ReadingBatch,
        message: &RawMessage,
        outcome: &mut IngestionOutcome,
    ) -> Result<(), DBError> {
        batch.begin_message().await?;
        match self.ingest_message(batch, message).await {
            Ok(saved) => {
                batch.release_message().await?;
                outcome.messages_processed += 1;
                outcome.readings_saved += saved;
            }
            Err(e) => {
                warn!(esn = %message.external_id, "Skipping message: {}", e);
                batch.rollback_message().await?;
                outcome.record_error(&message.external_id, e);
            }
        }
        Ok(())
    }

    async fn ingest_message(
        &self,
        batch: &mut dyn ReadingBatch,
        message: &RawMessage,
    ) -> Result<usize, DBError> {
        let now = Utc::now();
        let device = resolve_device(batch, &message.external_id, now).await?;
        batch.touch_device(device.id(), now).await?;

        let payload = match &message.hex_payload {
            Some(payload) => payload,
            None => {
                debug!(esn = %message.external_id, "Message without payload");
                return Ok(0);
            }
        };

        let timestamp = resolve_timestamp(message.unix_time.as_deref(), now);
        let samples = self.decoder.decode(payload, timestamp);
        for sample in samples.iter() {
            batch
                .save_reading(&ReadingDao::from_sample(device.id(), sample))
                .await?;
        }
        debug!(
            esn = %message.external_id,
            device_id = device.id(),
            readings = samples.len(),
            "Persisted message"
        );
        Ok(samples.len())
    }
}

async fn resolve_device(
    batch: &mut dyn ReadingBatch,
    esn: &str,
    now: DateTime<Utc>,
) -> Result<DeviceDao, DBError> {
    if let Some(device) = batch.find_device(esn).await? {
        debug!(
            esn = device.esn(),
            device_id = device.id(),
            last_seen = %device.updated_at(),
            "Resolved device"
        );
        return Ok(device);
    }

    let device = batch.save_device(esn, &device::default_name(esn), now).await?;
    info!(
        esn = esn,
        device_id = device.id(),
        name = device.name().unwrap_or_default(),
        "Auto-provisioned device"
    );
    Ok(device)
}

/// Provider time when it is a valid count of seconds, receive time otherwise
fn resolve_timestamp(unix_time: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    unix_time
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or(now)
}

#[cfg(test)]
mod test;
