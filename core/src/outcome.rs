use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    pub external_id: String,
    pub reason: String,
}

/// Summary of one delivery. Never persisted, only logged and used to decide
/// how loudly to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub status: OutcomeStatus,
    pub messages_seen: usize,
    pub messages_processed: usize,
    pub readings_saved: usize,
    pub errors: Vec<MessageError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Default for IngestionOutcome {
    fn default() -> Self {
        IngestionOutcome {
            status: OutcomeStatus::Ok,
            messages_seen: 0,
            messages_processed: 0,
            readings_saved: 0,
            errors: Vec::new(),
            detail: None,
        }
    }
}

impl IngestionOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }

    pub fn record_error(&mut self, external_id: &str, reason: impl ToString) {
        self.errors.push(MessageError {
            external_id: external_id.to_owned(),
            reason: reason.to_string(),
        });
    }

    /// Marks the whole batch as failed, nothing of it was persisted
    pub fn failed(mut self, detail: impl ToString) -> Self {
        self.status = OutcomeStatus::Error;
        self.messages_processed = 0;
        self.readings_saved = 0;
        self.detail = Some(detail.to_string());
        self
    }
}
