use crate::document::TEXT_KEY;
use crate::envelope::{lookup, lookup_string, objects, Envelope, TELEMETRY_MESSAGE};
use serde_json::{Map, Value};
use tracing::debug;

/// Historical key names, in priority order
const EXTERNAL_ID_KEYS: [&str; 4] = ["esn", "ESN", "id", "deviceId"];
const UNIX_TIME_KEYS: [&str; 3] = ["unixTime", "unix_time", "time"];
const PAYLOAD_KEYS: [&str; 3] = ["payload", "data", "hexPayload"];

/// One attributable message of a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub external_id: String,
    pub unix_time: Option<String>,
    pub hex_payload: Option<String>,
}

/// Normalizes every known envelope shape into a flat list of messages.
///
/// Heartbeats and provisioning confirmations yield an empty list, messages
/// without an external id are dropped.
pub fn extract(envelope: &Envelope) -> Vec<RawMessage> {
    let items = match envelope {
        Envelope::Telemetry(telemetry) => match &telemetry.body {
            Value::Object(container) => container
                .get(TELEMETRY_MESSAGE)
                .map(objects)
                .unwrap_or_default(),
            // some JSON senders put the message list directly into the container
            Value::Array(_) => objects(&telemetry.body),
            _ => Vec::new(),
        },
        Envelope::Provisioning(_) => Vec::new(),
        Envelope::Unrecognized(document) => match document.get(TELEMETRY_MESSAGE) {
            Some(messages) => objects(messages),
            None => objects(document),
        },
    };

    items.into_iter().filter_map(to_raw_message).collect()
}

fn to_raw_message(item: &Map<String, Value>) -> Option<RawMessage> {
    let external_id = match lookup_string(item, &EXTERNAL_ID_KEYS) {
        Some(id) => id,
        None => {
            debug!("Dropping message without external id");
            return None;
        }
    };

    Some(RawMessage {
        external_id,
        unix_time: lookup_string(item, &UNIX_TIME_KEYS),
        hex_payload: lookup(item, &PAYLOAD_KEYS).and_then(payload_text),
    })
}

/// `<payload encoding="hex">..</payload>` folds into `{"#text": ..}`
fn payload_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Object(wrapper) => wrapper.get(TEXT_KEY)?.as_str()?,
        Value::String(text) => text.as_str(),
        _ => return None,
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}
