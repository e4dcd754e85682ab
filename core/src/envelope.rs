use crate::document::ATTRIBUTE_PREFIX;
use serde_json::{Map, Value};

pub const TELEMETRY_CONTAINER: &str = "stuMessages";
pub const TELEMETRY_MESSAGE: &str = "stuMessage";
pub const PROVISIONING_CONTAINER: &str = "prvmsgs";
pub const PROVISIONING_MESSAGE: &str = "prvmsg";

const MESSAGE_ID_KEY: &str = "messageID";
const PROVISIONING_ID_KEY: &str = "prvMessageID";
const TIME_STAMP_KEY: &str = "timeStamp";

/// A provider delivery, independent of the wire format it arrived in
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Telemetry(TelemetryEnvelope),
    Provisioning(ProvisioningEnvelope),
    /// Any other document, kept as-is for the bare message fallback
    Unrecognized(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEnvelope {
    pub message_id: Option<String>,
    pub time_stamp: Option<String>,
    /// The container content, `Value::Null` for heartbeats
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningEnvelope {
    pub prv_message_id: Option<String>,
    pub time_stamp: Option<String>,
    pub messages: Vec<ProvisionMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionMessage {
    pub esn: String,
    pub prov_id: Option<String>,
}

/// What the reply has to acknowledge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    Telemetry { message_id: Option<String> },
    Provisioning { prv_message_id: Option<String> },
    Unrecognized,
}

impl Envelope {
    pub fn from_document(document: Value) -> Self {
        let mut root = match document {
            Value::Object(root) => root,
            other => return Envelope::Unrecognized(other),
        };

        if let Some(body) = root.remove(TELEMETRY_CONTAINER) {
            let attrs = body.as_object();
            return Envelope::Telemetry(TelemetryEnvelope {
                message_id: attrs.and_then(|m| lookup_string(m, &[MESSAGE_ID_KEY])),
                time_stamp: attrs.and_then(|m| lookup_string(m, &[TIME_STAMP_KEY])),
                body,
            });
        }

        if let Some(body) = root.remove(PROVISIONING_CONTAINER) {
            let attrs = body.as_object();
            let messages = attrs
                .and_then(|m| m.get(PROVISIONING_MESSAGE))
                .map(objects)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| {
                    Some(ProvisionMessage {
                        esn: lookup_string(m, &["esn", "ESN"])?,
                        prov_id: lookup_string(m, &["provID"]),
                    })
                })
                .collect();

            return Envelope::Provisioning(ProvisioningEnvelope {
                prv_message_id: attrs.and_then(|m| lookup_string(m, &[PROVISIONING_ID_KEY])),
                time_stamp: attrs.and_then(|m| lookup_string(m, &[TIME_STAMP_KEY])),
                messages,
            });
        }

        Envelope::Unrecognized(Value::Object(root))
    }

    /// Provider side `timeStamp` of the container
    pub fn time_stamp(&self) -> Option<&str> {
        match self {
            Envelope::Telemetry(t) => t.time_stamp.as_deref(),
            Envelope::Provisioning(p) => p.time_stamp.as_deref(),
            Envelope::Unrecognized(_) => None,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Telemetry(t) => EnvelopeKind::Telemetry {
                message_id: t.message_id.clone(),
            },
            Envelope::Provisioning(p) => EnvelopeKind::Provisioning {
                prv_message_id: p.prv_message_id.clone(),
            },
            Envelope::Unrecognized(_) => EnvelopeKind::Unrecognized,
        }
    }
}

/// First present key wins; for each key the child field is tried before the
/// attribute form.
pub(crate) fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .or_else(|| obj.get(&format!("{}{}", ATTRIBUTE_PREFIX, key)))
    })
}

pub(crate) fn lookup_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    lookup(obj, keys).and_then(scalar_string)
}

/// Strings (trimmed, non-empty) and numbers, nothing else. Whole floats
/// such as `1034268516.0` are written as integers.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some((f as i64).to_string())
            }
            _ => Some(n.to_string()),
        },
        _ => None,
    }
}

/// A single object or a sequence of objects, normalized to a sequence
pub(crate) fn objects(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(obj) => vec![obj],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}
