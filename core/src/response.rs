use crate::document::WireFormat;
use crate::envelope::EnvelopeKind;
use crate::outcome::IngestionOutcome;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

/// `DD/MM/YYYY HH:MM:SS GMT`, the only timestamp literal the provider accepts
pub const DELIVERY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S GMT";

pub const TELEMETRY_REPLY: &str = "stuResponseMsg";
pub const PROVISIONING_REPLY: &str = "prvResponseMsg";
pub const GENERIC_REPLY: &str = "response";

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const TELEMETRY_SCHEMA: &str = "http://cody.glpconnect.com/XSD/StuResponse_Rev1_0.xsd";
const PROVISIONING_SCHEMA: &str = "http://cody.glpconnect.com/XSD/ProvisionResponse_Rev1_0.xsd";

const STORE_OK: &str = "Store OK";

/// Per reply values that must not be computed inside the composer
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub now: DateTime<Utc>,
    pub reply_id: String,
}

impl ReplyContext {
    pub fn new() -> Self {
        ReplyContext {
            now: Utc::now(),
            reply_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn delivery_timestamp(&self) -> String {
        self.now.format(DELIVERY_TIMESTAMP_FORMAT).to_string()
    }
}

impl Default for ReplyContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content_type: &'static str,
    pub body: String,
}

struct ReplyDocument {
    root: &'static str,
    schema: Option<&'static str>,
    attributes: Vec<(&'static str, String)>,
    children: Vec<(&'static str, String)>,
}

/// Builds the acknowledgment for a delivery.
///
/// The provider only cares about receipt: the state is `pass` even when the
/// ingestion failed, the outcome merely decides whether that gets logged.
pub fn compose(
    kind: &EnvelopeKind,
    outcome: &IngestionOutcome,
    format: WireFormat,
    context: &ReplyContext,
) -> Reply {
    if !outcome.is_ok() {
        warn!(
            detail = outcome.detail.as_deref().unwrap_or_default(),
            "Acknowledging delivery whose ingestion failed"
        );
    }

    let timestamp = context.delivery_timestamp();
    let document = match kind {
        EnvelopeKind::Telemetry { message_id } => ReplyDocument {
            root: TELEMETRY_REPLY,
            schema: Some(TELEMETRY_SCHEMA),
            attributes: vec![
                ("deliveryTimeStamp", timestamp),
                ("messageID", context.reply_id.clone()),
                ("correlationID", message_id.clone().unwrap_or_default()),
            ],
            children: vec![("state", "pass".to_owned()), ("stateMessage", STORE_OK.to_owned())],
        },
        // the provisioning ICD forbids a messageID on this reply
        EnvelopeKind::Provisioning { prv_message_id } => ReplyDocument {
            root: PROVISIONING_REPLY,
            schema: Some(PROVISIONING_SCHEMA),
            attributes: vec![
                ("deliveryTimeStamp", timestamp),
                ("correlationID", prv_message_id.clone().unwrap_or_default()),
            ],
            children: vec![("state", "PASS".to_owned()), ("stateMessage", STORE_OK.to_owned())],
        },
        EnvelopeKind::Unrecognized => ReplyDocument {
            root: GENERIC_REPLY,
            schema: None,
            attributes: vec![("result", "pass".to_owned()), ("timeStamp", timestamp)],
            children: Vec::new(),
        },
    };

    let body = match format {
        WireFormat::Xml => document.to_xml(),
        WireFormat::Json => document.to_json(),
    };
    Reply {
        content_type: format.content_type(),
        body,
    }
}

impl ReplyDocument {
    fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<");
        xml.push_str(self.root);
        if let Some(schema) = self.schema {
            xml.push_str(&format!(
                " xmlns:xsi=\"{}\" xsi:noNamespaceSchemaLocation=\"{}\"",
                XSI_NAMESPACE, schema
            ));
        }
        for (name, value) in &self.attributes {
            xml.push_str(&format!(" {}=\"{}\"", name, escape_xml(value)));
        }

        if self.children.is_empty() {
            xml.push_str("/>\n");
            return xml;
        }

        xml.push_str(">\n");
        for (name, value) in &self.children {
            xml.push_str(&format!("  <{0}>{1}</{0}>\n", name, escape_xml(value)));
        }
        xml.push_str(&format!("</{}>\n", self.root));
        xml
    }

    fn to_json(&self) -> String {
        let fields: Map<String, Value> = self
            .attributes
            .iter()
            .chain(self.children.iter())
            .map(|(name, value)| (name.to_string(), Value::String(value.clone())))
            .collect();

        let mut root = Map::new();
        root.insert(self.root.to_owned(), Value::Object(fields));
        Value::Object(root).to_string()
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
