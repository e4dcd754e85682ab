use crate::error::DocumentError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Prefix of attribute keys when markup is folded into a document
pub const ATTRIBUTE_PREFIX: &str = "@";
/// Key of the text content of an element that also has attributes or children
pub const TEXT_KEY: &str = "#text";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialization family of a delivery. Replies are always written in the
/// family the request arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Xml,
    Json,
}

impl WireFormat {
    /// Content-type wins, otherwise a leading `<` marks markup
    pub fn sniff(body: &[u8], content_type: Option<&str>) -> Self {
        let xml_type = content_type
            .map(|ctype| ctype.to_ascii_lowercase().contains("xml"))
            .unwrap_or(false);
        let leading = strip_bom(body).iter().find(|b| !b.is_ascii_whitespace());

        if xml_type || leading == Some(&b'<') {
            WireFormat::Xml
        } else {
            WireFormat::Json
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            WireFormat::Xml => "application/xml",
            WireFormat::Json => "application/json",
        }
    }
}

/// Parses a delivery body into one neutral document.
///
/// Markup is folded the following way:
/// - the root element becomes the single key of the returned object
/// - attributes become `@name` keys
/// - repeated child elements become arrays
/// - text of an element without attributes or children becomes a string,
///   otherwise it is kept under `#text`
/// - an empty element without attributes becomes `null`
pub fn parse_document(body: &[u8], format: WireFormat) -> Result<Value, DocumentError> {
    let body = strip_bom(body);
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DocumentError::Empty);
    }

    match format {
        WireFormat::Json => Ok(serde_json::from_slice(body)?),
        WireFormat::Xml => {
            let text = std::str::from_utf8(body)?;
            let doc = roxmltree::Document::parse(text)?;
            let root = doc.root_element();

            let mut folded = Map::new();
            folded.insert(root.tag_name().name().to_owned(), fold_element(root));
            Ok(Value::Object(folded))
        }
    }
}

fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(UTF8_BOM).unwrap_or(body)
}

fn fold_element(node: roxmltree::Node) -> Value {
    let mut map = Map::new();
    for attr in node.attributes() {
        map.insert(
            format!("{}{}", ATTRIBUTE_PREFIX, attr.name()),
            Value::String(attr.value().to_owned()),
        );
    }

    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            let key = child.tag_name().name().to_owned();
            let value = fold_element(child);
            match map.get_mut(&key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(key, value);
                }
            }
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if map.is_empty() {
        if text.is_empty() {
            Value::Null
        } else {
            Value::String(text.to_owned())
        }
    } else {
        if !text.is_empty() {
            map.insert(TEXT_KEY.to_owned(), Value::String(text.to_owned()));
        }
        Value::Object(map)
    }
}
