use thiserror::Error;

/// Failures of the wire-document front end. Everything past this point
/// (extraction, decoding) is infallible by contract.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Empty body")]
    Empty,
    #[error("Body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
