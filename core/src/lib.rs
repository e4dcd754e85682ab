//! Decoding and acknowledgment logic for SmartOne C soil probes delivering
//! over the Globalstar messaging network. Pure, no I/O.

pub mod decoder;
pub mod document;
pub mod envelope;
pub mod error;
pub mod extractor;
pub mod outcome;
pub mod response;

pub use decoder::{DecodedSample, DecoderConfig, PowerSource, ReadingKind, SoilProbeDecoder};
pub use document::{parse_document, WireFormat};
pub use envelope::{Envelope, EnvelopeKind};
pub use extractor::{extract, RawMessage};
pub use outcome::{IngestionOutcome, MessageError, OutcomeStatus};
pub use response::{compose, Reply, ReplyContext};
