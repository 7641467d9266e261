//! Envelope framing errors.

use thiserror::Error;

/// Failures while reading or writing a platform wire envelope.
///
/// Kept apart from [`crate::domain::cipher::CipherError`] so callers can tell
/// a malformed request from one that failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Body is not the expected JSON/XML shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A required field is present but empty.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Serializing an outbound envelope failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
