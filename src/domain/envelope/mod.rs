//! Envelope serializer.
//!
//! Moves a codec [`Envelope`] in and out of the concrete wire shape each
//! platform expects. No cryptography happens here.
//!
//! | Format | Used by                          | Outbound shape                                   |
//! |--------|----------------------------------|--------------------------------------------------|
//! | Json   | AI bot                           | `{"encrypt","msgsignature","timestamp","nonce"}` |
//! | Xml    | Enterprise app, customer service | `<xml><Encrypt/><MsgSignature/>...</xml>`        |

mod errors;
mod json;
pub mod xml;

pub use errors::EnvelopeError;

use serde::Deserialize;

use crate::domain::cipher::Envelope;

/// Signature fields delivered in the callback query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignatureParams {
    #[serde(rename = "msg_signature", default)]
    pub signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
}

impl SignatureParams {
    pub fn new(
        signature: impl Into<String>,
        timestamp: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            signature: signature.into(),
            timestamp: timestamp.into(),
            nonce: nonce.into(),
        }
    }
}

/// Wire shape of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    Json,
    Xml,
}

impl EnvelopeFormat {
    /// Parses an inbound request body into an envelope.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Parse` for malformed bodies and
    /// `EnvelopeError::MissingField` when the ciphertext is empty.
    pub fn decode(&self, body: &str, params: &SignatureParams) -> Result<Envelope, EnvelopeError> {
        match self {
            EnvelopeFormat::Json => json::decode(body, params),
            EnvelopeFormat::Xml => xml::decode(body, params),
        }
    }

    /// Renders an outbound envelope.
    pub fn encode(&self, envelope: &Envelope) -> Result<String, EnvelopeError> {
        match self {
            EnvelopeFormat::Json => json::encode(envelope),
            EnvelopeFormat::Xml => Ok(xml::encode(envelope)),
        }
    }

    /// HTTP content type of an encoded envelope.
    pub fn content_type(&self) -> &'static str {
        match self {
            EnvelopeFormat::Json => "application/json",
            EnvelopeFormat::Xml => "application/xml",
        }
    }
}
