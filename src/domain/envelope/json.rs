//! JSON wire shape used by the AI-bot protocol.

use serde::{Deserialize, Serialize};

use super::{EnvelopeError, SignatureParams};
use crate::domain::cipher::Envelope;

#[derive(Debug, Deserialize)]
struct InboundJson {
    encrypt: String,
    #[serde(default)]
    msgsignature: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutboundJson<'a> {
    encrypt: &'a str,
    msgsignature: &'a str,
    timestamp: &'a str,
    nonce: &'a str,
}

/// Reads `{"encrypt": ...}`, taking signature fields from the body when
/// present and from the callback query otherwise.
pub(super) fn decode(body: &str, params: &SignatureParams) -> Result<Envelope, EnvelopeError> {
    let inbound: InboundJson =
        serde_json::from_str(body).map_err(|e| EnvelopeError::Parse(e.to_string()))?;
    if inbound.encrypt.is_empty() {
        return Err(EnvelopeError::MissingField("encrypt"));
    }

    Ok(Envelope {
        ciphertext: inbound.encrypt,
        signature: inbound.msgsignature.unwrap_or_else(|| params.signature.clone()),
        timestamp: inbound.timestamp.unwrap_or_else(|| params.timestamp.clone()),
        nonce: inbound.nonce.unwrap_or_else(|| params.nonce.clone()),
    })
}

pub(super) fn encode(envelope: &Envelope) -> Result<String, EnvelopeError> {
    serde_json::to_string(&OutboundJson {
        encrypt: &envelope.ciphertext,
        msgsignature: &envelope.signature,
        timestamp: &envelope.timestamp,
        nonce: &envelope.nonce,
    })
    .map_err(|e| EnvelopeError::Serialization(e.to_string()))
}
