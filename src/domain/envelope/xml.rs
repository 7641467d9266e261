//! XML/CDATA wire shape used by the enterprise-app and customer-service
//! callbacks.

use serde::Deserialize;

use super::{EnvelopeError, SignatureParams};
use crate::domain::cipher::Envelope;

/// Wraps `value` in a CDATA section, splitting any embedded `]]>`.
pub fn cdata(value: &str) -> String {
    format!("<![CDATA[{}]]>", value.replace("]]>", "]]]]><![CDATA[>"))
}

#[derive(Debug, Deserialize)]
struct InboundXml {
    #[serde(rename = "Encrypt")]
    encrypt: String,
    #[serde(rename = "MsgSignature", default)]
    msg_signature: Option<String>,
    #[serde(rename = "TimeStamp", default)]
    timestamp: Option<String>,
    #[serde(rename = "Nonce", default)]
    nonce: Option<String>,
}

pub(super) fn decode(body: &str, params: &SignatureParams) -> Result<Envelope, EnvelopeError> {
    let inbound: InboundXml =
        quick_xml::de::from_str(body).map_err(|e| EnvelopeError::Parse(e.to_string()))?;
    let ciphertext = inbound.encrypt.trim().to_string();
    if ciphertext.is_empty() {
        return Err(EnvelopeError::MissingField("Encrypt"));
    }

    Ok(Envelope {
        ciphertext,
        signature: inbound
            .msg_signature
            .unwrap_or_else(|| params.signature.clone()),
        timestamp: inbound.timestamp.unwrap_or_else(|| params.timestamp.clone()),
        nonce: inbound.nonce.unwrap_or_else(|| params.nonce.clone()),
    })
}

/// Written by hand: the platforms expect CDATA sections, which the quick-xml
/// serializer escapes instead of emitting.
pub(super) fn encode(envelope: &Envelope) -> String {
    format!(
        "<xml><Encrypt>{}</Encrypt><MsgSignature>{}</MsgSignature><TimeStamp>{}</TimeStamp><Nonce>{}</Nonce></xml>",
        cdata(&envelope.ciphertext),
        cdata(&envelope.signature),
        envelope.timestamp,
        cdata(&envelope.nonce),
    )
}
