//! Envelope handling shared by every platform adapter.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::domain::cipher::CipherContext;
use crate::domain::envelope::{EnvelopeFormat, SignatureParams};
use crate::ports::BotCredentials;

use super::AdapterError;

/// Answers the `GET` handshake a platform sends when a callback URL is saved.
///
/// # Errors
///
/// Fails with `AdapterError::Cipher` when the signature does not match or the
/// challenge does not decrypt for this app.
pub fn verify_callback_url(
    credentials: &BotCredentials,
    params: &SignatureParams,
    echostr: &str,
) -> Result<String, AdapterError> {
    let cipher = credentials.cipher()?;
    let plaintext =
        cipher.verify_url_challenge(&params.signature, &params.timestamp, &params.nonce, echostr)?;
    tracing::info!(
        kb_id = %credentials.kb_id,
        platform = %credentials.platform,
        "Callback URL verified"
    );
    Ok(plaintext)
}

/// Verifies and decrypts an inbound callback body.
pub(crate) fn open_callback(
    credentials: &BotCredentials,
    params: &SignatureParams,
    body: &str,
) -> Result<(CipherContext, String), AdapterError> {
    let cipher = credentials.cipher()?;
    let envelope = credentials.platform.envelope_format().decode(body, params)?;
    let plaintext = cipher.open(&envelope)?;
    Ok((cipher, plaintext))
}

/// Encrypts a reply into the platform's wire shape.
///
/// The request nonce is echoed back; a fresh one is drawn if it was empty.
pub(crate) fn seal_reply(
    cipher: &CipherContext,
    format: EnvelopeFormat,
    plaintext: &str,
    nonce: &str,
) -> Result<String, AdapterError> {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce = if nonce.is_empty() {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect()
    } else {
        nonce.to_string()
    };
    let envelope = cipher.seal(plaintext, &timestamp, &nonce);
    Ok(format.encode(&envelope)?)
}
