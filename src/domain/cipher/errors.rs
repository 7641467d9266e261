//! Cipher envelope error types.

use thiserror::Error;

/// Failures of the signed-AES message protocol.
///
/// Every variant is terminal for the webhook call that produced it. None of
/// them are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Recomputed SHA-1 signature differs from the supplied one.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Ciphertext or encoding key is not valid base64.
    #[error("Malformed base64 input")]
    MalformedBase64,

    /// Ciphertext is empty or not a whole number of AES blocks.
    #[error("Ciphertext length {0} is not a multiple of the AES block size")]
    CiphertextLengthInvalid(usize),

    /// Trailing PKCS#7 pad byte is outside `[1, 32]` or longer than the buffer.
    #[error("Invalid PKCS#7 padding byte {0}")]
    PaddingInvalid(u8),

    /// Decoded AES key is not exactly 32 bytes.
    #[error("AES key must decode to 32 bytes, got {0}")]
    KeyLengthInvalid(usize),

    /// Bytes following the payload do not equal the configured receiver id.
    #[error("Receiver id mismatch")]
    ReceiverIdMismatch,

    /// Declared payload length runs past the decrypted buffer.
    #[error("Declared payload length exceeds decrypted data")]
    PayloadTruncated,

    /// Decrypted payload is not valid UTF-8.
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_length_message_includes_actual_length() {
        let err = CipherError::KeyLengthInvalid(31);
        assert_eq!(err.to_string(), "AES key must decode to 32 bytes, got 31");
    }

    #[test]
    fn padding_message_includes_byte() {
        let err = CipherError::PaddingInvalid(0);
        assert!(err.to_string().contains("byte 0"));
    }
}
