//! Cipher envelope codec for chat-platform webhooks.
//!
//! Signs, verifies, encrypts and decrypts the messages exchanged with the
//! WeChat Work family of platforms. Wire formatting of the result lives in
//! [`crate::domain::envelope`].

mod codec;
mod errors;
mod pkcs7;

pub use codec::{sign, CipherContext};
pub use errors::CipherError;
pub use pkcs7::{pkcs7_pad, pkcs7_unpad, PAD_BLOCK_SIZE};

/// A signed, encrypted message as produced by [`CipherContext::seal`].
///
/// Never persisted; serialized into the platform's wire shape by the
/// envelope serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Base64 AES-CBC ciphertext.
    pub ciphertext: String,
    /// Lowercase hex SHA-1 signature.
    pub signature: String,
    /// Unix seconds as a string.
    pub timestamp: String,
    /// Platform- or server-supplied nonce.
    pub nonce: String,
}
