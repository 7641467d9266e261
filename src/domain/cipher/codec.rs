//! Signed AES-256-CBC message codec shared by every chat-platform integration.
//!
//! Wire layout of the plaintext before padding:
//!
//! ```text
//! 16 ASCII digits | u32 big-endian payload length | payload | receiver id
//! ```
//!
//! The layout is PKCS#7 padded to 32 bytes and encrypted with the decoded
//! 32-byte key, using the key's first 16 bytes as IV.

use aes::Aes256;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::Rng;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use super::pkcs7::{pkcs7_pad, pkcs7_unpad};
use super::{CipherError, Envelope};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const AES_BLOCK_SIZE: usize = 16;
const KEY_LEN: usize = 32;
const RANDOM_PREFIX_LEN: usize = 16;
const LENGTH_FIELD_LEN: usize = 4;

/// Platform keys are 43 characters with the trailing `=` dropped, and their
/// final character is not always canonical.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Computes the platform message signature.
///
/// The four inputs are sorted before hashing, so the result depends only on
/// the set of values and not on which argument carried which value.
pub fn sign(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut parts = [token, timestamp, nonce, payload];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Per-app cryptographic material for one chat-platform integration.
///
/// Built once per inbound request from the app's stored credentials.
#[derive(Clone)]
pub struct CipherContext {
    token: String,
    aes_key: [u8; KEY_LEN],
    receiver_id: String,
}

impl CipherContext {
    /// Builds a context from the app's token, 43-character encoding key and
    /// receiver id (corp id for enterprise apps, empty for AI bots).
    ///
    /// # Errors
    ///
    /// - `MalformedBase64` if the encoding key is not base64
    /// - `KeyLengthInvalid` if it does not decode to exactly 32 bytes
    pub fn new(
        token: impl Into<String>,
        encoding_aes_key: &str,
        receiver_id: impl Into<String>,
    ) -> Result<Self, CipherError> {
        let decoded = KEY_ENGINE
            .decode(encoding_aes_key.trim())
            .map_err(|_| CipherError::MalformedBase64)?;
        let aes_key: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::KeyLengthInvalid(decoded.len()))?;

        Ok(Self {
            token: token.into(),
            aes_key,
            receiver_id: receiver_id.into(),
        })
    }

    /// Returns the receiver id bound into every ciphertext.
    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    /// Signs `payload` with this context's token.
    pub fn sign(&self, timestamp: &str, nonce: &str, payload: &str) -> String {
        sign(&self.token, timestamp, nonce, payload)
    }

    /// Checks `signature` against the recomputed one in constant time.
    pub fn verify_signature(
        &self,
        signature: &str,
        timestamp: &str,
        nonce: &str,
        payload: &str,
    ) -> Result<(), CipherError> {
        let expected = self.sign(timestamp, nonce, payload);
        let matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();
        if !matches {
            return Err(CipherError::SignatureMismatch);
        }
        Ok(())
    }

    /// Encrypts `plaintext` into base64 ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let mut rng = rand::thread_rng();
        let mut frame = Vec::with_capacity(
            RANDOM_PREFIX_LEN + LENGTH_FIELD_LEN + plaintext.len() + self.receiver_id.len(),
        );
        frame.extend((0..RANDOM_PREFIX_LEN).map(|_| rng.gen_range(b'0'..=b'9')));
        frame.extend_from_slice(&(plaintext.len() as u32).to_be_bytes());
        frame.extend_from_slice(plaintext);
        frame.extend_from_slice(self.receiver_id.as_bytes());

        let padded = pkcs7_pad(&frame);
        let ciphertext = Aes256CbcEnc::new(&self.aes_key.into(), &self.iv().into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        base64::engine::general_purpose::STANDARD.encode(ciphertext)
    }

    /// Decrypts base64 ciphertext and returns the raw payload bytes.
    ///
    /// # Errors
    ///
    /// - `MalformedBase64` if `ciphertext` is not base64
    /// - `CiphertextLengthInvalid` if it is not a whole number of AES blocks
    /// - `PaddingInvalid` if the PKCS#7 pad byte is out of range
    /// - `PayloadTruncated` if the declared length overruns the buffer
    /// - `ReceiverIdMismatch` if the trailing bytes are not this receiver id
    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, CipherError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CipherError::MalformedBase64)?;
        if raw.is_empty() || raw.len() % AES_BLOCK_SIZE != 0 {
            return Err(CipherError::CiphertextLengthInvalid(raw.len()));
        }

        let decrypted = Aes256CbcDec::new(&self.aes_key.into(), &self.iv().into())
            .decrypt_padded_vec_mut::<NoPadding>(&raw)
            .map_err(|_| CipherError::CiphertextLengthInvalid(raw.len()))?;
        let frame = pkcs7_unpad(&decrypted)?;

        let header_len = RANDOM_PREFIX_LEN + LENGTH_FIELD_LEN;
        if frame.len() < header_len {
            return Err(CipherError::PayloadTruncated);
        }
        let mut length_field = [0u8; LENGTH_FIELD_LEN];
        length_field.copy_from_slice(&frame[RANDOM_PREFIX_LEN..header_len]);
        let payload_end = header_len
            .checked_add(u32::from_be_bytes(length_field) as usize)
            .filter(|end| *end <= frame.len())
            .ok_or(CipherError::PayloadTruncated)?;

        if &frame[payload_end..] != self.receiver_id.as_bytes() {
            return Err(CipherError::ReceiverIdMismatch);
        }
        Ok(frame[header_len..payload_end].to_vec())
    }

    /// Decrypts base64 ciphertext into a UTF-8 string.
    pub fn decrypt_text(&self, ciphertext: &str) -> Result<String, CipherError> {
        String::from_utf8(self.decrypt(ciphertext)?).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Answers a webhook registration handshake.
    ///
    /// The signature is checked before any decryption is attempted.
    pub fn verify_url_challenge(
        &self,
        signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<String, CipherError> {
        self.verify_signature(signature, timestamp, nonce, echostr)?;
        self.decrypt_text(echostr)
    }

    /// Encrypts and signs `plaintext` into an outbound envelope.
    pub fn seal(&self, plaintext: &str, timestamp: &str, nonce: &str) -> Envelope {
        let ciphertext = self.encrypt(plaintext.as_bytes());
        let signature = self.sign(timestamp, nonce, &ciphertext);
        Envelope {
            ciphertext,
            signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        }
    }

    /// Verifies and decrypts an inbound envelope.
    pub fn open(&self, envelope: &Envelope) -> Result<String, CipherError> {
        self.verify_signature(
            &envelope.signature,
            &envelope.timestamp,
            &envelope.nonce,
            &envelope.ciphertext,
        )?;
        self.decrypt_text(&envelope.ciphertext)
    }

    fn iv(&self) -> [u8; AES_BLOCK_SIZE] {
        let mut iv = [0u8; AES_BLOCK_SIZE];
        iv.copy_from_slice(&self.aes_key[..AES_BLOCK_SIZE]);
        iv
    }
}

impl std::fmt::Debug for CipherContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherContext")
            .field("receiver_id", &self.receiver_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";
    const TEST_TOKEN: &str = "QDG6eK";
    const CORP_ID: &str = "wx5823bf96d3bd56c7";

    fn context() -> CipherContext {
        CipherContext::new(TEST_TOKEN, TEST_KEY, CORP_ID).unwrap()
    }

    /// Encrypts an arbitrary frame, bypassing the normal layout.
    fn encrypt_raw_frame(ctx: &CipherContext, frame: &[u8]) -> String {
        let padded = pkcs7_pad(frame);
        let ciphertext = Aes256CbcEnc::new(&ctx.aes_key.into(), &ctx.iv().into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);
        base64::engine::general_purpose::STANDARD.encode(ciphertext)
    }

    // ══════════════════════════════════════════════════════════════
    // Context Construction Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn key_without_padding_decodes_to_32_bytes() {
        assert!(CipherContext::new(TEST_TOKEN, TEST_KEY, CORP_ID).is_ok());
    }

    #[test]
    fn short_key_is_rejected() {
        let result = CipherContext::new(TEST_TOKEN, "abcd", CORP_ID);
        assert_eq!(result.unwrap_err(), CipherError::KeyLengthInvalid(3));
    }

    #[test]
    fn non_base64_key_is_rejected() {
        let result = CipherContext::new(TEST_TOKEN, "not*base64!", CORP_ID);
        assert_eq!(result.unwrap_err(), CipherError::MalformedBase64);
    }

    #[test]
    fn debug_output_hides_key_material() {
        let debug = format!("{:?}", context());
        assert!(debug.contains(CORP_ID));
        assert!(!debug.contains(TEST_TOKEN));
    }

    // ══════════════════════════════════════════════════════════════
    // Signature Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn sign_matches_sorted_sha1() {
        let mut hasher = Sha1::new();
        hasher.update(b"1409659813");
        hasher.update(b"1372623149");
        hasher.update(b"QDG6eK");
        hasher.update(b"payload");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(sign("QDG6eK", "1409659813", "1372623149", "payload"), expected);
    }

    #[test]
    fn sign_is_lowercase_hex_of_sha1_length() {
        let signature = sign("a", "b", "c", "d");
        assert_eq!(signature.len(), 40);
        assert!(signature.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn verify_signature_rejects_tampered_signature() {
        let ctx = context();
        let mut signature = ctx.sign("123", "nonce", "payload");
        let replacement = if signature.starts_with('0') { "1" } else { "0" };
        signature.replace_range(0..1, replacement);

        let result = ctx.verify_signature(&signature, "123", "nonce", "payload");

        assert_eq!(result, Err(CipherError::SignatureMismatch));
    }

    // ══════════════════════════════════════════════════════════════
    // Encrypt / Decrypt Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn encrypt_produces_digit_prefix_and_big_endian_length() {
        let ctx = context();
        let ciphertext = ctx.encrypt(b"hello");
        let raw = base64::engine::general_purpose::STANDARD.decode(&ciphertext).unwrap();
        let decrypted = Aes256CbcDec::new(&ctx.aes_key.into(), &ctx.iv().into())
            .decrypt_padded_vec_mut::<NoPadding>(&raw)
            .unwrap();
        let frame = pkcs7_unpad(&decrypted).unwrap();

        assert!(frame[..16].iter().all(u8::is_ascii_digit));
        assert_eq!(&frame[16..20], &[0, 0, 0, 5]);
        assert_eq!(&frame[20..25], b"hello");
        assert_eq!(&frame[25..], CORP_ID.as_bytes());
    }

    #[test]
    fn decrypt_reverses_encrypt() {
        let ctx = context();
        let ciphertext = ctx.encrypt("你好, relay".as_bytes());
        assert_eq!(ctx.decrypt_text(&ciphertext).unwrap(), "你好, relay");
    }

    #[test]
    fn decrypt_with_other_receiver_fails() {
        let sender = context();
        let receiver = CipherContext::new(TEST_TOKEN, TEST_KEY, "ww_other_corp").unwrap();

        let ciphertext = sender.encrypt(b"hello");

        assert_eq!(receiver.decrypt(&ciphertext), Err(CipherError::ReceiverIdMismatch));
    }

    #[test]
    fn empty_receiver_id_round_trips() {
        let ctx = CipherContext::new(TEST_TOKEN, TEST_KEY, "").unwrap();
        let ciphertext = ctx.encrypt(b"{\"msgtype\":\"text\"}");
        assert_eq!(ctx.decrypt_text(&ciphertext).unwrap(), "{\"msgtype\":\"text\"}");
    }

    #[test]
    fn decrypt_rejects_bad_base64() {
        assert_eq!(context().decrypt("%%%"), Err(CipherError::MalformedBase64));
    }

    #[test]
    fn decrypt_rejects_partial_block() {
        let ciphertext = base64::engine::general_purpose::STANDARD.encode([0u8; 20]);
        assert_eq!(
            context().decrypt(&ciphertext),
            Err(CipherError::CiphertextLengthInvalid(20))
        );
    }

    #[test]
    fn decrypt_rejects_empty_ciphertext() {
        assert_eq!(context().decrypt(""), Err(CipherError::CiphertextLengthInvalid(0)));
    }

    #[test]
    fn decrypt_rejects_overlong_declared_length() {
        let ctx = context();
        let mut frame = b"1234567890123456".to_vec();
        frame.extend_from_slice(&1000u32.to_be_bytes());
        frame.extend_from_slice(b"short");

        let ciphertext = encrypt_raw_frame(&ctx, &frame);

        assert_eq!(ctx.decrypt(&ciphertext), Err(CipherError::PayloadTruncated));
    }

    #[test]
    fn decrypt_rejects_invalid_padding() {
        let ctx = context();
        let mut block = vec![b'1'; 32];
        block[31] = 0;
        let ciphertext = Aes256CbcEnc::new(&ctx.aes_key.into(), &ctx.iv().into())
            .encrypt_padded_vec_mut::<NoPadding>(&block);
        let encoded = base64::engine::general_purpose::STANDARD.encode(ciphertext);

        assert_eq!(ctx.decrypt(&encoded), Err(CipherError::PaddingInvalid(0)));
    }

    #[test]
    fn decrypt_rejects_trailing_bytes_after_receiver() {
        let ctx = context();
        let mut frame = b"1234567890123456".to_vec();
        frame.extend_from_slice(&2u32.to_be_bytes());
        frame.extend_from_slice(b"hi");
        frame.extend_from_slice(CORP_ID.as_bytes());
        frame.extend_from_slice(b"x");

        let ciphertext = encrypt_raw_frame(&ctx, &frame);

        assert_eq!(ctx.decrypt(&ciphertext), Err(CipherError::ReceiverIdMismatch));
    }

    // ══════════════════════════════════════════════════════════════
    // Handshake and Envelope Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn url_challenge_returns_echo() {
        let ctx = context();
        let echostr = ctx.encrypt(b"5927782489442352469");
        let signature = ctx.sign("1409659589", "263014780", &echostr);

        let echo = ctx
            .verify_url_challenge(&signature, "1409659589", "263014780", &echostr)
            .unwrap();

        assert_eq!(echo, "5927782489442352469");
    }

    #[test]
    fn url_challenge_checks_signature_before_decrypting() {
        let ctx = context();
        let signature = ctx.sign("1409659589", "263014780", "not-even-base64");

        let result = ctx.verify_url_challenge(&signature, "1409659589", "999", "not-even-base64");

        assert_eq!(result, Err(CipherError::SignatureMismatch));
    }

    #[test]
    fn seal_then_open_returns_plaintext() {
        let ctx = context();
        let envelope = ctx.seal("reply body", "1700000000", "abc");

        assert_eq!(envelope.timestamp, "1700000000");
        assert_eq!(envelope.nonce, "abc");
        assert_eq!(ctx.open(&envelope).unwrap(), "reply body");
    }

    #[test]
    fn open_rejects_tampered_envelope_signature() {
        let ctx = context();
        let mut envelope = ctx.seal("reply body", "1700000000", "abc");
        let replacement = if envelope.signature.starts_with('f') { 'e' } else { 'f' };
        envelope.signature = format!("{}{}", replacement, &envelope.signature[1..]);

        assert_eq!(ctx.open(&envelope), Err(CipherError::SignatureMismatch));
    }

    proptest! {
        #[test]
        fn prop_decrypt_inverts_encrypt(
            plaintext in proptest::collection::vec(any::<u8>(), 0..300),
            receiver in "[a-zA-Z0-9_]{0,24}",
        ) {
            let ctx = CipherContext::new(TEST_TOKEN, TEST_KEY, receiver).unwrap();
            let ciphertext = ctx.encrypt(&plaintext);
            prop_assert_eq!(ctx.decrypt(&ciphertext).unwrap(), plaintext);
        }

        #[test]
        fn prop_sign_depends_only_on_value_set(
            token in "[a-z]{1,8}",
            timestamp in "[0-9]{1,10}",
            nonce in "[a-z0-9]{1,10}",
            payload in "[A-Za-z0-9+/=]{0,40}",
        ) {
            let reference = sign(&token, &timestamp, &nonce, &payload);
            prop_assert_eq!(&sign(&token, &nonce, &timestamp, &payload), &reference);
            prop_assert_eq!(&sign(&payload, &timestamp, &nonce, &token), &reference);
            prop_assert_eq!(&sign(&nonce, &payload, &token, &timestamp), &reference);
        }
    }
}
