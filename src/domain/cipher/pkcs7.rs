//! PKCS#7 padding over 32-byte blocks.
//!
//! The chat platforms pad to 32 bytes even though AES itself works on 16-byte
//! blocks. Input already aligned to 32 bytes gets a full extra block of `32`.

use super::CipherError;

/// Block size used by the platform message protocol.
pub const PAD_BLOCK_SIZE: usize = 32;

/// Appends PKCS#7 padding so the result is a multiple of [`PAD_BLOCK_SIZE`].
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = PAD_BLOCK_SIZE - (data.len() % PAD_BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Strips PKCS#7 padding.
///
/// # Errors
///
/// Returns `CipherError::PaddingInvalid` when the buffer is empty, the pad byte
/// is outside `[1, 32]`, or the pad is longer than the buffer.
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8], CipherError> {
    let pad = *data.last().ok_or(CipherError::PaddingInvalid(0))?;
    let len = pad as usize;
    if len == 0 || len > PAD_BLOCK_SIZE || len > data.len() {
        return Err(CipherError::PaddingInvalid(pad));
    }
    Ok(&data[..data.len() - len])
}
