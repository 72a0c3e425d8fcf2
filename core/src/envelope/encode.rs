// ## 📂 File: `src/envelope/encode.rs`
//! src/envelope/encode.rs
//!
//! Header encoding utilities.
//!
//! Design notes:
//! - Field order must match `decode.rs` exactly.
//! - The blob length is known before sealing (plaintext + tag), so the AAD
//!   prefix, `header_len` included, can be built first.

use crate::constants::flags;
use crate::envelope::types::{EnvelopeHeader, KdfBlock};
use crate::types::StreamError;

#[inline]
fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Serialize everything in front of `blob_len`. This is also the metadata AAD.
pub fn encode_prefix(
    kdf: Option<&KdfBlock>,
    meta_salt: &[u8],
    meta_nonce: &[u8],
    header_nonce: &[u8],
    blob_len: usize,
) -> Result<Vec<u8>, StreamError> {
    let total = EnvelopeHeader::encoded_len_for(kdf.is_some(), blob_len);
    let total_u32 = u32::try_from(total)
        .map_err(|_| StreamError::Validation(format!("header of {total} bytes does not fit u32")))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&EnvelopeHeader::MAGIC);             // magic
    put_u32(&mut out, total_u32);                              // header_len
    out.push(if kdf.is_some() { flags::PASSWORD_PROTECTED } else { 0 }); // flags
    out.extend_from_slice(meta_salt);                          // meta_salt (16)
    out.extend_from_slice(meta_nonce);                         // meta_nonce (12)
    if let Some(block) = kdf {
        out.extend_from_slice(&block.salt);                    // kdf_salt (16)
        put_u32(&mut out, block.params.iterations);
        put_u32(&mut out, block.params.memory_kib);
        put_u32(&mut out, block.params.parallelism);
    }
    out.extend_from_slice(header_nonce);                       // header_nonce (12)
    Ok(out)
}

/// Serialize a complete header.
pub fn encode_header(h: &EnvelopeHeader) -> Result<Vec<u8>, StreamError> {
    if h.is_password_protected() != h.kdf.is_some() {
        return Err(StreamError::Validation("password flag and KDF block disagree".into()));
    }
    let blob_len = u32::try_from(h.blob.len())
        .map_err(|_| StreamError::Validation("metadata blob too large".into()))?;

    let mut out = encode_prefix(h.kdf.as_ref(), &h.meta_salt, &h.meta_nonce, &h.header_nonce, h.blob.len())?;
    put_u32(&mut out, blob_len);
    out.extend_from_slice(&h.blob);

    debug_assert_eq!(out.len(), h.encoded_len(), "encoding wrote incorrect length");
    Ok(out)
}
