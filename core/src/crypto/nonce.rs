//! crypto/nonce.rs
//! Per-chunk nonce schedule.
//!
//! The low 32 bits of the base nonce are XORed with the big-endian chunk
//! index. For a fixed base nonce this is a bijection on u32, so indices
//! never share a nonce and nothing per-chunk goes on the wire.

use crate::crypto::types::NONCE_LEN_12;

/// Nonce for chunk `index` under `base_nonce`.
#[inline]
pub fn chunk_nonce(base_nonce: &[u8; NONCE_LEN_12], index: u32) -> [u8; NONCE_LEN_12] {
    let mut nonce = *base_nonce;
    for (dst, src) in nonce[8..].iter_mut().zip(index.to_be_bytes()) {
        *dst ^= src;
    }
    nonce
}
