// ## 📂 File: `src/envelope/types.rs`

use crate::constants::{flags, MAGIC_SND1};
use crate::crypto::types::{KdfParams, NONCE_LEN_12, SALT_LEN_16};

/// Argon2id parameter block, present iff the password flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfBlock {
    pub salt: [u8; SALT_LEN_16],
    pub params: KdfParams,
}

impl KdfBlock {
    /// salt + iterations + memory_kib + parallelism
    pub const LEN: usize = SALT_LEN_16 + 4 + 4 + 4;
}

/// Parsed "SND1" header. All integers on the wire are big-endian.
///
/// ```text
/// magic(4) | header_len u32 | flags u8 | meta_salt(16) | meta_nonce(12)
/// | [kdf_salt(16) | iterations u32 | memory_kib u32 | parallelism u32]
/// | header_nonce(12) | blob_len u32 | blob
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub flags: u8,
    /// HKDF salt for the metadata key.
    pub meta_salt: [u8; SALT_LEN_16],
    /// Bound into the metadata key's HKDF info.
    pub meta_nonce: [u8; NONCE_LEN_12],
    pub kdf: Option<KdfBlock>,
    /// AEAD nonce of the metadata blob.
    pub header_nonce: [u8; NONCE_LEN_12],
    /// Metadata ciphertext ‖ tag.
    pub blob: Vec<u8>,
}

impl EnvelopeHeader {
    pub const MAGIC: [u8; 4] = MAGIC_SND1;

    /// magic + header_len + flags + meta_salt + meta_nonce + header_nonce + blob_len
    pub const FIXED_LEN: usize = 4 + 4 + 1 + SALT_LEN_16 + NONCE_LEN_12 + NONCE_LEN_12 + 4;

    /// Bytes needed before the header length is known.
    pub const PREAMBLE_LEN: usize = 8;

    #[inline]
    pub fn is_password_protected(&self) -> bool {
        self.flags & flags::PASSWORD_PROTECTED != 0
    }

    /// Total encoded length, magic and blob included.
    pub fn encoded_len(&self) -> usize {
        Self::encoded_len_for(self.kdf.is_some(), self.blob.len())
    }

    pub fn encoded_len_for(has_kdf: bool, blob_len: usize) -> usize {
        Self::FIXED_LEN + if has_kdf { KdfBlock::LEN } else { 0 } + blob_len
    }

    /// Length of the prefix that authenticates the blob (everything before `blob_len`).
    pub fn aad_len(&self) -> usize {
        self.encoded_len() - 4 - self.blob.len()
    }
}
