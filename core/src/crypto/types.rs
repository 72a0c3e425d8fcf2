// ## 📂 File: `src/crypto/types.rs`

use std::fmt;

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{cipher_ids, kdf_defaults, limits};

/// Stable key and nonce sizes.
pub const KEY_LEN_32: usize = 32;

/// Standard 12-byte nonce length for AES-GCM and ChaCha20-Poly1305.
pub const NONCE_LEN_12: usize = 12;

/// Fixed AEAD tag length (bytes).
pub const TAG_LEN: usize = 16;

/// Salt length for Argon2id, HKDF content salt and metadata salt.
pub const SALT_LEN_16: usize = 16;

/// AEAD cipher registry. The id is what the metadata records.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum CipherSuite {
    Aes256Gcm = cipher_ids::AES256_GCM,
    Chacha20Poly1305 = cipher_ids::CHACHA20_POLY1305,
}

impl CipherSuite {
    /// Canonical wire name, as stored in the metadata JSON.
    pub fn name(self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => "AES-256-GCM",
            CipherSuite::Chacha20Poly1305 => "CHACHA20-POLY1305",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        match name {
            "AES-256-GCM" => Ok(CipherSuite::Aes256Gcm),
            "CHACHA20-POLY1305" => Ok(CipherSuite::Chacha20Poly1305),
            other => Err(CryptoError::UnknownCipherName(other.to_string())),
        }
    }
}

impl Default for CipherSuite {
    fn default() -> Self {
        CipherSuite::Aes256Gcm
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: kdf_defaults::MEMORY_KIB,
            iterations: kdf_defaults::ITERATIONS,
            parallelism: kdf_defaults::PARALLELISM,
        }
    }
}

/// Upper bounds on Argon2id cost. Clamped on encrypt, enforced on decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfLimits {
    pub max_memory_kib: u32,
    pub max_iterations: u32,
    pub max_parallelism: u32,
}

impl Default for KdfLimits {
    fn default() -> Self {
        Self {
            max_memory_kib: limits::MAX_MEMORY_KIB,
            max_iterations: limits::MAX_ITERATIONS,
            max_parallelism: limits::MAX_PARALLELISM,
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Cipher id not in the registry.
    #[error("unsupported cipher suite: {}", hex_id(*cipher_id))]
    UnsupportedCipher { cipher_id: u8 },

    #[error("unknown cipher name: {0}")]
    UnknownCipherName(String),

    /// Invalid key length provided to cipher.
    #[error("invalid key length: expected={expected}, actual={actual}")]
    InvalidKeyLen { expected: usize, actual: usize },

    #[error("invalid nonce length: expected={expected}, actual={actual}")]
    InvalidNonceLen { expected: usize, actual: usize },

    /// Input shorter than the AEAD tag.
    #[error("ciphertext too short: have={have}, need={need}")]
    CiphertextTooShort { have: usize, need: usize },

    /// AEAD tag mismatch (authentication failure).
    #[error("AEAD tag mismatch")]
    TagMismatch,

    /// General derivation or runtime error with context.
    #[error("crypto failure: {0}")]
    Failure(String),
}

fn hex_id(id: u8) -> String {
    format!("0x{}", hex::encode([id]))
}
