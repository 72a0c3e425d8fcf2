//! Chunk codec: stateless AEAD over one chunk, keyed by its index.

use std::fmt;

use crate::crypto::aead::AeadImpl;
use crate::crypto::nonce::chunk_nonce;
use crate::crypto::types::{CipherSuite, NONCE_LEN_12};
use crate::stream::chunk_worker::types::ChunkTransform;
use crate::types::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Content cipher bound to one base nonce. Chunks carry no AAD; the index is
/// bound through the nonce.
#[derive(Clone)]
pub struct ChunkCodec {
    aead: AeadImpl,
    base_nonce: [u8; NONCE_LEN_12],
    direction: Direction,
}

impl fmt::Debug for ChunkCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCodec").field("direction", &self.direction).finish_non_exhaustive()
    }
}

impl ChunkCodec {
    pub fn new(
        suite: CipherSuite,
        key: &[u8],
        base_nonce: [u8; NONCE_LEN_12],
        direction: Direction,
    ) -> Result<Self, StreamError> {
        Ok(Self { aead: AeadImpl::new(suite, key)?, base_nonce, direction })
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Seal one chunk: ciphertext ‖ tag. Empty input yields a tag-only chunk.
    pub fn encrypt_chunk(&self, index: u32, plaintext: &[u8]) -> Result<Vec<u8>, StreamError> {
        let nonce = chunk_nonce(&self.base_nonce, index);
        Ok(self.aead.seal(&nonce, &[], plaintext)?)
    }

    /// Open one chunk. Shorter than a tag is `TruncatedStream`; a bad tag is
    /// `AuthenticationFailed`.
    pub fn decrypt_chunk(&self, index: u32, ciphertext: &[u8]) -> Result<Vec<u8>, StreamError> {
        let nonce = chunk_nonce(&self.base_nonce, index);
        Ok(self.aead.open(&nonce, &[], ciphertext)?)
    }
}

impl ChunkTransform for ChunkCodec {
    fn apply(&self, index: u32, buffer: Vec<u8>) -> Result<Vec<u8>, StreamError> {
        match self.direction {
            Direction::Encrypt => self.encrypt_chunk(index, &buffer),
            Direction::Decrypt => self.decrypt_chunk(index, &buffer),
        }
    }
}
