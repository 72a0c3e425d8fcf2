//! envelope/metadata.rs
//! Encrypted metadata carried inside the header blob.
//!
//! The plaintext is a small JSON document. It is sealed with AES-256-GCM under a
//! key derived from `final_ikm` and the header's own salt/nonce, with every header
//! byte in front of `blob_len` as AAD, so flags and KDF parameters cannot be
//! swapped without failing authentication.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::constants::{flags, MAX_CHUNK_SIZE, METADATA_V1};
use crate::crypto::aead::AeadImpl;
use crate::crypto::kdf::derive_metadata_key;
use crate::crypto::types::{CipherSuite, KEY_LEN_32, NONCE_LEN_12, SALT_LEN_16, TAG_LEN};
use crate::envelope::encode::encode_prefix;
use crate::envelope::types::{EnvelopeHeader, KdfBlock};
use crate::types::StreamError;

/// Decrypted metadata: everything needed to rebuild the content key schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMetadata {
    pub cipher: CipherSuite,
    pub content_salt: [u8; SALT_LEN_16],
    pub base_nonce: [u8; NONCE_LEN_12],
    pub chunk_size: u32,
    /// Known when the producer could size the input up front.
    pub plaintext_size: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct MetadataWire {
    v: u8,
    cipher: String,
    content_salt: String,
    base_nonce: String,
    chunk_size: u32,
    plaintext_size: Option<u64>,
}

fn decode_fixed<const N: usize>(field: &str, b64: &str) -> Result<[u8; N], StreamError> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| StreamError::UnsupportedFormat(format!("metadata {field}: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        StreamError::UnsupportedFormat(format!("metadata {field}: expected {N} bytes, got {}", bytes.len()))
    })
}

impl ContentMetadata {
    pub fn to_json(&self) -> Result<Vec<u8>, StreamError> {
        let wire = MetadataWire {
            v: METADATA_V1,
            cipher: self.cipher.name().to_string(),
            content_salt: STANDARD.encode(self.content_salt),
            base_nonce: STANDARD.encode(self.base_nonce),
            chunk_size: self.chunk_size,
            plaintext_size: self.plaintext_size,
        };
        serde_json::to_vec(&wire).map_err(|e| StreamError::Validation(format!("metadata encode: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StreamError> {
        let wire: MetadataWire = serde_json::from_slice(bytes)
            .map_err(|e| StreamError::UnsupportedFormat(format!("metadata json: {e}")))?;
        if wire.v != METADATA_V1 {
            return Err(StreamError::UnsupportedFormat(format!("metadata version {}", wire.v)));
        }
        if wire.chunk_size == 0 || wire.chunk_size as usize > MAX_CHUNK_SIZE {
            return Err(StreamError::UnsupportedFormat(format!("chunk size {}", wire.chunk_size)));
        }
        let cipher = CipherSuite::from_name(&wire.cipher)
            .map_err(|e| StreamError::UnsupportedFormat(e.to_string()))?;

        Ok(Self {
            cipher,
            content_salt: decode_fixed::<SALT_LEN_16>("content_salt", &wire.content_salt)?,
            base_nonce: decode_fixed::<NONCE_LEN_12>("base_nonce", &wire.base_nonce)?,
            chunk_size: wire.chunk_size,
            plaintext_size: wire.plaintext_size,
        })
    }
}

/// Build a header around `meta`, with fresh random salt and nonces.
pub fn seal_envelope(
    final_ikm: &[u8; KEY_LEN_32],
    kdf: Option<KdfBlock>,
    meta: &ContentMetadata,
) -> Result<EnvelopeHeader, StreamError> {
    let mut meta_salt = [0u8; SALT_LEN_16];
    let mut meta_nonce = [0u8; NONCE_LEN_12];
    let mut header_nonce = [0u8; NONCE_LEN_12];
    OsRng.fill_bytes(&mut meta_salt);
    OsRng.fill_bytes(&mut meta_nonce);
    OsRng.fill_bytes(&mut header_nonce);

    let key = derive_metadata_key(final_ikm, &meta_salt, &meta_nonce)?;
    let json = meta.to_json()?;
    let aad = encode_prefix(kdf.as_ref(), &meta_salt, &meta_nonce, &header_nonce, json.len() + TAG_LEN)?;
    let blob = AeadImpl::new(CipherSuite::Aes256Gcm, &key[..])?.seal(&header_nonce, &aad, &json)?;

    Ok(EnvelopeHeader {
        flags: if kdf.is_some() { flags::PASSWORD_PROTECTED } else { 0 },
        meta_salt,
        meta_nonce,
        kdf,
        header_nonce,
        blob,
    })
}

/// Authenticate and decode the metadata blob.
/// A wrong key or password surfaces as `AuthenticationFailed`.
pub fn open_metadata(header: &EnvelopeHeader, final_ikm: &[u8; KEY_LEN_32]) -> Result<ContentMetadata, StreamError> {
    let key = derive_metadata_key(final_ikm, &header.meta_salt, &header.meta_nonce)?;
    let aad = encode_prefix(
        header.kdf.as_ref(),
        &header.meta_salt,
        &header.meta_nonce,
        &header.header_nonce,
        header.blob.len(),
    )?;
    let json = AeadImpl::new(CipherSuite::Aes256Gcm, &key[..])?.open(&header.header_nonce, &aad, &header.blob)?;
    ContentMetadata::from_json(&json)
}
