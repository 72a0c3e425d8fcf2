// ## src/crypto/kdf.rs

//! crypto/kdf.rs
//! Key schedule: IKM → (optional Argon2id password mix) → HKDF sub-keys.
//!
//! Design:
//! - `ikm_salt = SHA-256(ikm ‖ "chithi-salt-v1")` is file-unique and never transmitted.
//! - A password is stretched with Argon2id and XORed into the IKM. Either half
//!   alone is insufficient to reconstruct `final_ikm`.
//! - Cipher key and base nonce come from HKDF-SHA-512 with distinct info strings.
//! - The metadata key is HKDF-SHA-512 under its own salt, with the metadata nonce
//!   appended to the info so every header gets a fresh key.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha512};
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

use crate::constants::{domains, IKM_LEN};
use crate::crypto::types::{KdfLimits, KdfParams, KEY_LEN_32, NONCE_LEN_12, SALT_LEN_16};
use crate::types::StreamError;

/// Input key material: the one secret the user keeps.
#[derive(Clone)]
pub struct Ikm([u8; IKM_LEN]);

impl Ikm {
    /// Fresh IKM from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IKM_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; IKM_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; IKM_LEN] {
        &self.0
    }

    /// URL-safe base64 without padding, suitable for a link fragment.
    pub fn to_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_token(token: &str) -> Result<Self, StreamError> {
        let decoded = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(token.trim())
                .map_err(|e| StreamError::InvalidKeyToken(e.to_string()))?,
        );
        if decoded.len() != IKM_LEN {
            return Err(StreamError::InvalidKeyToken(format!(
                "expected {IKM_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        let mut bytes = [0u8; IKM_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Drop for Ikm {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Ikm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ikm([REDACTED])")
    }
}

/// Cipher key and base nonce for the content stream.
pub struct ContentSecrets {
    pub cipher_key: Zeroizing<[u8; KEY_LEN_32]>,
    pub base_nonce: [u8; NONCE_LEN_12],
}

impl fmt::Debug for ContentSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSecrets")
            .field("cipher_key", &"[REDACTED]")
            .field("base_nonce", &"[REDACTED]")
            .finish()
    }
}

/// Salts that went into a header-free derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltsUsed {
    pub ikm_salt: [u8; 32],
    /// Argon2id salt, only when a password was mixed in.
    pub kdf_salt: Option<[u8; SALT_LEN_16]>,
}

/// Fully deterministic secrets: same IKM and password give the same values.
#[derive(Debug)]
pub struct DerivedSecrets {
    pub content: ContentSecrets,
    pub salts_used: SaltsUsed,
}

/// SHA-256 over the IKM and the salt domain string.
pub fn ikm_salt(ikm: &Ikm) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ikm.as_bytes());
    hasher.update(domains::IKM_SALT);
    hasher.finalize().into()
}

/// Argon2id salt used for new envelopes: the first half of the IKM salt.
pub fn default_kdf_salt(ikm: &Ikm) -> [u8; SALT_LEN_16] {
    let mut salt = [0u8; SALT_LEN_16];
    salt.copy_from_slice(&ikm_salt(ikm)[..SALT_LEN_16]);
    salt
}

/// Lower over-cap parameters to the cap, warning for each one touched.
pub fn clamp_params(params: KdfParams, limits: &KdfLimits) -> KdfParams {
    let mut out = params;
    if out.memory_kib > limits.max_memory_kib {
        warn!(requested = out.memory_kib, cap = limits.max_memory_kib, "argon2 memory clamped");
        out.memory_kib = limits.max_memory_kib;
    }
    if out.iterations > limits.max_iterations {
        warn!(requested = out.iterations, cap = limits.max_iterations, "argon2 iterations clamped");
        out.iterations = limits.max_iterations;
    }
    if out.parallelism > limits.max_parallelism {
        warn!(requested = out.parallelism, cap = limits.max_parallelism, "argon2 parallelism clamped");
        out.parallelism = limits.max_parallelism;
    }
    out
}

/// Reject parameters read from an untrusted header that exceed the caps.
pub fn enforce_limits(params: &KdfParams, limits: &KdfLimits) -> Result<(), StreamError> {
    if params.memory_kib > limits.max_memory_kib {
        return Err(StreamError::ResourceExhausted(format!(
            "argon2 memory {} KiB exceeds cap {} KiB",
            params.memory_kib, limits.max_memory_kib
        )));
    }
    if params.iterations > limits.max_iterations {
        return Err(StreamError::ResourceExhausted(format!(
            "argon2 iterations {} exceed cap {}",
            params.iterations, limits.max_iterations
        )));
    }
    if params.parallelism > limits.max_parallelism {
        return Err(StreamError::ResourceExhausted(format!(
            "argon2 parallelism {} exceeds cap {}",
            params.parallelism, limits.max_parallelism
        )));
    }
    Ok(())
}

/// `ikm XOR argon2id(password, salt)`.
/// Parameters are used as given; callers clamp or enforce first.
pub fn mix_password(
    ikm: &Ikm,
    password: &SecretString,
    salt: &[u8; SALT_LEN_16],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN_32]>, StreamError> {
    let argon_params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(KEY_LEN_32))
        .map_err(|e| StreamError::Validation(format!("argon2 parameters: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut stretched = Zeroizing::new([0u8; KEY_LEN_32]);
    argon
        .hash_password_into(password.expose_secret().as_bytes(), salt, &mut stretched[..])
        .map_err(|e| StreamError::Validation(format!("argon2: {e}")))?;

    let mut final_ikm = Zeroizing::new(*ikm.as_bytes());
    for (dst, src) in final_ikm.iter_mut().zip(stretched.iter()) {
        *dst ^= src;
    }
    Ok(final_ikm)
}

/// IKM with the password mixed in, or the IKM itself when there is none.
pub fn final_ikm(
    ikm: &Ikm,
    password: Option<&SecretString>,
    salt: &[u8; SALT_LEN_16],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN_32]>, StreamError> {
    match password {
        Some(pw) => mix_password(ikm, pw, salt, params),
        None => Ok(Zeroizing::new(*ikm.as_bytes())),
    }
}

#[inline]
fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[&[u8]], out: &mut [u8]) -> Result<(), StreamError> {
    Hkdf::<Sha512>::new(Some(salt), ikm)
        .expand_multi_info(info, out)
        .map_err(|_| StreamError::Validation("HKDF expand failed (SHA-512)".into()))
}

/// Content cipher key ("aes-key") and base nonce ("iv") from `final_ikm`.
pub fn derive_content_secrets(final_ikm: &[u8; KEY_LEN_32], content_salt: &[u8]) -> Result<ContentSecrets, StreamError> {
    let mut cipher_key = Zeroizing::new([0u8; KEY_LEN_32]);
    hkdf_expand(final_ikm, content_salt, &[domains::CIPHER_KEY], &mut cipher_key[..])?;

    let mut base_nonce = [0u8; NONCE_LEN_12];
    hkdf_expand(final_ikm, content_salt, &[domains::BASE_NONCE], &mut base_nonce)?;

    Ok(ContentSecrets { cipher_key, base_nonce })
}

/// Key for the encrypted metadata blob of one header.
pub fn derive_metadata_key(
    final_ikm: &[u8; KEY_LEN_32],
    meta_salt: &[u8; SALT_LEN_16],
    meta_nonce: &[u8; NONCE_LEN_12],
) -> Result<Zeroizing<[u8; KEY_LEN_32]>, StreamError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN_32]);
    hkdf_expand(final_ikm, meta_salt, &[domains::METADATA_KEY, &meta_nonce[..]], &mut key[..])?;
    Ok(key)
}

/// Header-free derivation. Everything, salts included, follows from the IKM.
/// Over-cap parameters are clamped against the default limits.
pub fn derive_secrets(
    ikm: &Ikm,
    password: Option<&SecretString>,
    kdf: &KdfParams,
) -> Result<DerivedSecrets, StreamError> {
    let salt = ikm_salt(ikm);
    let mut kdf_salt = [0u8; SALT_LEN_16];
    kdf_salt.copy_from_slice(&salt[..SALT_LEN_16]);

    let params = clamp_params(*kdf, &KdfLimits::default());
    let mixed = final_ikm(ikm, password, &kdf_salt, &params)?;
    let content = derive_content_secrets(&mixed, &salt[SALT_LEN_16..])?;

    Ok(DerivedSecrets {
        content,
        salts_used: SaltsUsed {
            ikm_salt: salt,
            kdf_salt: password.map(|_| kdf_salt),
        },
    })
}
