// ## 2️⃣ `core.rs`: stable public API

//! Encrypt and decrypt entry points.
//!
//! Pull style: `EncryptingReader` / `DecryptingReader` wrap any `Read` and are
//! themselves `Read`. Push style: `encrypt_stream` / `decrypt_stream` copy a
//! reader into a writer and return a `TelemetrySnapshot`.
//!
//! Encrypted stream layout: SND1 header, then one sealed chunk per
//! `chunk_size` bytes of plaintext. The last chunk is always short, and empty
//! when the plaintext is an exact multiple of the chunk size, so a body cut at
//! a chunk boundary never decrypts cleanly.

use std::fmt;
use std::io::{self, Read, Write};

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::archive::{ArchiveInput, ArchiveOptions, ArchiveProducer};
use crate::config::{ConfigError, EngineConfig};
use crate::constants::{limits, CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::crypto::kdf::{clamp_params, default_kdf_salt, derive_content_secrets, enforce_limits, final_ikm, Ikm};
use crate::crypto::types::{CipherSuite, KdfLimits, KdfParams, KEY_LEN_32, SALT_LEN_16, TAG_LEN};
use crate::envelope::{encode_header, open_metadata, read_header, seal_envelope, ContentMetadata, KdfBlock};
use crate::stream::chunk_worker::{ChunkCodec, Direction};
use crate::stream::parallelism::ParallelismProfile;
use crate::stream::pipeline::{ChunkStats, ChunkStream};
use crate::telemetry::{TelemetryCounters, TelemetrySnapshot};
use crate::types::StreamError;

#[derive(Debug)]
pub struct EncryptParams {
    /// Mixed into the IKM with Argon2id when present.
    pub password: Option<SecretString>,
    pub cipher: CipherSuite,
    pub kdf: KdfParams,
    pub kdf_limits: KdfLimits,
    pub chunk_size: usize,
    /// Recorded in the metadata and enforced on both ends when known.
    pub plaintext_size: Option<u64>,
    pub profile: ParallelismProfile,
}

impl Default for EncryptParams {
    fn default() -> Self {
        Self {
            password: None,
            cipher: CipherSuite::default(),
            kdf: KdfParams::default(),
            kdf_limits: KdfLimits::default(),
            chunk_size: CHUNK_SIZE,
            plaintext_size: None,
            profile: ParallelismProfile::default(),
        }
    }
}

impl EncryptParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cipher: config.cipher_suite()?,
            kdf: config.kdf,
            kdf_limits: config.limits.kdf_limits(),
            profile: config.profile(),
            ..Self::default()
        })
    }

    /// An empty string leaves the params without a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then(|| SecretString::from(password));
        self
    }

    pub fn with_plaintext_size(mut self, size: u64) -> Self {
        self.plaintext_size = Some(size);
        self
    }

    pub fn with_profile(mut self, profile: ParallelismProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(StreamError::Validation(format!(
                "chunk size {} outside 1..={MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Decryption settings.
///
/// Output is released chunk by chunk as each one authenticates. A later
/// failure cannot take back what was already released, so callers that must
/// never expose a partial file decrypt into a discardable sink first.
#[derive(Debug)]
pub struct DecryptParams {
    pub password: Option<SecretString>,
    /// Caps on KDF cost read from an untrusted header.
    pub kdf_limits: KdfLimits,
    pub max_header_len: usize,
    pub profile: ParallelismProfile,
}

impl Default for DecryptParams {
    fn default() -> Self {
        Self {
            password: None,
            kdf_limits: KdfLimits::default(),
            max_header_len: limits::MAX_HEADER_LEN,
            profile: ParallelismProfile::default(),
        }
    }
}

impl DecryptParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            kdf_limits: config.limits.kdf_limits(),
            max_header_len: config.limits.max_header_len,
            profile: config.profile(),
            ..Self::default()
        }
    }

    /// An empty string leaves the params without a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then(|| SecretString::from(password));
        self
    }

    pub fn with_profile(mut self, profile: ParallelismProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// An empty password means no password.
fn supplied_password(password: &Option<SecretString>) -> Option<&SecretString> {
    password.as_ref().filter(|pw| !pw.expose_secret().is_empty())
}

fn counters_for(stats: &ChunkStats, plaintext: u64, ciphertext: u64, header_len: usize) -> TelemetryCounters {
    let mut counters = TelemetryCounters {
        chunks: stats.chunks,
        bytes_plaintext: plaintext,
        bytes_ciphertext: ciphertext,
        bytes_overhead: stats.chunks * TAG_LEN as u64,
    };
    counters.add_header(header_len);
    counters
}

// -----------------------------------------------------------------------------
// Encryption
// -----------------------------------------------------------------------------

/// Header bytes first, then the sealed chunks of `source`.
pub struct EncryptingReader<R: Read> {
    header: Vec<u8>,
    header_pos: usize,
    body: ChunkStream<R, ChunkCodec>,
    chunk_size: usize,
    plaintext_size: Option<u64>,
    failed: Option<StreamError>,
}

impl<R: Read> fmt::Debug for EncryptingReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptingReader")
            .field("header_len", &self.header.len())
            .field("plaintext_size", &self.plaintext_size)
            .field("stats", &self.body.stats())
            .finish_non_exhaustive()
    }
}

impl<R: Read> EncryptingReader<R> {
    pub fn new(source: R, ikm: &Ikm, params: EncryptParams) -> Result<Self, StreamError> {
        params.validate()?;

        let (mixed, kdf): (Zeroizing<[u8; KEY_LEN_32]>, Option<KdfBlock>) = match supplied_password(&params.password) {
            Some(password) => {
                let kdf_params = clamp_params(params.kdf, &params.kdf_limits);
                let salt = default_kdf_salt(ikm);
                let mixed = final_ikm(ikm, Some(password), &salt, &kdf_params)?;
                (mixed, Some(KdfBlock { salt, params: kdf_params }))
            }
            None => (Zeroizing::new(*ikm.as_bytes()), None),
        };

        let mut content_salt = [0u8; SALT_LEN_16];
        OsRng.fill_bytes(&mut content_salt);
        let secrets = derive_content_secrets(&mixed, &content_salt)?;

        let metadata = ContentMetadata {
            cipher: params.cipher,
            content_salt,
            base_nonce: secrets.base_nonce,
            chunk_size: params.chunk_size as u32,
            plaintext_size: params.plaintext_size,
        };
        let header = encode_header(&seal_envelope(&mixed, kdf, &metadata)?)?;
        info!(
            header_len = header.len(),
            cipher = %params.cipher,
            password = kdf.is_some(),
            plaintext_size = ?params.plaintext_size,
            "envelope sealed"
        );

        let codec = ChunkCodec::new(params.cipher, &secrets.cipher_key[..], secrets.base_nonce, Direction::Encrypt)?;
        let body = ChunkStream::new(source, codec, params.chunk_size, params.profile)?;

        Ok(Self {
            header,
            header_pos: 0,
            body,
            chunk_size: params.chunk_size,
            plaintext_size: params.plaintext_size,
            failed: None,
        })
    }

    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    pub fn stats(&self) -> ChunkStats {
        self.body.stats()
    }

    /// Total output length when the plaintext size is known.
    pub fn predicted_len(&self) -> Option<u64> {
        let size = self.plaintext_size?;
        let chunks = size / self.chunk_size as u64 + 1;
        Some(self.header.len() as u64 + size + chunks * TAG_LEN as u64)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let stats = self.body.stats();
        let counters = counters_for(&stats, stats.bytes_in, stats.bytes_out, self.header.len());
        TelemetrySnapshot::from(&counters, self.body.elapsed(), self.body.workers(), self.body.is_sequential())
    }

    /// Stop reading the source and release the workers.
    pub fn cancel(&mut self) {
        self.body.cancel();
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if let Some(err) = &self.failed {
            return Err(err.duplicate());
        }
        if self.header_pos < self.header.len() {
            let n = buf.len().min(self.header.len() - self.header_pos);
            buf[..n].copy_from_slice(&self.header[self.header_pos..self.header_pos + n]);
            self.header_pos += n;
            return Ok(n);
        }
        let n = self.body.read_chunk_output(buf)?;
        if n == 0 && self.body.is_finished() {
            if let Some(declared) = self.plaintext_size {
                let seen = self.body.stats().bytes_in;
                if seen != declared {
                    let err = StreamError::Validation(format!(
                        "source produced {seen} bytes, {declared} declared in the envelope"
                    ));
                    self.failed = Some(err.duplicate());
                    return Err(err);
                }
            }
        }
        Ok(n)
    }
}

impl<R: Read> Read for EncryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(StreamError::into_io)
    }
}

// -----------------------------------------------------------------------------
// Decryption
// -----------------------------------------------------------------------------

/// Ciphertext body of a known length. Early EOF is a truncation, anything past
/// the end is a format error.
struct BoundedBody<R: Read> {
    inner: R,
    remaining: Option<u64>,
}

impl<R: Read> Read for BoundedBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(remaining) = self.remaining else {
            return self.inner.read(buf);
        };
        if buf.is_empty() {
            return Ok(0);
        }
        if remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(StreamError::UnsupportedFormat("data after the final chunk".into()).into_io()),
            };
        }
        let cap = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            return Err(StreamError::TruncatedStream(format!("body ended {remaining} bytes early")).into_io());
        }
        self.remaining = Some(remaining - n as u64);
        Ok(n)
    }
}

/// Ciphertext length of a body carrying `plaintext_size` bytes.
fn expected_body_len(plaintext_size: u64, chunk_size: u32) -> Result<u64, StreamError> {
    let chunks = plaintext_size / u64::from(chunk_size) + 1;
    chunks
        .checked_mul(TAG_LEN as u64)
        .and_then(|tags| tags.checked_add(plaintext_size))
        .ok_or_else(|| StreamError::UnsupportedFormat(format!("plaintext size {plaintext_size} out of range")))
}

/// Parses and authenticates the header on construction, then yields plaintext.
pub struct DecryptingReader<R: Read> {
    metadata: ContentMetadata,
    header_len: usize,
    body: ChunkStream<BoundedBody<R>, ChunkCodec>,
    failed: Option<StreamError>,
}

impl<R: Read> fmt::Debug for DecryptingReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptingReader")
            .field("header_len", &self.header_len)
            .field("cipher", &self.metadata.cipher)
            .field("plaintext_size", &self.metadata.plaintext_size)
            .field("stats", &self.body.stats())
            .finish_non_exhaustive()
    }
}

impl<R: Read> DecryptingReader<R> {
    pub fn new(mut source: R, ikm: &Ikm, params: DecryptParams) -> Result<Self, StreamError> {
        let header = read_header(&mut source, params.max_header_len)?;
        let header_len = header.encoded_len();

        let mixed = match (header.is_password_protected(), header.kdf.as_ref()) {
            (true, Some(kdf)) => {
                let password = supplied_password(&params.password).ok_or(StreamError::PasswordRequired)?;
                enforce_limits(&kdf.params, &params.kdf_limits)?;
                final_ikm(ikm, Some(password), &kdf.salt, &kdf.params)?
            }
            (true, None) => {
                return Err(StreamError::UnsupportedFormat("password flag without a KDF block".into()));
            }
            (false, _) => {
                if supplied_password(&params.password).is_some() {
                    debug!("envelope is not password protected; ignoring supplied password");
                }
                Zeroizing::new(*ikm.as_bytes())
            }
        };

        let metadata = open_metadata(&header, &mixed)?;
        let secrets = derive_content_secrets(&mixed, &metadata.content_salt)?;
        if secrets.base_nonce != metadata.base_nonce {
            return Err(StreamError::UnsupportedFormat("base nonce does not match the key schedule".into()));
        }

        let remaining = metadata
            .plaintext_size
            .map(|size| expected_body_len(size, metadata.chunk_size))
            .transpose()?;
        info!(
            header_len,
            cipher = %metadata.cipher,
            chunk_size = metadata.chunk_size,
            plaintext_size = ?metadata.plaintext_size,
            "envelope opened"
        );

        let codec = ChunkCodec::new(metadata.cipher, &secrets.cipher_key[..], secrets.base_nonce, Direction::Decrypt)?;
        let block_len = metadata.chunk_size as usize + TAG_LEN;
        let body = ChunkStream::new(BoundedBody { inner: source, remaining }, codec, block_len, params.profile)?;

        Ok(Self { metadata, header_len, body, failed: None })
    }

    pub fn metadata(&self) -> &ContentMetadata {
        &self.metadata
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn plaintext_size(&self) -> Option<u64> {
        self.metadata.plaintext_size
    }

    pub fn stats(&self) -> ChunkStats {
        self.body.stats()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let stats = self.body.stats();
        let counters = counters_for(&stats, stats.bytes_out, stats.bytes_in, self.header_len);
        TelemetrySnapshot::from(&counters, self.body.elapsed(), self.body.workers(), self.body.is_sequential())
    }

    pub fn cancel(&mut self) {
        self.body.cancel();
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if let Some(err) = &self.failed {
            return Err(err.duplicate());
        }
        let n = self.body.read_chunk_output(buf)?;
        if n == 0 && self.body.is_finished() {
            if let Some(declared) = self.metadata.plaintext_size {
                let seen = self.body.stats().bytes_out;
                if seen != declared {
                    let err = StreamError::TruncatedStream(format!("decrypted {seen} of {declared} bytes"));
                    self.failed = Some(err.duplicate());
                    return Err(err);
                }
            }
        }
        Ok(n)
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(StreamError::into_io)
    }
}

// -----------------------------------------------------------------------------
// Push style
// -----------------------------------------------------------------------------

/// 🔐 Encrypt `input` into `output`.
pub fn encrypt_stream<R: Read, W: Write>(
    input: R,
    mut output: W,
    ikm: &Ikm,
    params: EncryptParams,
) -> Result<TelemetrySnapshot, StreamError> {
    let mut reader = EncryptingReader::new(input, ikm, params)?;
    io::copy(&mut reader, &mut output)?;
    output.flush()?;
    Ok(reader.snapshot())
}

/// 🔓 Decrypt `input` into `output`.
///
/// Plaintext is written as whole chunks authenticate, so on error `output`
/// already holds a verified prefix. Write to a sink that can be thrown away
/// (a temporary file, a buffer) and only commit it once this returns `Ok`.
pub fn decrypt_stream<R: Read, W: Write>(
    input: R,
    mut output: W,
    ikm: &Ikm,
    params: DecryptParams,
) -> Result<TelemetrySnapshot, StreamError> {
    let mut reader = DecryptingReader::new(input, ikm, params)?;
    io::copy(&mut reader, &mut output)?;
    output.flush()?;
    Ok(reader.snapshot())
}

/// Archive `inputs` and encrypt the archive under a fresh IKM.
///
/// The plaintext size is recorded whenever the archive length is predictable.
pub fn encrypt_files(
    inputs: Vec<ArchiveInput>,
    options: ArchiveOptions,
    mut params: EncryptParams,
) -> Result<(EncryptingReader<ArchiveProducer>, Ikm), StreamError> {
    let producer = ArchiveProducer::new(inputs, options)?;
    params.plaintext_size = params.plaintext_size.or(producer.predicted_len());
    let ikm = Ikm::generate();
    let reader = EncryptingReader::new(producer, &ikm, params)?;
    Ok((reader, ikm))
}
