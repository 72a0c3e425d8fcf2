//! config.rs
//! Engine configuration loaded from TOML.
//!
//! Every section and field is optional; missing values fall back to the
//! protocol defaults in `constants`.
//!
//! ```toml
//! [pool]
//! workers = 8          # 0 = in-process
//! max_inflight = 16
//!
//! [kdf]
//! memory_kib = 16384
//! iterations = 3
//! parallelism = 1
//!
//! [limits]
//! max_memory_kib = 262144
//! max_iterations = 16
//! max_parallelism = 8
//! max_header_len = 65536
//!
//! [archive]
//! format = "zip"       # or "tar"
//! compression = "store" # or "deflate"
//! deflate_level = 6
//!
//! [cipher]
//! id = 1               # 1 = AES-256-GCM, 2 = ChaCha20-Poly1305
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::types::{ArchiveFormat, ArchiveOptions, Compression};
use crate::constants::{cipher_ids, limits};
use crate::crypto::types::{CipherSuite, KdfLimits, KdfParams};
use crate::stream::parallelism::ParallelismProfile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: Option<usize>,
    pub max_inflight: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_memory_kib: u32,
    pub max_iterations: u32,
    pub max_parallelism: u32,
    pub max_header_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_kib: limits::MAX_MEMORY_KIB,
            max_iterations: limits::MAX_ITERATIONS,
            max_parallelism: limits::MAX_PARALLELISM,
            max_header_len: limits::MAX_HEADER_LEN,
        }
    }
}

impl LimitsConfig {
    pub fn kdf_limits(&self) -> KdfLimits {
        KdfLimits {
            max_memory_kib: self.max_memory_kib,
            max_iterations: self.max_iterations,
            max_parallelism: self.max_parallelism,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub id: u8,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self { id: cipher_ids::AES256_GCM }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub format: ArchiveFormat,
    pub compression: Compression,
    pub deflate_level: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let options = ArchiveOptions::default();
        Self {
            format: options.format,
            compression: options.compression,
            deflate_level: options.deflate_level,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub kdf: KdfParams,
    pub limits: LimitsConfig,
    pub archive: ArchiveConfig,
    pub cipher: CipherConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.max_inflight == Some(0) {
            return Err(ConfigError::Invalid("pool.max_inflight must be at least 1".into()));
        }
        if self.archive.deflate_level > 9 {
            return Err(ConfigError::Invalid(format!(
                "archive.deflate_level {} outside 0..=9",
                self.archive.deflate_level
            )));
        }
        if self.limits.max_header_len < 128 {
            return Err(ConfigError::Invalid("limits.max_header_len too small".into()));
        }
        self.cipher_suite()?;
        Ok(())
    }

    pub fn cipher_suite(&self) -> Result<CipherSuite, ConfigError> {
        CipherSuite::try_from(self.cipher.id)
            .map_err(|_| ConfigError::Invalid(format!("cipher.id {} is not a known cipher", self.cipher.id)))
    }

    pub fn profile(&self) -> ParallelismProfile {
        ParallelismProfile::resolve(self.pool.workers, self.pool.max_inflight)
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            format: self.archive.format,
            compression: self.archive.compression,
            deflate_level: self.archive.deflate_level,
        }
    }
}
