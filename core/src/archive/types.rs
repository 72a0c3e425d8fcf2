// ## 📂 File: `src/archive/types.rs`

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    Tar,
}

/// ZIP entry method. TAR ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Store,
    Deflate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub format: ArchiveFormat,
    pub compression: Compression,
    /// 0..=9; anything else makes deflate unavailable and entries are stored.
    pub deflate_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self { format: ArchiveFormat::Zip, compression: Compression::Store, deflate_level: 6 }
    }
}

/// One finalized entry, as recorded in the ZIP central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    /// Uncompressed size.
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    /// Offset of the entry's header in the archive stream.
    pub offset: u64,
    pub modified: DateTime<Utc>,
    /// 0 = store, 8 = deflate.
    pub method: u16,
}

pub enum EntrySource {
    /// Opened only when the producer reaches this entry.
    Path(PathBuf),
    Reader(Box<dyn Read + Send>),
    Bytes(Vec<u8>),
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            EntrySource::Reader(_) => f.write_str("Reader(..)"),
            EntrySource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

/// A file to place in the archive.
#[derive(Debug)]
pub struct ArchiveInput {
    pub name: String,
    /// Required for TAR; lets ZIP predict its total length in store mode.
    pub size: Option<u64>,
    pub modified: DateTime<Utc>,
    pub source: EntrySource,
}

impl ArchiveInput {
    /// Size and modification time come from the filesystem; the file itself is
    /// not opened until its turn.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::InvalidName(path.display().to_string()))?;
        let meta = std::fs::metadata(path).map_err(|source| ArchiveError::Io { name: name.clone(), source })?;
        let modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());

        Ok(Self { name, size: Some(meta.len()), modified, source: EntrySource::Path(path.to_path_buf()) })
    }

    pub fn from_reader(name: impl Into<String>, reader: impl Read + Send + 'static, size: Option<u64>) -> Self {
        Self { name: name.into(), size, modified: Utc::now(), source: EntrySource::Reader(Box::new(reader)) }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: Some(bytes.len() as u64),
            modified: Utc::now(),
            source: EntrySource::Bytes(bytes),
        }
    }

    /// Archive path differs from the file name (e.g. a relative directory path).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub(crate) fn open(source: EntrySource, name: &str) -> Result<Box<dyn Read + Send>, ArchiveError> {
        match source {
            EntrySource::Path(p) => {
                let file = File::open(&p).map_err(|source| ArchiveError::Io { name: name.to_string(), source })?;
                Ok(Box::new(file))
            }
            EntrySource::Reader(r) => Ok(r),
            EntrySource::Bytes(b) => Ok(Box::new(Cursor::new(b))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on entry {name}: {source}")]
    Io { name: String, source: io::Error },

    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    #[error("entry {0} needs a known size for this archive format")]
    MissingSize(String),

    #[error("entry {name}: declared {declared} bytes, source produced {actual}")]
    SizeMismatch { name: String, declared: u64, actual: u64 },

    /// Beyond classic ZIP or USTAR field capacity.
    #[error("archive too large: {0}")]
    TooLarge(String),

    #[error("archive production cancelled")]
    Cancelled,
}
