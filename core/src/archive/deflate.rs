//! archive/deflate.rs
//! Per-entry byte transform with running CRC-32 and sizes.
//!
//! The CRC and uncompressed size are taken on the source side of the
//! transform, the compressed size on the output side.

use std::io::{self, Read};

use flate2::read::DeflateEncoder;
use tracing::warn;

use crate::archive::types::Compression;

pub const METHOD_STORE: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// Source wrapper that hashes and counts everything read through it.
pub struct Tally<R: Read> {
    inner: R,
    crc: crc32fast::Hasher,
    len: u64,
}

impl<R: Read> Tally<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, crc: crc32fast::Hasher::new(), len: 0 }
    }

    pub fn crc32(&self) -> u32 {
        self.crc.clone().finalize()
    }

    pub fn bytes_read(&self) -> u64 {
        self.len
    }
}

impl<R: Read> Read for Tally<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.crc.update(&buf[..n]);
        self.len += n as u64;
        Ok(n)
    }
}

pub enum EntryEncoder<R: Read> {
    Stored(Tally<R>),
    Deflated(DeflateEncoder<Tally<R>>),
}

impl<R: Read> EntryEncoder<R> {
    /// Deflate when asked and available, otherwise store.
    pub fn new(source: R, compression: Compression, level: u32) -> Self {
        let tally = Tally::new(source);
        match compression {
            Compression::Store => EntryEncoder::Stored(tally),
            Compression::Deflate => match deflate_level(level) {
                Some(level) => EntryEncoder::Deflated(DeflateEncoder::new(tally, level)),
                None => {
                    warn!(level, "deflate unavailable at this level; storing entry");
                    EntryEncoder::Stored(tally)
                }
            },
        }
    }

    /// Method actually used, for the central directory.
    pub fn method(&self) -> u16 {
        match self {
            EntryEncoder::Stored(_) => METHOD_STORE,
            EntryEncoder::Deflated(_) => METHOD_DEFLATE,
        }
    }

    pub fn tally(&self) -> &Tally<R> {
        match self {
            EntryEncoder::Stored(t) => t,
            EntryEncoder::Deflated(d) => d.get_ref(),
        }
    }
}

impl<R: Read> Read for EntryEncoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryEncoder::Stored(t) => t.read(buf),
            EntryEncoder::Deflated(d) => d.read(buf),
        }
    }
}

fn deflate_level(level: u32) -> Option<flate2::Compression> {
    (level <= 9).then(|| flate2::Compression::new(level))
}
