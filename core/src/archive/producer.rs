//! archive/producer.rs
//! Pull-driven archive stream over an ordered list of inputs.
//!
//! Per entry: header → body (CRC and sizes accumulated as bytes pass) →
//! data descriptor (ZIP) or block padding (TAR). After the last entry: the
//! central directory (ZIP) or two zero blocks (TAR). Only the current entry's
//! source is open at any time.

use std::collections::VecDeque;
use std::io::{self, Read};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::archive::deflate::EntryEncoder;
use crate::archive::types::{
    ArchiveEntry, ArchiveError, ArchiveFormat, ArchiveInput, ArchiveOptions, Compression,
};
use crate::archive::{tar, zip};
use crate::types::StreamError;

struct CurrentEntry {
    name: String,
    modified: DateTime<Utc>,
    declared: Option<u64>,
    offset: u64,
    written: u64,
    encoder: EntryEncoder<Box<dyn Read + Send>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Entries,
    Done,
    Cancelled,
}

pub struct ArchiveProducer {
    options: ArchiveOptions,
    inputs: VecDeque<ArchiveInput>,
    entries: Vec<ArchiveEntry>,
    current: Option<CurrentEntry>,
    buf: Vec<u8>,
    buf_pos: usize,
    offset: u64,
    stage: Stage,
    predicted: Option<u64>,
}

impl ArchiveProducer {
    pub fn new(inputs: Vec<ArchiveInput>, options: ArchiveOptions) -> Result<Self, ArchiveError> {
        match options.format {
            ArchiveFormat::Zip if inputs.len() > zip::MAX_ENTRIES => {
                return Err(ArchiveError::TooLarge(format!("{} entries", inputs.len())));
            }
            ArchiveFormat::Tar => {
                if let Some(missing) = inputs.iter().find(|i| i.size.is_none()) {
                    return Err(ArchiveError::MissingSize(missing.name.clone()));
                }
            }
            _ => {}
        }
        if let Some(bad) = inputs.iter().find(|i| i.name.is_empty()) {
            return Err(ArchiveError::InvalidName(bad.name.clone()));
        }

        let predicted = match (options.format, options.compression) {
            (ArchiveFormat::Tar, _) => tar::predicted_len(inputs.iter().map(|i| i.size)),
            (ArchiveFormat::Zip, Compression::Store) => {
                zip::predicted_store_len(inputs.iter().map(|i| (i.name.as_str(), i.size)))
            }
            (ArchiveFormat::Zip, Compression::Deflate) => None,
        };

        Ok(Self {
            options,
            inputs: inputs.into(),
            entries: Vec::new(),
            current: None,
            buf: Vec::new(),
            buf_pos: 0,
            offset: 0,
            stage: Stage::Entries,
            predicted,
        })
    }

    /// Exact output length when knowable before streaming.
    pub fn predicted_len(&self) -> Option<u64> {
        self.predicted
    }

    /// Entries finalized so far; complete once the stream hits EOF.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Drop the open source and every pending one. Later reads fail.
    pub fn cancel(&mut self) {
        if self.stage == Stage::Entries {
            debug!(emitted = self.offset, remaining = self.inputs.len(), "archive producer cancelled");
        }
        self.current = None;
        self.inputs.clear();
        self.buf.clear();
        self.buf_pos = 0;
        self.stage = Stage::Cancelled;
    }

    fn queue(&mut self, bytes: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.buf_pos = 0;
    }

    fn open_next(&mut self, input: ArchiveInput) -> Result<(), ArchiveError> {
        let ArchiveInput { name, size, modified, source } = input;
        let reader = ArchiveInput::open(source, &name)?;
        let encoder = match self.options.format {
            ArchiveFormat::Zip => EntryEncoder::new(reader, self.options.compression, self.options.deflate_level),
            ArchiveFormat::Tar => EntryEncoder::new(reader, Compression::Store, 0),
        };

        let header = match self.options.format {
            ArchiveFormat::Zip => zip::local_header(&name, &modified, encoder.method())?,
            ArchiveFormat::Tar => {
                let size = size.ok_or_else(|| ArchiveError::MissingSize(name.clone()))?;
                tar::header(&name, size, &modified)?.to_vec()
            }
        };
        debug!(entry = %name, offset = self.offset, "archive entry started");

        self.queue(&header);
        self.current = Some(CurrentEntry {
            name,
            modified,
            declared: size,
            offset: self.offset,
            written: 0,
            encoder,
        });
        Ok(())
    }

    fn close_current(&mut self) -> Result<(), ArchiveError> {
        let Some(cur) = self.current.take() else { return Ok(()) };
        let size = cur.encoder.tally().bytes_read();
        let crc32 = cur.encoder.tally().crc32();
        if let Some(declared) = cur.declared {
            if declared != size {
                return Err(ArchiveError::SizeMismatch { name: cur.name, declared, actual: size });
            }
        }

        let trailer = match self.options.format {
            ArchiveFormat::Zip => zip::data_descriptor(crc32, cur.written, size)?,
            ArchiveFormat::Tar => vec![0u8; tar::padding(size)],
        };
        self.queue(&trailer);
        self.entries.push(ArchiveEntry {
            name: cur.name,
            size,
            compressed_size: cur.written,
            crc32,
            offset: cur.offset,
            modified: cur.modified,
            method: cur.encoder.method(),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ArchiveError> {
        let tail = match self.options.format {
            ArchiveFormat::Zip => {
                let cd_offset = self.offset;
                let mut cd = Vec::new();
                for entry in &self.entries {
                    cd.extend_from_slice(&zip::central_header(entry)?);
                }
                let eocd = zip::end_of_central_directory(self.entries.len(), cd.len() as u64, cd_offset)?;
                cd.extend_from_slice(&eocd);
                cd
            }
            ArchiveFormat::Tar => tar::end_of_archive(),
        };
        self.queue(&tail);
        self.stage = Stage::Done;
        debug!(entries = self.entries.len(), "archive directory queued");
        Ok(())
    }

    fn read_inner(&mut self, out: &mut [u8]) -> Result<usize, ArchiveError> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            if self.buf_pos < self.buf.len() {
                let n = out.len().min(self.buf.len() - self.buf_pos);
                out[..n].copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + n]);
                self.buf_pos += n;
                self.offset += n as u64;
                return Ok(n);
            }
            match self.stage {
                Stage::Done => return Ok(0),
                Stage::Cancelled => return Err(ArchiveError::Cancelled),
                Stage::Entries => {}
            }

            if let Some(cur) = self.current.as_mut() {
                let n = cur
                    .encoder
                    .read(out)
                    .map_err(|source| ArchiveError::Io { name: cur.name.clone(), source })?;
                if n > 0 {
                    if let Some(declared) = cur.declared {
                        let seen = cur.encoder.tally().bytes_read();
                        if seen > declared {
                            return Err(ArchiveError::SizeMismatch { name: cur.name.clone(), declared, actual: seen });
                        }
                    }
                    cur.written += n as u64;
                    self.offset += n as u64;
                    return Ok(n);
                }
                self.close_current()?;
                continue;
            }

            match self.inputs.pop_front() {
                Some(input) => self.open_next(input)?,
                None => self.finish()?,
            }
        }
    }
}

impl Read for ArchiveProducer {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.read_inner(out).map_err(|e| {
            if !matches!(e, ArchiveError::Cancelled) {
                self.cancel();
            }
            StreamError::Archive(e).into_io()
        })
    }
}
