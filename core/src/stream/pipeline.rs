// # 📂 src/stream/pipeline.rs

//! Pull-driven chunk pipeline.
//!
//! The consumer's `read` drives everything: it reads fixed-size blocks from the
//! source, hands them to the pool round-robin, and releases results strictly in
//! index order. The first short block (possibly empty) is the last one.
//!
//! Dropping a `ChunkStream` drops the source and joins every worker.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::stream::chunk_worker::types::ChunkTransform;
use crate::stream::chunk_worker::worker::{PoolEvent, WorkerPool};
use crate::stream::io::read_exact_or_eof;
use crate::stream::parallelism::ParallelismProfile;
use crate::stream::reassembler::Reassembler;
use crate::types::StreamError;

/// Byte and chunk totals on both sides of the transform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    pub chunks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

pub struct ChunkStream<R: Read, T: ChunkTransform> {
    source: Option<R>,
    transform: Arc<T>,
    pool: Option<WorkerPool<T>>,
    reassembler: Reassembler,
    block_len: usize,
    next_index: u32,
    input_done: bool,
    inflight: usize,
    max_inflight: usize,
    out: Vec<u8>,
    out_pos: usize,
    finished: bool,
    failed: Option<StreamError>,
    stats: ChunkStats,
    workers: usize,
    started: Instant,
    elapsed: Option<Duration>,
    prepared_local: bool,
    /// Whether every chunk ended up in-process, fixed once the pool is gone.
    pool_exhausted: bool,
}

impl<R: Read, T: ChunkTransform> ChunkStream<R, T> {
    /// `block_len` is the input size of every chunk but the last.
    pub fn new(source: R, transform: T, block_len: usize, profile: ParallelismProfile) -> Result<Self, StreamError> {
        if block_len == 0 {
            return Err(StreamError::Validation("chunk block length must be non-zero".into()));
        }
        let transform = Arc::new(transform);

        let pool = if profile.is_sequential() {
            None
        } else {
            match WorkerPool::start(transform.clone(), profile.worker_count) {
                Ok(pool) => Some(pool),
                Err(failure) => {
                    warn!("{failure}; falling back to sequential processing");
                    None
                }
            }
        };
        let workers = pool.as_ref().map_or(0, |p| p.alive());
        let pool_exhausted = pool.is_none();
        info!(workers, max_inflight = profile.max_inflight, block_len, "chunk pipeline started");

        Ok(Self {
            source: Some(source),
            transform,
            pool,
            reassembler: Reassembler::new(),
            block_len,
            next_index: 0,
            input_done: false,
            inflight: 0,
            max_inflight: profile.max_inflight.max(1),
            out: Vec::new(),
            out_pos: 0,
            finished: false,
            failed: None,
            stats: ChunkStats::default(),
            workers,
            started: Instant::now(),
            elapsed: None,
            prepared_local: false,
            pool_exhausted,
        })
    }

    pub fn stats(&self) -> ChunkStats {
        self.stats
    }

    /// Pool size at start; 0 when the stream began sequential.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// True once no pool member is processing chunks.
    pub fn is_sequential(&self) -> bool {
        self.pool.as_ref().map_or(self.pool_exhausted, |p| p.alive() == 0)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    /// Stop pulling from the source and release the workers.
    /// An unfinished stream fails every later read instead of ending early.
    pub fn cancel(&mut self) {
        if !self.finished && self.failed.is_none() {
            debug!(next = self.next_index, "chunk pipeline cancelled");
            self.failed = Some(StreamError::Pipeline("chunk pipeline cancelled".into()));
            self.out.clear();
            self.out_pos = 0;
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.pool_exhausted = pool.alive() == 0;
        }
        self.source = None;
        self.input_done = true;
        if self.elapsed.is_none() {
            self.elapsed = Some(self.started.elapsed());
        }
    }

    fn apply_local(&mut self, index: u32, buffer: Vec<u8>) -> Result<Vec<u8>, StreamError> {
        if !self.prepared_local {
            self.transform
                .prepare()
                .map_err(|reason| StreamError::Pipeline(format!("in-process setup failed: {reason}")))?;
            self.prepared_local = true;
        }
        self.transform.apply(index, buffer)
    }

    /// Read the next block from the source and get it processed.
    fn feed(&mut self) -> Result<(), StreamError> {
        let Some(source) = self.source.as_mut() else {
            self.input_done = true;
            return Ok(());
        };
        let block = read_exact_or_eof(source, self.block_len)?;
        let index = self.next_index;
        if block.len() < self.block_len {
            self.input_done = true;
            self.source = None;
        } else {
            self.next_index = index
                .checked_add(1)
                .ok_or_else(|| StreamError::Validation("stream exceeds 2^32 chunks".into()))?;
        }
        self.stats.chunks += 1;
        self.stats.bytes_in += block.len() as u64;

        let rejected = match self.pool.as_mut() {
            Some(pool) => pool.submit(index, block).err(),
            None => Some((index, block)),
        };
        match rejected {
            None => self.inflight += 1,
            Some((index, block)) => {
                let out = self.apply_local(index, block)?;
                self.reassembler.push(index, out)?;
            }
        }
        Ok(())
    }

    /// Wait for one pool completion.
    fn collect(&mut self) -> Result<(), StreamError> {
        let event = match self.pool.as_mut() {
            Some(pool) => pool.next_event()?,
            None => return Err(StreamError::Pipeline("chunks in flight without a pool".into())),
        };
        self.inflight -= 1;
        match event {
            PoolEvent::Done { index, buffer } => self.reassembler.push(index, buffer),
            PoolEvent::Returned { index, buffer } => {
                let out = self.apply_local(index, buffer)?;
                self.reassembler.push(index, out)
            }
        }
    }

    /// Advance until there is output to hand out or the stream is complete.
    fn step(&mut self) -> Result<(), StreamError> {
        loop {
            if let Some(buffer) = self.reassembler.pop_ready() {
                self.stats.bytes_out += buffer.len() as u64;
                self.out = buffer;
                self.out_pos = 0;
                return Ok(());
            }
            if !self.input_done && self.inflight + self.reassembler.pending() < self.max_inflight {
                self.feed()?;
                continue;
            }
            if self.inflight > 0 {
                self.collect()?;
                continue;
            }
            if self.input_done {
                self.reassembler.finish()?;
                self.finished = true;
                self.teardown();
                info!(
                    chunks = self.stats.chunks,
                    bytes_in = self.stats.bytes_in,
                    bytes_out = self.stats.bytes_out,
                    "chunk pipeline finished"
                );
                return Ok(());
            }
            // Backpressure with nothing in flight: everything pending is waiting
            // on an earlier index that was never produced.
            return Err(StreamError::Pipeline("reassembly stalled".into()));
        }
    }

    /// Pull style with typed errors.
    pub fn read_chunk_output(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if let Some(err) = &self.failed {
            return Err(err.duplicate());
        }
        loop {
            if self.out_pos < self.out.len() {
                let n = buf.len().min(self.out.len() - self.out_pos);
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            if let Err(err) = self.step() {
                warn!("chunk pipeline aborted: {err}");
                self.teardown();
                self.out.clear();
                self.out_pos = 0;
                self.failed = Some(err.duplicate());
                return Err(err);
            }
        }
    }
}

impl<R: Read, T: ChunkTransform> Read for ChunkStream<R, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk_output(buf).map_err(StreamError::into_io)
    }
}

impl<R: Read, T: ChunkTransform> Drop for ChunkStream<R, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
