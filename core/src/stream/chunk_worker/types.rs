use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::types::StreamError;

/// The per-chunk operation the pool distributes.
///
/// `apply` must be a pure function of `(index, buffer)` so that pooled and
/// in-process execution produce identical bytes.
pub trait ChunkTransform: Send + Sync + 'static {
    /// Per-thread setup, run once on each pool member before any chunk.
    fn prepare(&self) -> Result<(), String> {
        Ok(())
    }

    fn apply(&self, index: u32, buffer: Vec<u8>) -> Result<Vec<u8>, StreamError>;
}

/// Orchestrator → worker.
pub enum WorkerRequest<T: ChunkTransform> {
    Init { transform: Arc<T> },
    Process { index: u32, buffer: Vec<u8> },
}

/// Worker → orchestrator. All members share one reply channel.
#[derive(Debug)]
pub enum WorkerReply {
    Ready { worker: usize },
    InitFailed { worker: usize, reason: String },
    Done { index: u32, buffer: Vec<u8> },
    /// The chunk itself is bad (authentication, truncation). Terminal.
    Failed { index: u32, error: StreamError },
    /// The worker cannot process chunks any more; the input comes back untouched.
    Bounced { worker: usize, index: u32, buffer: Vec<u8>, reason: String },
}

/// Loss of parallel capacity. Logged and recovered, never returned to callers.
#[derive(Debug, Error)]
pub enum WorkerFailure {
    #[error("failed to spawn chunk worker {worker}: {source}")]
    Spawn { worker: usize, source: io::Error },

    #[error("chunk worker {worker} failed to initialise: {reason}")]
    Init { worker: usize, reason: String },

    #[error("no chunk workers available")]
    NoneAvailable,
}
