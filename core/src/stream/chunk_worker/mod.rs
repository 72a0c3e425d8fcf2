//! Chunk-level workers.
//!
//! A chunk is the unit of AEAD: one fixed-size block of plaintext sealed under
//! a nonce derived from its index. Workers are:
//! - CPU-bound
//! - Stateless between chunks
//! - Fully parallelizable

pub mod types;
pub mod codec;
pub mod worker;

pub use types::{ChunkTransform, WorkerFailure, WorkerReply, WorkerRequest};
pub use codec::{ChunkCodec, Direction};
pub use worker::{PoolEvent, WorkerPool};
