//! stream: chunked, parallel, strictly ordered encryption and decryption.
//!
//! Public entry points live in `core`; everything else is pipeline plumbing.

pub mod chunk_worker;
pub mod parallelism;
pub mod reassembler;
pub mod pipeline;
pub mod io;
pub mod core;

pub use parallelism::ParallelismProfile;
pub use pipeline::{ChunkStats, ChunkStream};

pub use self::core::{
    decrypt_stream,
    encrypt_files,
    encrypt_stream,
    DecryptParams,
    DecryptingReader,
    EncryptParams,
    EncryptingReader,
};
