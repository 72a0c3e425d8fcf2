//! chithi-core
//!
//! Client-side streaming encryption engine.
//! Files in, SND1 envelope out (and back), without ever holding a whole file in memory.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod config;

// Primitives and formats
pub mod crypto;
pub mod envelope;
pub mod archive;
pub mod telemetry;

// Stream layers
pub mod stream;
pub mod upload;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::archive::{ArchiveFormat, ArchiveInput, ArchiveOptions, ArchiveProducer, Compression};
    pub use crate::config::EngineConfig;
    pub use crate::crypto::{CipherSuite, Ikm, KdfLimits, KdfParams};
    pub use crate::stream::{
        decrypt_stream, encrypt_files, encrypt_stream, DecryptParams, DecryptingReader, EncryptParams,
        EncryptingReader, ParallelismProfile,
    };
    pub use crate::telemetry::TelemetrySnapshot;
    pub use crate::types::StreamError;
    pub use crate::upload::{generate_boundary, MultipartBody};
}
