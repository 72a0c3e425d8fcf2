// ## 📂 File: `src/archive/mod.rs`
//! Streaming ZIP/TAR producer.
//!
//! Inputs are read lazily, in order, and the archive is emitted as a plain
//! `Read` so it can feed the encryption pipeline directly.

pub mod deflate;
pub mod producer;
pub mod tar;
pub mod types;
pub mod zip;

pub use producer::ArchiveProducer;
pub use types::{ArchiveEntry, ArchiveError, ArchiveFormat, ArchiveInput, ArchiveOptions, Compression, EntrySource};
