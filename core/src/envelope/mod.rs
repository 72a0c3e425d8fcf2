//! envelope/mod.rs
//! "SND1" envelope: a self-describing header in front of the chunk ciphertext.
//!
//! Only the magic, flags, salts and Argon2id parameters are visible on the wire.
//! Cipher choice, content salt, base nonce and plaintext size live in the
//! encrypted metadata blob.

pub mod types;
pub mod encode;
pub mod decode;
pub mod metadata;

pub use types::{EnvelopeHeader, KdfBlock};
pub use encode::encode_header;
pub use decode::{parse_header, read_header};
pub use metadata::{open_metadata, seal_envelope, ContentMetadata};
