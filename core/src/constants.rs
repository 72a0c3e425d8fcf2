//! constants.rs
//! Protocol constants shared by the envelope, chunk codec and key schedule.

/// Magic number for the canonical envelope.
/// "SND1" = send envelope v1
// Protocol magic is a fixed-width field, so keep it as `[u8; 4]` to match the header type.
pub const MAGIC_SND1: [u8; 4] = *b"SND1";
pub const METADATA_V1: u8 = 1;

/// Plaintext bytes per chunk. Every chunk but the last is exactly this size.
pub const CHUNK_SIZE: usize = 64 * 1024; // 64 KiB
/// Max chunk size accepted from a peer's metadata (32 MiB).
pub const MAX_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// Length of the input key material handed to the user.
pub const IKM_LEN: usize = 32;

/// Domain separation strings for the key schedule.
/// Each derived value must use its own string.
pub mod domains {
    pub const IKM_SALT: &[u8] = b"chithi-salt-v1";
    pub const CIPHER_KEY: &[u8] = b"aes-key";
    pub const BASE_NONCE: &[u8] = b"iv";
    pub const METADATA_KEY: &[u8] = b"chithi-meta-v1";
}

/// Cipher suite identifiers (mirrored in metadata).
pub mod cipher_ids {
    pub const AES256_GCM: u8        = 0x01;
    pub const CHACHA20_POLY1305: u8 = 0x02;
}

/// Envelope flag bits.
pub mod flags {
    pub const PASSWORD_PROTECTED: u8 = 0x01;
    /// Every bit this version understands.
    pub const KNOWN: u8 = PASSWORD_PROTECTED;
}

/// Argon2id defaults for new password-protected envelopes.
pub mod kdf_defaults {
    pub const MEMORY_KIB: u32  = 16 * 1024;
    pub const ITERATIONS: u32  = 3;
    pub const PARALLELISM: u32 = 1;
}

/// Safety caps for Argon2id parameters and header parsing.
pub mod limits {
    pub const MAX_MEMORY_KIB: u32   = 256 * 1024; // 256 MiB
    pub const MAX_ITERATIONS: u32   = 16;
    pub const MAX_PARALLELISM: u32  = 8;
    pub const MAX_HEADER_LEN: usize = 64 * 1024;
}

/// Worker pool defaults.
pub mod pool_defaults {
    /// Pool size is this multiple of the available hardware parallelism.
    pub const WORKERS_PER_CORE: usize = 2;
    /// In-flight chunks per worker before the orchestrator stops reading.
    pub const INFLIGHT_PER_WORKER: usize = 2;
    /// Queue depth of each worker's request channel.
    pub const WORKER_QUEUE_CAP: usize = 4;
}
