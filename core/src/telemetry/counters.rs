//! telemetry/counters.rs
//! Byte and chunk totals for one stream, turned into a `TelemetrySnapshot`
//! once the stream ends.

use serde::{Deserialize, Serialize};

/// Deterministic counters collected during stream processing.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub chunks: u64,
    pub bytes_plaintext: u64,
    /// Sealed chunk bytes, tags included.
    pub bytes_ciphertext: u64,
    /// Header bytes plus one tag per chunk.
    pub bytes_overhead: u64,
}

impl TelemetryCounters {
    /// Record the envelope header as overhead.
    pub fn add_header(&mut self, header_len: usize) {
        self.bytes_overhead += header_len as u64;
    }
}
