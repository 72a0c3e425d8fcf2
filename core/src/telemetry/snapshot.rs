//! telemetry/snapshot.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::TelemetryCounters;

/// Immutable per-stream report returned by the push-style API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub chunks: u64,
    pub bytes_plaintext: u64,
    pub bytes_ciphertext: u64,
    pub bytes_overhead: u64,
    pub throughput_plaintext_bytes_per_sec: f64,
    pub elapsed: Duration,
    /// Pool size the pipeline started with (0 when it ran sequentially from the start).
    pub workers: usize,
    /// True when the chunks were processed in-process.
    pub sequential: bool,
}

impl TelemetrySnapshot {
    pub fn from(counters: &TelemetryCounters, elapsed: Duration, workers: usize, sequential: bool) -> Self {
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_plaintext as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            chunks: counters.chunks,
            bytes_plaintext: counters.bytes_plaintext,
            bytes_ciphertext: counters.bytes_ciphertext,
            bytes_overhead: counters.bytes_overhead,
            throughput_plaintext_bytes_per_sec: throughput,
            elapsed,
            workers,
            sequential,
        }
    }

    /// Bytes that went over the wire: header plus every sealed chunk.
    pub fn wire_bytes(&self) -> u64 {
        self.bytes_ciphertext + self.bytes_overhead - self.chunks * crate::crypto::types::TAG_LEN as u64
    }
}
