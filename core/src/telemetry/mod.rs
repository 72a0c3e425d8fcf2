//! telemetry/mod.rs
//! Per-stream counters and immutable snapshots.
//!
//! Counters are owned by the orchestrating thread only; workers never touch them.

pub mod counters;
pub mod snapshot;

pub use counters::*;
pub use snapshot::*;
