use crate::constants::pool_defaults::{INFLIGHT_PER_WORKER, WORKERS_PER_CORE};

/// Parallelism configuration for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelismProfile {
    /// 0 means in-process, no pool.
    pub worker_count: usize,
    /// Chunks read from the source but not yet released in order.
    pub max_inflight: usize,
}

impl ParallelismProfile {
    pub fn sequential() -> Self {
        Self { worker_count: 0, max_inflight: 1 }
    }

    /// Two workers per available core, at least one.
    pub fn dynamic() -> Self {
        Self::with_workers(num_cpus::get().saturating_mul(WORKERS_PER_CORE).max(1))
    }

    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            max_inflight: worker_count.saturating_mul(INFLIGHT_PER_WORKER).max(1),
        }
    }

    /// Resolve optional overrides as they come out of the config file.
    pub fn resolve(workers: Option<usize>, max_inflight: Option<usize>) -> Self {
        let mut profile = match workers {
            Some(0) => Self::sequential(),
            Some(n) => Self::with_workers(n),
            None => Self::dynamic(),
        };
        if let Some(cap) = max_inflight {
            profile.max_inflight = cap.max(1);
        }
        profile
    }

    #[inline]
    pub fn is_sequential(&self) -> bool {
        self.worker_count == 0
    }
}

impl Default for ParallelismProfile {
    fn default() -> Self {
        Self::dynamic()
    }
}
