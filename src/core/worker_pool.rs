//! Elastic worker pool with self-monitoring OS threads.
//!
//! The `ElasticPool` runs caller-submitted jobs on a set of worker threads whose size
//! follows the load:
//!
//! - **Growth**: after every `put`, a pressure check spawns a worker when none is alive,
//!   or when queue occupancy exceeds `grow_above_ratio` and the ceiling allows it.
//! - **Shrink**: each worker periodically measures its recent active ratio and retires
//!   itself when it falls below `close_below_ratio` and the queue is empty.
//! - **Accounting**: every worker owns a [`WorkerState`](crate::core::status::WorkerState);
//!   on retirement its durations are folded into a pool-wide aggregate.
//!
//! # Example
//!
//! ```rust,no_run
//! use prometheus_task_engine::config::PoolOptions;
//! use prometheus_task_engine::core::ElasticPool;
//!
//! let pool = ElasticPool::new(PoolOptions::new().with_queue_capacity(64))?;
//! pool.put(|worker| println!("running on worker {worker}"))?;
//! pool.stop();
//! # Ok::<(), prometheus_task_engine::core::PoolError>(())
//! ```

mod native;
mod registry;

use std::sync::atomic::{AtomicU64, Ordering};

use super::uid::WorkerUid;

pub use native::ElasticPool;

/// A unit of work accepted by [`ElasticPool::put`]. It receives the id of the worker
/// running it.
pub type Job = Box<dyn FnOnce(WorkerUid) + Send + 'static>;

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers currently alive.
    pub live_workers: usize,
    /// Workers currently running a job.
    pub active_workers: usize,
    /// Highest number of simultaneously alive workers.
    pub peak_workers: usize,
    /// Jobs waiting in the queue.
    pub pending_jobs: usize,
    /// Total jobs accepted.
    pub submitted_jobs: u64,
    /// Total jobs that returned normally.
    pub completed_jobs: u64,
    /// Total jobs that panicked.
    pub panicked_jobs: u64,
}

/// Internal job counters (lock-free).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub submitted_jobs: AtomicU64,
    pub completed_jobs: AtomicU64,
    pub panicked_jobs: AtomicU64,
}

impl PoolCounters {
    /// Fill the counter fields of `stats`.
    pub fn fill(&self, stats: &mut PoolStats) {
        stats.submitted_jobs = self.submitted_jobs.load(Ordering::Relaxed);
        stats.completed_jobs = self.completed_jobs.load(Ordering::Relaxed);
        stats.panicked_jobs = self.panicked_jobs.load(Ordering::Relaxed);
    }
}
