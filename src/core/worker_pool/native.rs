//! `ElasticPool` on dedicated OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers block in `select!` on the job queue, their monitor ticker,
//!   their close signal and the shutdown broadcast
//! - **Atomic growth**: the limit check and worker construction happen under the
//!   registry lock, so concurrent `put` calls cannot overshoot `worker_limit`
//! - **Clean shutdown**: dropping the shutdown sender wakes every worker at once

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::PoolOptions;
use crate::core::error::PoolError;
use crate::core::status::{
    merge_durations, StatusDurations, StatusSettleMap, WorkerSnapshot, WorkerState, WorkerStatus,
};
use crate::core::uid::{Generator, UidGenerator, WorkerUid};
use crate::util::panic_message;

use super::registry::WorkerRegistry;
use super::{Job, PoolCounters, PoolStats};

#[derive(Debug, Clone, Copy)]
enum RetireReason {
    Idle,
    Closed,
    Shutdown,
    QueueClosed,
}

impl RetireReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Closed => "closed",
            Self::Shutdown => "shutdown",
            Self::QueueClosed => "queue_closed",
        }
    }
}

/// State shared between the pool handle and its worker threads.
struct PoolShared {
    options: PoolOptions,
    job_rx: Receiver<Job>,
    /// `None` once stopped. `put` holds the read lock until its job is queued and the
    /// pressure check is done.
    job_tx: RwLock<Option<Sender<Job>>>,
    /// Never sends; dropping the sender is the shutdown broadcast.
    shutdown_rx: Receiver<()>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    stopped: AtomicBool,
    registry: Mutex<WorkerRegistry>,
    /// Durations of retired workers. Lock order: `registry` before `settled`.
    settled: StatusSettleMap,
    generator: Generator,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: PoolCounters,
}

/// Worker pool whose size follows its load.
///
/// Jobs are consumed in approximately FIFO order but may complete out of order across
/// workers. All read accessors are snapshots taken under the pool's locks; none of them
/// waits for a running job.
pub struct ElasticPool {
    shared: Arc<PoolShared>,
}

impl ElasticPool {
    /// Create a pool. Zero or out-of-range options are replaced by defaults. No worker
    /// is started until the first job arrives.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the filled options are still invalid.
    pub fn new(options: PoolOptions) -> Result<Self, PoolError> {
        let options = options.filled();
        options.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = bounded::<Job>(options.queue_capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        info!(
            worker_limit = options.worker_limit,
            queue_capacity = options.queue_capacity,
            grow_above_ratio = options.grow_above_ratio,
            close_below_ratio = options.close_below_ratio,
            "ElasticPool initialized"
        );

        Ok(Self {
            shared: Arc::new(PoolShared {
                options,
                job_rx,
                job_tx: RwLock::new(Some(job_tx)),
                shutdown_rx,
                shutdown_tx: Mutex::new(Some(shutdown_tx)),
                stopped: AtomicBool::new(false),
                registry: Mutex::new(WorkerRegistry::default()),
                settled: StatusSettleMap::new(),
                generator: Generator::new(),
                handles: Mutex::new(Vec::new()),
                counters: PoolCounters::default(),
            }),
        })
    }

    /// Submit a job.
    ///
    /// Blocks while the queue is full. After the job is queued, a pressure check may
    /// spawn a worker.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PoolShutdown` if the pool is stopped, including when it is
    /// stopped while this call waits for queue space.
    pub fn put<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce(WorkerUid) + Send + 'static,
    {
        // `stop` drops the shutdown sender before taking the write lock, so a send
        // blocked on a full queue wakes up and releases this guard.
        let job_tx = self.shared.job_tx.read();
        let Some(sender) = job_tx.as_ref().filter(|_| !self.is_stopped()).cloned() else {
            return Err(PoolError::PoolShutdown);
        };
        let job: Job = Box::new(job);
        select! {
            send(sender, job) -> sent => sent.map_err(|_| PoolError::PoolShutdown)?,
            recv(self.shared.shutdown_rx) -> _ => return Err(PoolError::PoolShutdown),
        }
        // Queued even if `stop` raced the send: workers drain until every sender is
        // gone, and the pressure check still guarantees one worker.
        self.shared.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
        self.shared.adjust_for_pressure();
        drop(job_tx);
        Ok(())
    }

    /// Stop the pool. Idempotent.
    ///
    /// Closes the job queue and the shutdown broadcast exactly once; workers run the
    /// jobs still queued, then retire. Joins every worker thread except the calling one.
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Stopping elastic pool");

        self.shared.shutdown_tx.lock().take();
        // Waits for in-flight `put` calls, so every worker they spawned has a handle.
        self.shared.job_tx.write().take();

        let handles = mem::take(&mut *self.shared.handles.lock());
        let current = thread::current().id();
        let mut joined = 0usize;
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Worker thread panicked");
            }
            joined += 1;
        }

        info!(
            joined = joined,
            peak_workers = self.peak_live_worker_count(),
            "Elastic pool stopped"
        );
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Ask one worker to retire. Returns false if no such worker is alive.
    #[must_use]
    pub fn close_worker(&self, uid: WorkerUid) -> bool {
        self.shared.registry.lock().close(uid)
    }

    /// Effective options after defaults were filled.
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.shared.options
    }

    /// Workers currently running a job.
    #[must_use]
    pub fn current_active_count(&self) -> usize {
        self.shared.registry.lock().active_count()
    }

    /// Workers currently alive.
    #[must_use]
    pub fn live_worker_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Highest number of simultaneously alive workers so far.
    #[must_use]
    pub fn peak_live_worker_count(&self) -> usize {
        self.shared.registry.lock().peak()
    }

    /// Jobs waiting in the queue.
    #[must_use]
    pub fn pending_job_count(&self) -> usize {
        self.shared.job_rx.len()
    }

    /// Time per status across the pool's whole lifetime: retired workers' settled
    /// durations plus every live worker's current table.
    #[must_use]
    pub fn aggregated_status_durations(&self) -> StatusDurations {
        let registry = self.shared.registry.lock();
        let mut total = self.shared.settled.snapshot();
        merge_durations(&mut total, &registry.live_durations(Instant::now()));
        total
    }

    /// Per-worker snapshots, ordered by uid.
    #[must_use]
    pub fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        self.shared.registry.lock().snapshots(Instant::now())
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let mut stats = {
            let registry = self.shared.registry.lock();
            PoolStats {
                live_workers: registry.len(),
                active_workers: registry.active_count(),
                peak_workers: registry.peak(),
                pending_jobs: self.shared.job_rx.len(),
                ..PoolStats::default()
            }
        };
        self.shared.counters.fill(&mut stats);
        stats
    }
}

impl Drop for ElasticPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join; explicit `stop` is required for that.
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            self.shared.shutdown_tx.lock().take();
            self.shared.job_tx.write().take();
            debug!("ElasticPool dropped without explicit stop - workers will be detached");
        }
    }
}

impl PoolShared {
    /// Spawn a worker if none is alive, or if the queue is under pressure and the
    /// ceiling allows it. Once stopped, only the first rule applies.
    #[allow(clippy::cast_precision_loss)]
    fn adjust_for_pressure(self: &Arc<Self>) {
        let mut registry = self.registry.lock();
        let live = registry.len();
        let occupancy = self.job_rx.len() as f64 / self.options.queue_capacity as f64;
        let grow = live == 0
            || (!self.stopped.load(Ordering::Acquire)
                && occupancy > self.options.grow_above_ratio
                && live < self.options.worker_limit);
        if grow {
            if let Err(e) = self.spawn_worker(&mut registry) {
                error!(error = %e, live = live, "Failed to grow elastic pool");
            }
        }
    }

    /// Register and start a worker. Must be called with the registry lock held.
    fn spawn_worker(self: &Arc<Self>, registry: &mut WorkerRegistry) -> Result<WorkerUid, PoolError> {
        let uid = self.generator.generate();
        let (close_tx, close_rx) = bounded::<()>(1);
        let shared = Arc::clone(self);

        let spawned = thread::Builder::new()
            .name(format!("elastic-worker-{uid}"))
            .spawn(move || shared.worker_loop(uid, &close_rx));

        match spawned {
            Ok(handle) => {
                registry.insert(WorkerState::new(uid, self.options.recent_window), close_tx);
                let mut handles = self.handles.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                debug!(worker = %uid, live = registry.len(), "Worker spawned");
                Ok(uid)
            }
            Err(e) => {
                self.generator.collect(uid);
                Err(PoolError::Spawn(e.to_string()))
            }
        }
    }

    fn worker_loop(self: &Arc<Self>, uid: WorkerUid, close_rx: &Receiver<()>) {
        debug!(worker = %uid, "Worker thread started");
        let ticker = tick(self.options.auto_monitor_interval);

        let reason = loop {
            select! {
                recv(self.job_rx) -> job => match job {
                    Ok(job) => self.run_job(uid, job),
                    Err(_) => break RetireReason::QueueClosed,
                },
                recv(ticker) -> _ => {
                    if self.try_retire_idle(uid) {
                        return;
                    }
                },
                recv(close_rx) -> _ => break RetireReason::Closed,
                recv(self.shutdown_rx) -> _ => {
                    // Ends once `stop` and every in-flight `put` have dropped their senders.
                    for job in self.job_rx.iter() {
                        self.run_job(uid, job);
                    }
                    break RetireReason::Shutdown;
                },
            }
        };

        self.retire(uid, reason);
    }

    fn run_job(&self, uid: WorkerUid, job: Job) {
        self.registry.lock().switch(uid, WorkerStatus::Active);
        match panic::catch_unwind(AssertUnwindSafe(|| job(uid))) {
            Ok(()) => {
                self.counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
                error!(worker = %uid, panic = %panic_message(payload.as_ref()), "Job panicked");
            }
        }
        self.registry.lock().switch(uid, WorkerStatus::Sleep);
    }

    /// Retire `uid` if it has been mostly idle and nothing is queued. Both checks run
    /// under the registry lock, so a concurrent `put` either sees this worker or sees
    /// zero workers and spawns one.
    fn try_retire_idle(&self, uid: WorkerUid) -> bool {
        let mut registry = self.registry.lock();
        let now = Instant::now();
        let Some(ratio) = registry.recent_active_ratio(uid, now) else {
            return true;
        };
        if ratio >= self.options.close_below_ratio || !self.job_rx.is_empty() {
            return false;
        }
        if let Some(durations) = registry.remove(uid, now) {
            self.settled.add_all(&durations);
        }
        drop(registry);
        self.generator.collect(uid);
        debug!(worker = %uid, ratio = ratio, reason = RetireReason::Idle.as_str(), "Worker retired");
        true
    }

    fn retire(self: &Arc<Self>, uid: WorkerUid, reason: RetireReason) {
        let mut registry = self.registry.lock();
        if let Some(durations) = registry.remove(uid, Instant::now()) {
            self.settled.add_all(&durations);
        }
        self.generator.collect(uid);
        debug!(worker = %uid, reason = reason.as_str(), live = registry.len(), "Worker retired");

        // Never leave queued work without a worker.
        if registry.is_empty() && !self.job_rx.is_empty() {
            if let Err(e) = self.spawn_worker(&mut registry) {
                error!(error = %e, "Failed to replace retired worker");
            }
        }
    }
}
