//! Keyed recurring task scheduler.
//!
//! One dispatcher thread sleeps until the earliest pending fire time, advances that
//! task's schedule and hands a snapshot to the executors. Any change to the task set
//! wakes the dispatcher through a single-slot re-evaluation channel, so bursts of
//! changes cause at most one extra pass.
//!
//! Two executor backends exist:
//!
//! - **Fixed**: `executor_count` dedicated threads, each with its own activity
//!   accounting. The executor identity reported in [`ExecuteEvent`] is the slot id.
//! - **Elastic**: a forwarding thread submits every task run to an [`ElasticPool`]; the
//!   pool worker that runs it is the executor identity.
//!
//! A task whose policy reports no further execution is removed once its last run
//! completes.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use prometheus_task_engine::core::{FixedInterval, TaskOutput, TimedScheduler};
//!
//! let scheduler = TimedScheduler::new(2)?;
//! scheduler
//!     .add("heartbeat", || Ok(TaskOutput::new()), FixedInterval::new(Duration::from_secs(1)))
//!     .expect("fresh key");
//! scheduler.on_execute(|event| println!("{} ran on {}", event.task.key, event.executor));
//! scheduler.stop();
//! # Ok::<(), prometheus_task_engine::core::PoolError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{after, bounded, select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{ExecutorBackend, PoolOptions, SchedulerConfig};

use super::callbacks::{
    AddEvent, BanEvent, CallbackHandle, CancelEvent, ExecuteEvent, Notification, Notifier,
    SchedulerCallbacks, UnBanEvent,
};
use super::error::{PoolError, SchedulerError};
use super::registry::TaskRegistry;
use super::schedule::SchedulePolicy;
use super::status::{
    merge_durations, StatusDurations, WorkerSnapshot, WorkerState, WorkerStatus,
    DEFAULT_RECENT_WINDOW,
};
use super::task::{TaskOutput, TaskState};
use super::uid::{Generator, UidGenerator, WorkerUid};
use super::worker_pool::ElasticPool;

/// Longest single sleep of the dispatcher; it re-evaluates after this at the latest.
const MAX_DISPATCH_WAIT: Duration = Duration::from_secs(60 * 60);

struct SchedulerShared {
    registry: TaskRegistry,
    /// Banned keys and when they were banned.
    banned: RwLock<HashMap<String, SystemTime>>,
    /// Serializes the check-then-act part of the public operations.
    ops: Mutex<()>,
    exec_rx: Receiver<TaskState>,
    exec_tx: Mutex<Option<Sender<TaskState>>>,
    refresh_rx: Receiver<()>,
    refresh_tx: Mutex<Option<Sender<()>>>,
    /// Never sends; dropping the sender is the shutdown broadcast.
    shutdown_rx: Receiver<()>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    stopped: AtomicBool,
    callbacks: Arc<SchedulerCallbacks>,
    notifier: Notifier,
    /// Accounting of the fixed executors. Empty for the elastic backend.
    executors: Mutex<BTreeMap<WorkerUid, WorkerState>>,
}

/// Recurring task scheduler.
///
/// All operations are safe to call from any thread, including from task bodies and
/// callbacks.
pub struct TimedScheduler {
    shared: Arc<SchedulerShared>,
    backend: ExecutorBackend,
    pool: Option<Arc<ElasticPool>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TimedScheduler {
    /// Start a scheduler with `executor_count` dedicated executor threads.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if `executor_count` is zero, `PoolError::Spawn` if a
    /// thread could not be started.
    pub fn new(executor_count: usize) -> Result<Self, PoolError> {
        if executor_count == 0 {
            return Err(PoolError::InvalidConfig(
                "executor_count must be greater than 0".into(),
            ));
        }
        let scheduler = Self {
            shared: SchedulerShared::new(executor_count)?,
            backend: ExecutorBackend::Fixed,
            pool: None,
            handles: Mutex::new(Vec::new()),
        };
        scheduler.spawn("task-dispatcher".into(), |shared| shared.dispatch_loop())?;

        let slots = Generator::new();
        for _ in 0..executor_count {
            let uid = slots.generate();
            scheduler
                .shared
                .executors
                .lock()
                .insert(uid, WorkerState::new(uid, DEFAULT_RECENT_WINDOW));
            scheduler.spawn(format!("task-executor-{uid}"), move |shared| {
                shared.executor_loop(uid);
            })?;
        }

        info!(executors = executor_count, "TimedScheduler started");
        Ok(scheduler)
    }

    /// Start a scheduler whose task runs are executed by an elastic pool.
    ///
    /// # Errors
    ///
    /// Propagates pool construction errors and `PoolError::Spawn`.
    pub fn with_elastic_pool(options: PoolOptions) -> Result<Self, PoolError> {
        let pool = Arc::new(ElasticPool::new(options)?);
        let scheduler = Self {
            shared: SchedulerShared::new(1)?,
            backend: ExecutorBackend::Elastic,
            pool: Some(Arc::clone(&pool)),
            handles: Mutex::new(Vec::new()),
        };
        scheduler.spawn("task-dispatcher".into(), |shared| shared.dispatch_loop())?;
        scheduler.spawn("task-forwarder".into(), move |shared| {
            shared.forward_loop(&pool);
        })?;

        info!(
            worker_limit = scheduler.pool().map_or(0, |p| p.options().worker_limit),
            "TimedScheduler started on elastic pool"
        );
        Ok(scheduler)
    }

    /// Start a scheduler from configuration.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` if validation fails, otherwise as the backend
    /// constructors.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        match config.backend {
            ExecutorBackend::Fixed => Self::new(config.executor_count),
            ExecutorBackend::Elastic => Self::with_elastic_pool(config.pool.clone()),
        }
    }

    fn spawn<F>(&self, name: String, body: F) -> Result<(), PoolError>
    where
        F: FnOnce(Arc<SchedulerShared>) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || body(shared))
            .map_err(|e| PoolError::Spawn(e.to_string()))?;
        self.handles.lock().push(handle);
        Ok(())
    }

    /// Schedule a new task.
    ///
    /// A policy that plans no execution at all is accepted but leaves nothing scheduled.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the key is scheduled, `AlreadyBanned` if it is banned, `Stopped`
    /// after [`stop`](Self::stop).
    pub fn add<F, P>(&self, key: impl Into<String>, job: F, policy: P) -> Result<(), SchedulerError>
    where
        F: Fn() -> anyhow::Result<TaskOutput> + Send + Sync + 'static,
        P: SchedulePolicy + 'static,
    {
        self.submit(TaskState::new(key, Arc::new(job), Arc::new(policy)), false)
    }

    /// Schedule a task, replacing any task under the same key.
    ///
    /// # Errors
    ///
    /// `AlreadyBanned` if the key is banned, `Stopped` after [`stop`](Self::stop).
    pub fn set<F, P>(&self, key: impl Into<String>, job: F, policy: P) -> Result<(), SchedulerError>
    where
        F: Fn() -> anyhow::Result<TaskOutput> + Send + Sync + 'static,
        P: SchedulePolicy + 'static,
    {
        self.submit(TaskState::new(key, Arc::new(job), Arc::new(policy)), true)
    }

    fn submit(&self, task: TaskState, replace: bool) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        shared.ensure_running()?;
        let outcome = {
            let _ops = shared.ops.lock();
            if !replace && shared.registry.contains(&task.key) {
                Err(SchedulerError::AlreadyExists(task.key.clone()))
            } else if shared.banned.read().contains_key(&task.key) {
                Err(SchedulerError::AlreadyBanned(task.key.clone()))
            } else if task.has_next() {
                shared.registry.upsert(task.clone());
                Ok(())
            } else {
                shared.registry.remove(&task.key);
                debug!(task = %task.key, policy = %task.policy, "Task plans no execution");
                Ok(())
            }
        };

        match &outcome {
            Ok(()) => {
                debug!(task = %task.key, policy = %task.policy, replace = replace, "Task scheduled");
                shared.signal_reevaluate();
            }
            Err(e) => debug!(task = %task.key, error = %e, "Task rejected"),
        }
        let error = outcome.clone().err();
        shared.notifier.send(Notification::Add(AddEvent { task, error }));
        outcome
    }

    /// Remove a scheduled task. A run already in progress completes; queued runs are
    /// skipped.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is not scheduled, `Stopped` after [`stop`](Self::stop).
    pub fn cancel(&self, key: &str) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        shared.ensure_running()?;
        let outcome = {
            let _ops = shared.ops.lock();
            shared
                .registry
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| SchedulerError::NotFound(key.to_owned()))
        };
        if outcome.is_ok() {
            debug!(task = %key, "Task cancelled");
            shared.signal_reevaluate();
        }
        shared.notifier.send(Notification::Cancel(CancelEvent {
            key: key.to_owned(),
            error: outcome.clone().err(),
        }));
        outcome
    }

    /// Cancel any task under `key` and refuse new ones until [`unban`](Self::unban).
    ///
    /// # Errors
    ///
    /// `AlreadyBanned` if the key is banned, `Stopped` after [`stop`](Self::stop).
    pub fn ban(&self, key: &str) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        shared.ensure_running()?;
        let outcome = {
            let _ops = shared.ops.lock();
            let mut banned = shared.banned.write();
            if banned.contains_key(key) {
                Err(SchedulerError::AlreadyBanned(key.to_owned()))
            } else {
                banned.insert(key.to_owned(), SystemTime::now());
                Ok(shared.registry.remove(key).is_some())
            }
        };
        if let Ok(cancelled) = outcome {
            debug!(task = %key, cancelled = cancelled, "Key banned");
            if cancelled {
                shared.signal_reevaluate();
            }
        }
        let outcome = outcome.map(|_| ());
        shared.notifier.send(Notification::Ban(BanEvent {
            key: key.to_owned(),
            error: outcome.clone().err(),
        }));
        outcome
    }

    /// Lift a ban. The task is not re-added.
    ///
    /// # Errors
    ///
    /// `NotBanned` if the key is not banned, `Stopped` after [`stop`](Self::stop).
    pub fn unban(&self, key: &str) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        shared.ensure_running()?;
        let outcome = {
            let _ops = shared.ops.lock();
            shared
                .banned
                .write()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| SchedulerError::NotBanned(key.to_owned()))
        };
        if outcome.is_ok() {
            debug!(task = %key, "Key unbanned");
        }
        shared.notifier.send(Notification::UnBan(UnBanEvent {
            key: key.to_owned(),
            error: outcome.clone().err(),
        }));
        outcome
    }

    /// Run a scheduled task now, without touching its schedule.
    ///
    /// Blocks while every executor is busy and the execution queue is full.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is not scheduled, `Stopped` after [`stop`](Self::stop).
    pub fn execute(&self, key: &str) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        shared.ensure_running()?;
        let task = shared
            .registry
            .get(key)
            .ok_or_else(|| SchedulerError::NotFound(key.to_owned()))?;
        debug!(task = %key, "Manual execution requested");
        if shared.hand_off(task) {
            Ok(())
        } else {
            Err(SchedulerError::Stopped)
        }
    }

    /// Whether `key` is banned.
    #[must_use]
    pub fn is_banned(&self, key: &str) -> bool {
        self.shared.banned.read().contains_key(key)
    }

    /// When `key` was banned.
    #[must_use]
    pub fn ban_time(&self, key: &str) -> Option<SystemTime> {
        self.shared.banned.read().get(key).copied()
    }

    /// Banned keys, sorted.
    #[must_use]
    pub fn banned_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.shared.banned.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether a task is scheduled under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.shared.registry.contains(key)
    }

    /// Snapshots of every scheduled task, sorted by key.
    #[must_use]
    pub fn list_tasks(&self) -> Vec<TaskState> {
        self.shared.registry.get_all()
    }

    /// Snapshot of one task.
    #[must_use]
    pub fn get_task(&self, key: &str) -> Option<TaskState> {
        self.shared.registry.get(key)
    }

    /// Number of scheduled tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Executor backend in use.
    #[must_use]
    pub const fn backend(&self) -> ExecutorBackend {
        self.backend
    }

    /// The elastic pool, for the elastic backend.
    #[must_use]
    pub fn pool(&self) -> Option<&ElasticPool> {
        self.pool.as_deref()
    }

    /// Activity snapshots of the executors, sorted by id.
    #[must_use]
    pub fn executor_snapshots(&self) -> Vec<WorkerSnapshot> {
        if let Some(pool) = &self.pool {
            return pool.worker_snapshots();
        }
        let now = Instant::now();
        self.shared
            .executors
            .lock()
            .values_mut()
            .map(|state| state.snapshot_at(now))
            .collect()
    }

    /// Total time the executors spent in each status.
    #[must_use]
    pub fn executor_status_durations(&self) -> StatusDurations {
        if let Some(pool) = &self.pool {
            return pool.aggregated_status_durations();
        }
        let now = Instant::now();
        let mut total = StatusDurations::new();
        for state in self.shared.executors.lock().values() {
            merge_durations(&mut total, &state.durations_at(now));
        }
        total
    }

    /// Listen for `add` and `set` outcomes.
    pub fn on_add<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&AddEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.add.add(listener)
    }

    /// Listen for `cancel` outcomes.
    pub fn on_cancel<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&CancelEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.cancel.add(listener)
    }

    /// Listen for task runs.
    pub fn on_execute<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&ExecuteEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.execute.add(listener)
    }

    /// Listen for `ban` outcomes.
    pub fn on_ban<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&BanEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.ban.add(listener)
    }

    /// Listen for `unban` outcomes.
    pub fn on_unban<F>(&self, listener: F) -> CallbackHandle
    where
        F: Fn(&UnBanEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.unban.add(listener)
    }

    /// Remove an add listener. Returns false if the handle is unknown.
    pub fn remove_add_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.callbacks.add.remove(handle)
    }

    /// Remove a cancel listener.
    pub fn remove_cancel_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.callbacks.cancel.remove(handle)
    }

    /// Remove an execute listener.
    pub fn remove_execute_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.callbacks.execute.remove(handle)
    }

    /// Remove a ban listener.
    pub fn remove_ban_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.callbacks.ban.remove(handle)
    }

    /// Remove an unban listener.
    pub fn remove_unban_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.callbacks.unban.remove(handle)
    }

    /// Stop the scheduler. Idempotent.
    ///
    /// Closes the shutdown broadcast, stops the elastic pool if any, joins the dispatcher
    /// and executors (runs already started complete) and waits until every pending
    /// callback has been delivered. Threads are not joined from themselves, so calling
    /// this from a task body or a callback does not deadlock.
    pub fn stop(&self) {
        let shared = &self.shared;
        if shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Stopping scheduler");
        shared.shutdown_tx.lock().take();
        // Before the joins: the forwarder may be blocked in `put` on a full pool queue.
        if let Some(pool) = &self.pool {
            pool.stop();
        }

        let handles = mem::take(&mut *self.handles.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Scheduler thread panicked");
            }
        }

        shared.exec_tx.lock().take();
        shared.refresh_tx.lock().take();
        shared.notifier.close();

        info!(tasks = shared.registry.len(), "Scheduler stopped");
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

impl Drop for TimedScheduler {
    fn drop(&mut self) {
        // Signal shutdown but don't join; explicit `stop` is required for that.
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            self.shared.shutdown_tx.lock().take();
            self.shared.exec_tx.lock().take();
            self.shared.refresh_tx.lock().take();
            self.shared.notifier.close_nowait();
            debug!("TimedScheduler dropped without explicit stop - threads will be detached");
        }
    }
}

impl SchedulerShared {
    fn new(exec_capacity: usize) -> Result<Arc<Self>, PoolError> {
        let (exec_tx, exec_rx) = bounded(exec_capacity);
        let (refresh_tx, refresh_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let callbacks = Arc::new(SchedulerCallbacks::default());
        let notifier =
            Notifier::spawn(Arc::clone(&callbacks)).map_err(|e| PoolError::Spawn(e.to_string()))?;
        Ok(Arc::new(Self {
            registry: TaskRegistry::new(),
            banned: RwLock::new(HashMap::new()),
            ops: Mutex::new(()),
            exec_rx,
            exec_tx: Mutex::new(Some(exec_tx)),
            refresh_rx,
            refresh_tx: Mutex::new(Some(refresh_tx)),
            shutdown_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            stopped: AtomicBool::new(false),
            callbacks,
            notifier,
            executors: Mutex::new(BTreeMap::new()),
        }))
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(SchedulerError::Stopped);
        }
        Ok(())
    }

    /// Wake the dispatcher. A signal already pending absorbs this one.
    fn signal_reevaluate(&self) {
        if let Some(tx) = self.refresh_tx.lock().as_ref() {
            let _ = tx.try_send(());
        }
    }

    /// Queue a snapshot for execution. Returns false if the scheduler is shutting down.
    fn hand_off(&self, task: TaskState) -> bool {
        // Clone the sender so a blocked send never holds the lock `stop` needs.
        let Some(exec_tx) = self.exec_tx.lock().clone() else {
            return false;
        };
        select! {
            send(exec_tx, task) -> sent => sent.is_ok(),
            recv(self.shutdown_rx) -> _ => false,
        }
    }

    fn dispatch_loop(&self) {
        debug!("Dispatcher started");
        loop {
            let (next, wait) = match self.registry.select_next_exec(SystemTime::now()) {
                Some(found) => found,
                None => {
                    select! {
                        recv(self.refresh_rx) -> _ => {},
                        recv(self.shutdown_rx) -> _ => break,
                    }
                    continue;
                }
            };
            select! {
                recv(after(wait.min(MAX_DISPATCH_WAIT))) -> _ => {
                    if wait <= MAX_DISPATCH_WAIT && !self.fire(&next.key, next.generation) {
                        break;
                    }
                },
                recv(self.refresh_rx) -> _ => {},
                recv(self.shutdown_rx) -> _ => break,
            }
        }
        debug!("Dispatcher exiting");
    }

    /// Advance the task's schedule and hand the snapshot to the executors. Returns false
    /// if the hand-off was interrupted by shutdown.
    fn fire(&self, key: &str, generation: u64) -> bool {
        let now = SystemTime::now();
        let advanced = self
            .registry
            .update(key, |state| {
                (state.generation == generation && state.has_next()).then(|| {
                    state.advance_at(now);
                    state.clone()
                })
            })
            .flatten();
        let Some(task) = advanced else {
            return true;
        };
        debug!(
            task = %task.key,
            count = task.count,
            has_next = task.has_next(),
            "Task fired"
        );
        self.hand_off(task)
    }

    fn executor_loop(&self, uid: WorkerUid) {
        debug!(executor = %uid, "Executor started");
        loop {
            select! {
                recv(self.exec_rx) -> task => match task {
                    Ok(task) => self.run_task(task, uid),
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => break,
            }
        }
        if let Some(state) = self.executors.lock().get_mut(&uid) {
            state.settle_at(Instant::now());
        }
        debug!(executor = %uid, "Executor exiting");
    }

    fn forward_loop(self: &Arc<Self>, pool: &ElasticPool) {
        debug!("Forwarder started");
        loop {
            select! {
                recv(self.exec_rx) -> task => match task {
                    Ok(task) => {
                        let shared = Arc::clone(self);
                        if let Err(e) = pool.put(move |worker| shared.run_task(task, worker)) {
                            warn!(error = %e, "Elastic pool rejected task run");
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => break,
            }
        }
        debug!("Forwarder exiting");
    }

    fn switch_executor(&self, uid: WorkerUid, to: WorkerStatus) {
        if let Some(state) = self.executors.lock().get_mut(&uid) {
            state.switch_to(to);
        }
    }

    /// Run one snapshot on the calling executor and publish the outcome.
    fn run_task(&self, task: TaskState, executor: WorkerUid) {
        let key = task.key.clone();
        let generation = task.generation;

        let claimed = self
            .registry
            .update(&key, |state| {
                (state.generation == generation).then(|| !mem::replace(&mut state.in_flight, true))
            })
            .flatten();
        match claimed {
            None => {
                debug!(task = %key, "Skipping run of task no longer scheduled");
                return;
            }
            Some(false) => {
                warn!(task = %key, executor = %executor, "Skipping overlapping run");
                return;
            }
            Some(true) => {}
        }

        self.switch_executor(executor, WorkerStatus::Active);
        let result = task.run();
        self.switch_executor(executor, WorkerStatus::Sleep);
        let finished = SystemTime::now();

        let recorded = self
            .registry
            .update(&key, |state| {
                (state.generation == generation).then(|| {
                    state.in_flight = false;
                    state.record_run(result.clone(), finished);
                    state.clone()
                })
            })
            .flatten();
        let snapshot = match recorded {
            Some(state) => {
                if !state.has_next()
                    && self
                        .registry
                        .remove_unless(&key, |s| s.generation != generation || s.in_flight)
                        .is_some()
                {
                    debug!(task = %key, runs = state.run_count, "Exhausted task removed");
                }
                state
            }
            // Cancelled or replaced while running.
            None => {
                let mut state = task;
                state.record_run(result.clone(), finished);
                state
            }
        };

        match &result {
            Ok(_) => debug!(task = %key, executor = %executor, "Task run completed"),
            Err(e) => warn!(task = %key, executor = %executor, error = %e, "Task run failed"),
        }
        self.notifier.send(Notification::Execute(ExecuteEvent {
            task: snapshot,
            result,
            executor,
        }));
    }
}
