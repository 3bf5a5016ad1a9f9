//! Per-worker status accounting.
//!
//! Every worker (elastic pool worker or scheduler executor slot) owns a [`WorkerState`]
//! that tracks how long it has spent in each [`WorkerStatus`], both over its whole
//! lifetime and within a trailing window. The trailing window drives worker retirement
//! through [`WorkerState::recent_active_ratio_at`].
//!
//! All time-dependent methods take an explicit `now: Instant` so the accounting is fully
//! deterministic under test; the pool and scheduler simply pass `Instant::now()`.
//!
//! The trailing window is pruned whenever it is written or read, never on a timer.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::StatusError;
use super::uid::WorkerUid;

/// Default trailing-window horizon used for the recent active ratio.
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(60);

/// Status of a single worker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Created, never ran anything.
    #[default]
    None,
    /// Running a job.
    Active,
    /// Waiting for a job.
    Sleep,
}

impl WorkerStatus {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Sleep => "sleep",
        }
    }

    /// Whether time spent in this status is accounted.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::None)
    }

    /// The status a worker moves to from `self`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Active => Self::Sleep,
            Self::None | Self::Sleep => Self::Active,
        }
    }

    /// Check that `self -> to` is one of the two legal transitions.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] for anything else, including a
    /// self-transition.
    pub const fn check_transition(self, to: Self) -> Result<(), StatusError> {
        match (self, to) {
            (Self::None | Self::Sleep, Self::Active) | (Self::Active, Self::Sleep) => Ok(()),
            _ => Err(StatusError::InvalidTransition { from: self, to }),
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time spent per status.
pub type StatusDurations = BTreeMap<WorkerStatus, Duration>;

/// Add every entry of `from` into `into`.
pub fn merge_durations(into: &mut StatusDurations, from: &StatusDurations) {
    for (status, duration) in from {
        *into.entry(*status).or_default() += *duration;
    }
}

/// A single status switch, as recorded in the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSwitchEvent {
    /// When the switch happened (clamped to the window horizon once it falls behind it).
    pub at: Instant,
    /// Status before the switch.
    pub from: WorkerStatus,
    /// Status after the switch.
    pub to: WorkerStatus,
}

/// Cumulative time for one status plus the start of the running interval, if any.
#[derive(Debug, Clone, Copy, Default)]
struct Latency {
    amount: Duration,
    started: Option<Instant>,
}

impl Latency {
    // Already running: keep the first start.
    fn start(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn stop(&mut self, now: Instant) {
        if let Some(started) = self.started.take() {
            self.amount += now.saturating_duration_since(started);
        }
    }

    fn amount_at(&self, now: Instant) -> Duration {
        self.amount
            + self
                .started
                .map_or(Duration::ZERO, |started| now.saturating_duration_since(started))
    }
}

/// Status switches within the last `horizon`.
#[derive(Debug, Clone)]
pub struct RecentWindow {
    horizon: Duration,
    events: VecDeque<StatusSwitchEvent>,
}

impl RecentWindow {
    /// Create an empty window.
    #[must_use]
    pub const fn new(horizon: Duration) -> Self {
        Self {
            horizon,
            events: VecDeque::new(),
        }
    }

    /// Window length.
    #[must_use]
    pub const fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a switch and prune. Events must be recorded in time order.
    pub fn record(&mut self, event: StatusSwitchEvent) {
        self.events.push_back(event);
        self.prune_at(event.at);
    }

    /// Drop events older than the horizon.
    ///
    /// The latest event at or before the horizon is kept and clamped to it, so the
    /// status in force at the window start still contributes its in-window share.
    pub fn prune_at(&mut self, now: Instant) {
        let Some(limit) = now.checked_sub(self.horizon) else {
            return;
        };
        let expired = self.events.iter().take_while(|e| e.at <= limit).count();
        if expired == 0 {
            return;
        }
        self.events.drain(..expired - 1);
        if let Some(first) = self.events.front_mut() {
            first.at = limit;
        }
    }

    /// Time per status inside the window ending at `now`.
    pub fn durations_at(&mut self, now: Instant) -> StatusDurations {
        self.prune_at(now);
        let mut out = StatusDurations::new();
        let mut end = now;
        for event in self.events.iter().rev() {
            *out.entry(event.to).or_default() += end.saturating_duration_since(event.at);
            end = event.at;
        }
        out
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSnapshot {
    /// Worker identity.
    pub uid: WorkerUid,
    /// Current status.
    pub status: WorkerStatus,
    /// Time since creation.
    pub lifetime: Duration,
    /// All-time durations per status, including the running interval.
    pub durations: StatusDurations,
    /// Fraction of the trailing window spent active.
    pub recent_active_ratio: f64,
}

/// Accounting state of a single worker.
#[derive(Debug, Clone)]
pub struct WorkerState {
    uid: WorkerUid,
    status: WorkerStatus,
    created: Instant,
    latencies: BTreeMap<WorkerStatus, Latency>,
    window: RecentWindow,
}

impl WorkerState {
    /// Create a worker state in [`WorkerStatus::None`].
    #[must_use]
    pub fn new(uid: WorkerUid, horizon: Duration) -> Self {
        Self::new_at(uid, horizon, Instant::now())
    }

    /// Create a worker state as of `now`.
    #[must_use]
    pub const fn new_at(uid: WorkerUid, horizon: Duration, now: Instant) -> Self {
        Self {
            uid,
            status: WorkerStatus::None,
            created: now,
            latencies: BTreeMap::new(),
            window: RecentWindow::new(horizon),
        }
    }

    /// Worker identity.
    #[must_use]
    pub const fn uid(&self) -> WorkerUid {
        self.uid
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> WorkerStatus {
        self.status
    }

    /// Time since creation.
    #[must_use]
    pub fn lifetime_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    /// Switch to `to` at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::InvalidTransition`] and leaves the state untouched if the
    /// switch is not legal.
    pub fn switch_to_at(&mut self, to: WorkerStatus, now: Instant) -> Result<(), StatusError> {
        let from = self.status;
        from.check_transition(to)?;
        if from.is_valid() {
            self.latencies.entry(from).or_default().stop(now);
        }
        self.latencies.entry(to).or_default().start(now);
        self.window.record(StatusSwitchEvent { at: now, from, to });
        self.status = to;
        Ok(())
    }

    /// Switch to `to` now, logging an illegal request instead of returning it.
    pub fn switch_to(&mut self, to: WorkerStatus) {
        if let Err(err) = self.switch_to_at(to, Instant::now()) {
            warn!(worker = %self.uid, error = %err, "ignored status switch");
        }
    }

    /// All-time durations per status as of `now`.
    #[must_use]
    pub fn durations_at(&self, now: Instant) -> StatusDurations {
        self.latencies
            .iter()
            .map(|(status, latency)| (*status, latency.amount_at(now)))
            .collect()
    }

    /// Durations per status inside the trailing window.
    pub fn recent_durations_at(&mut self, now: Instant) -> StatusDurations {
        self.window.durations_at(now)
    }

    /// Active time within the last `W` divided by `W`, where
    /// `W = min(lifetime, horizon)`. A worker younger than the horizon is measured
    /// against its actual lifetime.
    pub fn recent_active_ratio_at(&mut self, now: Instant) -> f64 {
        let window = self.lifetime_at(now).min(self.window.horizon());
        if window.is_zero() {
            return 0.0;
        }
        let active = self
            .recent_durations_at(now)
            .get(&WorkerStatus::Active)
            .copied()
            .unwrap_or_default();
        active.as_secs_f64() / window.as_secs_f64()
    }

    /// Close the running active interval, if any, and return the final durations.
    pub fn settle_at(&mut self, now: Instant) -> StatusDurations {
        if self.status == WorkerStatus::Active {
            if let Err(err) = self.switch_to_at(WorkerStatus::Sleep, now) {
                warn!(worker = %self.uid, error = %err, "failed to settle active interval");
            }
        }
        self.durations_at(now)
    }

    /// Snapshot of this worker as of `now`.
    pub fn snapshot_at(&mut self, now: Instant) -> WorkerSnapshot {
        WorkerSnapshot {
            uid: self.uid,
            status: self.status,
            lifetime: self.lifetime_at(now),
            durations: self.durations_at(now),
            recent_active_ratio: self.recent_active_ratio_at(now),
        }
    }
}

/// Pool-wide durations of retired workers. Separately locked from the live registry.
#[derive(Debug, Default)]
pub struct StatusSettleMap {
    totals: Mutex<StatusDurations>,
}

impl StatusSettleMap {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `duration` to `status`.
    pub fn add(&self, status: WorkerStatus, duration: Duration) {
        *self.totals.lock().entry(status).or_default() += duration;
    }

    /// Fold a retired worker's table into the aggregate.
    pub fn add_all(&self, durations: &StatusDurations) {
        merge_durations(&mut self.totals.lock(), durations);
    }

    /// Copy of the aggregate.
    #[must_use]
    pub fn snapshot(&self) -> StatusDurations {
        self.totals.lock().clone()
    }
}
