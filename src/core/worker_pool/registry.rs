//! Live worker registry. Its length is the single source of truth for the worker count.

use std::collections::HashMap;
use std::time::Instant;

use crossbeam_channel::Sender;

use crate::core::status::{
    merge_durations, StatusDurations, WorkerSnapshot, WorkerState, WorkerStatus,
};
use crate::core::uid::WorkerUid;

struct WorkerEntry {
    state: WorkerState,
    close_tx: Sender<()>,
}

/// Accounting state and close signal of every live worker.
#[derive(Default)]
pub(super) struct WorkerRegistry {
    workers: HashMap<WorkerUid, WorkerEntry>,
    peak: usize,
}

impl WorkerRegistry {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub const fn peak(&self) -> usize {
        self.peak
    }

    pub fn active_count(&self) -> usize {
        self.workers
            .values()
            .filter(|entry| entry.state.status() == WorkerStatus::Active)
            .count()
    }

    pub fn insert(&mut self, state: WorkerState, close_tx: Sender<()>) {
        self.workers.insert(state.uid(), WorkerEntry { state, close_tx });
        self.peak = self.peak.max(self.workers.len());
    }

    /// Switch a worker's status. Illegal transitions are logged by the state itself.
    pub fn switch(&mut self, uid: WorkerUid, to: WorkerStatus) {
        if let Some(entry) = self.workers.get_mut(&uid) {
            entry.state.switch_to(to);
        }
    }

    pub fn recent_active_ratio(&mut self, uid: WorkerUid, now: Instant) -> Option<f64> {
        self.workers
            .get_mut(&uid)
            .map(|entry| entry.state.recent_active_ratio_at(now))
    }

    /// Remove a worker and return its settled durations.
    pub fn remove(&mut self, uid: WorkerUid, now: Instant) -> Option<StatusDurations> {
        self.workers
            .remove(&uid)
            .map(|mut entry| entry.state.settle_at(now))
    }

    /// Ask a worker to retire. Returns false if it is not alive.
    pub fn close(&self, uid: WorkerUid) -> bool {
        self.workers
            .get(&uid)
            .is_some_and(|entry| entry.close_tx.try_send(()).is_ok() || entry.close_tx.is_full())
    }

    pub fn live_durations(&self, now: Instant) -> StatusDurations {
        let mut total = StatusDurations::new();
        for entry in self.workers.values() {
            merge_durations(&mut total, &entry.state.durations_at(now));
        }
        total
    }

    pub fn snapshots(&mut self, now: Instant) -> Vec<WorkerSnapshot> {
        let mut snapshots: Vec<_> = self
            .workers
            .values_mut()
            .map(|entry| entry.state.snapshot_at(now))
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.uid);
        snapshots
    }
}
