//! Thread-safe keyed store of scheduled tasks.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use super::task::TaskState;

/// Smallest wait returned by [`TaskRegistry::select_next_exec`].
pub const MIN_WAIT: Duration = Duration::from_nanos(1);

/// Tasks by key. Reads return independent copies.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskState>>,
}

impl TaskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if the key is absent. Returns whether the task was inserted.
    pub fn add(&self, task: TaskState) -> bool {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.key) {
            return false;
        }
        tasks.insert(task.key.clone(), task);
        true
    }

    /// Replace if the key is present. Returns whether the task was replaced.
    pub fn set(&self, task: TaskState) -> bool {
        let mut tasks = self.tasks.write();
        match tasks.get_mut(&task.key) {
            Some(slot) => {
                *slot = task;
                true
            }
            None => false,
        }
    }

    /// Insert or replace. Returns the previous task, if any.
    pub fn upsert(&self, task: TaskState) -> Option<TaskState> {
        self.tasks.write().insert(task.key.clone(), task)
    }

    /// Remove a task.
    pub fn remove(&self, key: &str) -> Option<TaskState> {
        self.tasks.write().remove(key)
    }

    /// Copy of a task.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<TaskState> {
        self.tasks.read().get(key).cloned()
    }

    /// Whether a task is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.tasks.read().contains_key(key)
    }

    /// Copies of every task, sorted by key.
    #[must_use]
    pub fn get_all(&self) -> Vec<TaskState> {
        let mut all: Vec<_> = self.tasks.read().values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Mutate a task in place under the write lock.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut TaskState) -> R) -> Option<R> {
        self.tasks.write().get_mut(key).map(f)
    }

    /// Remove a task only if `keep` returns false for it.
    pub fn remove_unless(
        &self,
        key: &str,
        keep: impl FnOnce(&TaskState) -> bool,
    ) -> Option<TaskState> {
        let mut tasks = self.tasks.write();
        if tasks.get(key).is_some_and(|task| !keep(task)) {
            return tasks.remove(key);
        }
        None
    }

    /// The pending task with the earliest next fire time and how long to wait for it.
    ///
    /// Ties are broken by key order. The wait is at least [`MIN_WAIT`].
    #[must_use]
    pub fn select_next_exec(&self, now: SystemTime) -> Option<(TaskState, Duration)> {
        let tasks = self.tasks.read();
        let (next, task) = tasks
            .values()
            .filter_map(|task| task.next_fire_time.map(|next| (next, task)))
            .min_by(|(a, ta), (b, tb)| a.cmp(b).then_with(|| ta.key.cmp(&tb.key)))?;
        let wait = next
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
            .max(MIN_WAIT);
        Some((task.clone(), wait))
    }
}
