//! Recurring task state.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;

use super::schedule::SchedulePolicy;
use crate::util::panic_message;

/// Result map produced by a task body.
pub type TaskOutput = HashMap<String, serde_json::Value>;

/// Outcome of one execution. Errors are shared so snapshots stay cheap to clone.
pub type TaskResult = Result<TaskOutput, Arc<anyhow::Error>>;

/// A task body. It is called once per execution and may be called from any executor.
pub type TaskFn = Arc<dyn Fn() -> anyhow::Result<TaskOutput> + Send + Sync>;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// State of one scheduled task.
///
/// Values handed out by the scheduler are independent copies; changing them does not
/// affect the registry.
#[derive(Clone)]
pub struct TaskState {
    /// Unique task key.
    pub key: String,
    /// Task body.
    pub job: TaskFn,
    /// When the task was added.
    pub add_time: SystemTime,
    /// When the dispatcher last fired it.
    pub last_fire_time: Option<SystemTime>,
    /// Next scheduled fire; `None` once the policy has no further executions.
    pub next_fire_time: Option<SystemTime>,
    /// Scheduled fires so far. Manual executions do not count.
    pub count: u32,
    /// Schedule policy.
    pub policy: Arc<dyn SchedulePolicy>,
    /// Result of the most recent execution.
    pub last_result: Option<TaskResult>,
    /// Executions so far, scheduled and manual.
    pub run_count: u64,
    /// When the most recent execution finished.
    pub last_run_time: Option<SystemTime>,
    /// Distinguishes this task from an earlier one under the same key.
    pub(crate) generation: u64,
    pub(crate) in_flight: bool,
}

impl TaskState {
    /// Create a task added now.
    #[must_use]
    pub fn new(key: impl Into<String>, job: TaskFn, policy: Arc<dyn SchedulePolicy>) -> Self {
        Self::new_at(key, job, policy, SystemTime::now())
    }

    /// Create a task added at `add_time`; the first fire time comes from the policy.
    #[must_use]
    pub fn new_at(
        key: impl Into<String>,
        job: TaskFn,
        policy: Arc<dyn SchedulePolicy>,
        add_time: SystemTime,
    ) -> Self {
        let mut task = Self {
            key: key.into(),
            job,
            add_time,
            last_fire_time: None,
            next_fire_time: None,
            count: 0,
            policy,
            last_result: None,
            run_count: 0,
            last_run_time: None,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            in_flight: false,
        };
        task.next_fire_time = task.policy.next_fire(&task);
        task
    }

    /// Whether the policy has another execution planned.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.next_fire_time.is_some()
    }

    /// Record a scheduled fire at `now` and ask the policy for the next one.
    pub fn advance_at(&mut self, now: SystemTime) {
        self.count = self.count.saturating_add(1);
        self.last_fire_time = Some(now);
        self.next_fire_time = self.policy.next_fire(self);
    }

    /// Run the body once. A panic is reported as an error.
    #[must_use]
    pub fn run(&self) -> TaskResult {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.job)())) {
            Ok(result) => result.map_err(Arc::new),
            Err(payload) => Err(Arc::new(anyhow!(
                "task `{}` panicked: {}",
                self.key,
                panic_message(payload.as_ref())
            ))),
        }
    }

    /// Store the outcome of an execution that finished at `at`.
    pub fn record_run(&mut self, result: TaskResult, at: SystemTime) {
        self.run_count += 1;
        self.last_run_time = Some(at);
        self.last_result = Some(result);
    }
}

impl fmt::Debug for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskState")
            .field("key", &self.key)
            .field("add_time", &self.add_time)
            .field("last_fire_time", &self.last_fire_time)
            .field("next_fire_time", &self.next_fire_time)
            .field("count", &self.count)
            .field("policy", &format_args!("{}", self.policy))
            .field("run_count", &self.run_count)
            .field("last_ok", &self.last_result.as_ref().map(Result::is_ok))
            .finish_non_exhaustive()
    }
}
