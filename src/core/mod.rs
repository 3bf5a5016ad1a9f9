//! Worker pool, activity accounting and recurring task scheduling.

pub mod callbacks;
pub mod error;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod status;
pub mod task;
pub mod uid;
pub mod worker_pool;

pub use callbacks::{
    AddEvent, BanEvent, Callback, CallbackHandle, CallbackList, CancelEvent, ExecuteEvent,
    UnBanEvent,
};
pub use error::{PoolError, SchedulerError, StatusError};
pub use registry::TaskRegistry;
pub use schedule::{BoundedInterval, DailySchedule, FixedInterval, PlanSchedule, SchedulePolicy};
pub use scheduler::TimedScheduler;
pub use status::{
    StatusDurations, StatusSettleMap, WorkerSnapshot, WorkerState, WorkerStatus,
    DEFAULT_RECENT_WINDOW,
};
pub use task::{TaskFn, TaskOutput, TaskResult, TaskState};
pub use uid::{Generator, UidGenerator, WorkerUid};
pub use worker_pool::{ElasticPool, Job, PoolStats};
