//! Error types for pool, scheduler and accounting operations.

use thiserror::Error;

use super::status::WorkerStatus;

/// Errors produced by scheduler operations.
///
/// Every mutating scheduler call returns one of these synchronously and also threads a
/// copy into the matching lifecycle callback, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A task with this key is already scheduled.
    #[error("task `{0}` already exists")]
    AlreadyExists(String),
    /// No task with this key is scheduled.
    #[error("task `{0}` not found")]
    NotFound(String),
    /// The key is banned: returned by `ban` on a banned key and by `add`/`set` until
    /// the key is unbanned.
    #[error("task `{0}` is already banned")]
    AlreadyBanned(String),
    /// The key is not banned.
    #[error("task `{0}` is not banned")]
    NotBanned(String),
    /// The scheduler has been stopped.
    #[error("scheduler has been stopped")]
    Stopped,
}

/// Errors produced by the elastic worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down and no longer accepts jobs.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The OS refused to start a worker thread.
    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

/// Internal accounting faults. These indicate a logic error, not a caller error, and
/// are logged rather than propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// A status switch outside `Active -> Sleep` / `None|Sleep -> Active`.
    #[error("can not transfer status from `{from}` to `{to}`")]
    InvalidTransition {
        /// Status before the requested switch.
        from: WorkerStatus,
        /// Requested status.
        to: WorkerStatus,
    },
}
