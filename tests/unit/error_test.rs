//! Tests for error types

use prometheus_task_engine::core::{PoolError, SchedulerError, StatusError, WorkerStatus};

#[test]
fn test_scheduler_error_messages() {
    assert_eq!(
        SchedulerError::AlreadyExists("sync".into()).to_string(),
        "task `sync` already exists"
    );
    assert_eq!(
        SchedulerError::NotFound("sync".into()).to_string(),
        "task `sync` not found"
    );
    assert_eq!(
        SchedulerError::AlreadyBanned("sync".into()).to_string(),
        "task `sync` is already banned"
    );
    assert_eq!(
        SchedulerError::NotBanned("sync".into()).to_string(),
        "task `sync` is not banned"
    );
    assert_eq!(SchedulerError::Stopped.to_string(), "scheduler has been stopped");
}

#[test]
fn test_scheduler_error_is_cloneable() {
    let err = SchedulerError::AlreadyBanned("k".into());
    assert_eq!(err.clone(), err);
}

#[test]
fn test_pool_error_messages() {
    assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
    assert_eq!(
        PoolError::InvalidConfig("worker_limit must be greater than 0".into()).to_string(),
        "invalid configuration: worker_limit must be greater than 0"
    );
}

#[test]
fn test_status_error_message() {
    let err = StatusError::InvalidTransition {
        from: WorkerStatus::Active,
        to: WorkerStatus::Active,
    };
    assert_eq!(
        err.to_string(),
        format!(
            "can not transfer status from `{}` to `{}`",
            WorkerStatus::Active,
            WorkerStatus::Active
        )
    );
}

#[test]
fn test_errors_convert_into_anyhow() {
    let err: anyhow::Error = SchedulerError::Stopped.into();
    assert_eq!(
        err.downcast_ref::<SchedulerError>(),
        Some(&SchedulerError::Stopped)
    );
}
