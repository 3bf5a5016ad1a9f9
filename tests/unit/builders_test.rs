//! Tests for builder modules

use prometheus_task_engine::builders::{build_pool, build_scheduler};
use prometheus_task_engine::config::{ExecutorBackend, PoolOptions, SchedulerConfig};
use prometheus_task_engine::core::PoolError;

#[test]
fn test_build_pool_uses_options() {
    let pool = build_pool(&PoolOptions::new().with_worker_limit(3)).unwrap();
    assert_eq!(pool.options().worker_limit, 3);
    assert_eq!(pool.live_worker_count(), 0);
    pool.stop();
}

#[test]
fn test_build_scheduler_fixed() {
    let config = SchedulerConfig {
        executor_count: 3,
        backend: ExecutorBackend::Fixed,
        ..SchedulerConfig::default()
    };
    let scheduler = build_scheduler(&config).unwrap();
    assert_eq!(scheduler.backend(), ExecutorBackend::Fixed);
    assert_eq!(scheduler.executor_snapshots().len(), 3);
    scheduler.stop();
}

#[test]
fn test_build_scheduler_invalid() {
    let config = SchedulerConfig {
        executor_count: 0,
        ..SchedulerConfig::default()
    };
    match build_scheduler(&config) {
        Err(PoolError::InvalidConfig(msg)) => assert!(msg.contains("executor_count")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("zero executors accepted"),
    }
}
