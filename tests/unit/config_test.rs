//! Tests for configuration loading and validation

use prometheus_task_engine::config::{ExecutorBackend, PoolOptions, SchedulerConfig, ENV_PREFIX};
use std::env;
use std::time::Duration;

#[test]
fn test_pool_options_builder() {
    let options = PoolOptions::new()
        .with_worker_limit(6)
        .with_queue_capacity(32)
        .with_close_below_ratio(0.2)
        .with_recent_window(Duration::from_secs(5));
    assert!(options.validate().is_ok());
    assert_eq!(options.worker_limit, 6);
    assert_eq!(options.queue_capacity, 32);
    assert_eq!(options.recent_window, Duration::from_secs(5));
}

#[test]
fn test_pool_options_invalid_ratio() {
    let options = PoolOptions::new().with_grow_above_ratio(1.0);
    let err = options.validate().unwrap_err();
    assert!(err.contains("grow_above_ratio"));
}

#[test]
fn test_pool_options_json_partial() {
    let options = PoolOptions::from_json_str(r#"{"worker_limit": 5, "recent_window_ms": 1500}"#)
        .unwrap();
    assert_eq!(options.worker_limit, 5);
    assert_eq!(options.recent_window, Duration::from_millis(1500));
    assert_eq!(options.queue_capacity, PoolOptions::default().queue_capacity);
}

#[test]
fn test_pool_options_json_malformed() {
    let err = PoolOptions::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_pool_options_serde_round_trip_uses_millis() {
    let options = PoolOptions::new().with_auto_monitor_interval(Duration::from_millis(750));
    let value = serde_json::to_value(&options).unwrap();
    assert_eq!(value["auto_monitor_interval_ms"], 750);
    assert_eq!(value["recent_window_ms"], 60_000);
}

#[test]
fn test_pool_options_from_env() {
    env::set_var(format!("{ENV_PREFIX}WORKER_LIMIT"), "7");
    env::set_var(format!("{ENV_PREFIX}AUTO_MONITOR_INTERVAL_MS"), " 1200 ");
    let options = PoolOptions::from_env().unwrap();
    assert_eq!(options.worker_limit, 7);
    assert_eq!(options.auto_monitor_interval, Duration::from_millis(1200));

    env::set_var(format!("{ENV_PREFIX}WORKER_LIMIT"), "many");
    let err = PoolOptions::from_env().unwrap_err();
    assert!(err.contains("TASK_ENGINE_WORKER_LIMIT"));

    env::remove_var(format!("{ENV_PREFIX}WORKER_LIMIT"));
    env::remove_var(format!("{ENV_PREFIX}AUTO_MONITOR_INTERVAL_MS"));
}

#[test]
fn test_scheduler_config_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"backend": "elastic", "pool": {"worker_limit": 2, "queue_capacity": 8}}"#,
    )
    .unwrap();
    assert_eq!(cfg.backend, ExecutorBackend::Elastic);
    assert_eq!(cfg.pool.worker_limit, 2);
    assert!(cfg.executor_count >= 1);
}

#[test]
fn test_scheduler_config_rejects_zero_executors() {
    let err = SchedulerConfig::from_json_str(r#"{"executor_count": 0}"#).unwrap_err();
    assert!(err.contains("executor_count"));
}

#[test]
fn test_scheduler_config_unknown_backend() {
    assert!(SchedulerConfig::from_json_str(r#"{"backend": "cloud"}"#).is_err());
}
