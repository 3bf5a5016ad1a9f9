//! Configuration models for the worker pool and the scheduler.

pub mod pool;

pub use pool::{ExecutorBackend, PoolOptions, SchedulerConfig, ENV_PREFIX};
