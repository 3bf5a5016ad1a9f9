//! Builders to construct pools and schedulers from configuration.

use crate::config::{PoolOptions, SchedulerConfig};
use crate::core::{ElasticPool, PoolError, TimedScheduler};

/// Build an elastic pool from options. Zero fields are filled with defaults first.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` if the filled options are invalid.
pub fn build_pool(options: &PoolOptions) -> Result<ElasticPool, PoolError> {
    let options = options.clone().filled();
    options
        .validate()
        .map_err(|e| PoolError::InvalidConfig(format!("pool invalid: {e}")))?;
    ElasticPool::new(options)
}

/// Build and start a scheduler for the configured backend.
///
/// # Errors
///
/// Returns `PoolError::InvalidConfig` on validation failure and `PoolError::Spawn` if
/// a thread could not be started.
pub fn build_scheduler(config: &SchedulerConfig) -> Result<TimedScheduler, PoolError> {
    config
        .validate()
        .map_err(|e| PoolError::InvalidConfig(format!("config invalid: {e}")))?;
    TimedScheduler::from_config(config)
}
