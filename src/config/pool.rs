//! Elastic pool and scheduler configuration structures.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::status::DEFAULT_RECENT_WINDOW;

/// Prefix of the environment variables read by [`PoolOptions::from_env`].
pub const ENV_PREFIX: &str = "TASK_ENGINE_";

const DEFAULT_AUTO_MONITOR_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_CLOSE_BELOW_RATIO: f64 = 0.5;
const DEFAULT_GROW_ABOVE_RATIO: f64 = 0.9;

/// Elastic worker pool options.
///
/// Zero or out-of-range fields are replaced by defaults when the pool is built, so a
/// partially filled value is always usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// How often each worker evaluates its recent active ratio.
    #[serde(with = "millis", rename = "auto_monitor_interval_ms")]
    pub auto_monitor_interval: Duration,
    /// A worker whose recent active ratio is below this value retires itself.
    pub close_below_ratio: f64,
    /// A worker is added when queue occupancy exceeds this fraction of capacity.
    pub grow_above_ratio: f64,
    /// Maximum number of live workers.
    pub worker_limit: usize,
    /// Job queue capacity.
    pub queue_capacity: usize,
    /// Trailing window used for the recent active ratio.
    #[serde(with = "millis", rename = "recent_window_ms")]
    pub recent_window: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            auto_monitor_interval: DEFAULT_AUTO_MONITOR_INTERVAL,
            close_below_ratio: DEFAULT_CLOSE_BELOW_RATIO,
            grow_above_ratio: DEFAULT_GROW_ABOVE_RATIO,
            worker_limit: cpus * 3,
            queue_capacity: cpus * 100,
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

fn is_fraction(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

impl PoolOptions {
    /// Options populated with defaults derived from the host CPU count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the monitor interval.
    #[must_use]
    pub const fn with_auto_monitor_interval(mut self, interval: Duration) -> Self {
        self.auto_monitor_interval = interval;
        self
    }

    /// Set the retirement threshold.
    #[must_use]
    pub fn with_close_below_ratio(mut self, ratio: f64) -> Self {
        self.close_below_ratio = ratio;
        self
    }

    /// Set the growth threshold.
    #[must_use]
    pub fn with_grow_above_ratio(mut self, ratio: f64) -> Self {
        self.grow_above_ratio = ratio;
        self
    }

    /// Set the live worker ceiling.
    #[must_use]
    pub const fn with_worker_limit(mut self, limit: usize) -> Self {
        self.worker_limit = limit;
        self
    }

    /// Set the job queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the trailing window length.
    #[must_use]
    pub const fn with_recent_window(mut self, window: Duration) -> Self {
        self.recent_window = window;
        self
    }

    /// Replace zero and out-of-range fields with defaults.
    pub fn fill_defaults(&mut self) {
        let defaults = Self::default();
        if self.auto_monitor_interval.is_zero() {
            self.auto_monitor_interval = defaults.auto_monitor_interval;
        }
        if !is_fraction(self.close_below_ratio) {
            self.close_below_ratio = defaults.close_below_ratio;
        }
        if !is_fraction(self.grow_above_ratio) {
            self.grow_above_ratio = defaults.grow_above_ratio;
        }
        if self.worker_limit == 0 {
            self.worker_limit = defaults.worker_limit;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = defaults.queue_capacity;
        }
        if self.recent_window.is_zero() {
            self.recent_window = defaults.recent_window;
        }
    }

    /// Consuming form of [`fill_defaults`](Self::fill_defaults).
    #[must_use]
    pub fn filled(mut self) -> Self {
        self.fill_defaults();
        self
    }

    /// Validate option values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.auto_monitor_interval.is_zero() {
            return Err("auto_monitor_interval must be greater than 0".into());
        }
        if !is_fraction(self.close_below_ratio) {
            return Err(format!(
                "close_below_ratio must be in (0, 1), got {}",
                self.close_below_ratio
            ));
        }
        if !is_fraction(self.grow_above_ratio) {
            return Err(format!(
                "grow_above_ratio must be in (0, 1), got {}",
                self.grow_above_ratio
            ));
        }
        if self.worker_limit == 0 {
            return Err("worker_limit must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.recent_window.is_zero() {
            return Err("recent_window must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse options from JSON, fill defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let options: Self =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        let options = options.filled();
        options.validate()?;
        Ok(options)
    }

    /// Read options from `TASK_ENGINE_*` environment variables, loading a `.env` file
    /// first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut options = Self::default();
        if let Some(ms) = env_var::<u64>("AUTO_MONITOR_INTERVAL_MS")? {
            options.auto_monitor_interval = Duration::from_millis(ms);
        }
        if let Some(ratio) = env_var("CLOSE_BELOW_RATIO")? {
            options.close_below_ratio = ratio;
        }
        if let Some(ratio) = env_var("GROW_ABOVE_RATIO")? {
            options.grow_above_ratio = ratio;
        }
        if let Some(limit) = env_var("WORKER_LIMIT")? {
            options.worker_limit = limit;
        }
        if let Some(capacity) = env_var("QUEUE_CAPACITY")? {
            options.queue_capacity = capacity;
        }
        if let Some(ms) = env_var::<u64>("RECENT_WINDOW_MS")? {
            options.recent_window = Duration::from_millis(ms);
        }
        let options = options.filled();
        options.validate()?;
        Ok(options)
    }
}

fn env_var<T>(suffix: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let name = format!("{ENV_PREFIX}{suffix}");
    match env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(_) => Ok(None),
    }
}

/// Where scheduled tasks are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorBackend {
    /// A fixed number of dedicated executor threads.
    #[default]
    Fixed,
    /// Tasks are handed to an elastic worker pool.
    Elastic,
}

/// Recurring task scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of executor threads for the fixed backend.
    pub executor_count: usize,
    /// Executor backend selection.
    pub backend: ExecutorBackend,
    /// Pool options for the elastic backend.
    pub pool: PoolOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            executor_count: num_cpus::get().max(1),
            backend: ExecutorBackend::Fixed,
            pool: PoolOptions::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate the settings used by the selected backend.
    ///
    /// # Errors
    ///
    /// Returns a description of the invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        match self.backend {
            ExecutorBackend::Fixed if self.executor_count == 0 => {
                Err("executor_count must be greater than 0".into())
            }
            ExecutorBackend::Fixed => Ok(()),
            ExecutorBackend::Elastic => self
                .pool
                .clone()
                .filled()
                .validate()
                .map_err(|e| format!("pool invalid: {e}")),
        }
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = PoolOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.worker_limit >= 3);
        assert!(options.queue_capacity >= 100);
        assert!((options.grow_above_ratio - 0.9).abs() < f64::EPSILON);
        assert!((options.close_below_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fill_defaults_replaces_out_of_range() {
        let mut options = PoolOptions {
            auto_monitor_interval: Duration::ZERO,
            close_below_ratio: 1.5,
            grow_above_ratio: 0.0,
            worker_limit: 0,
            queue_capacity: 0,
            recent_window: Duration::ZERO,
        };
        assert!(options.validate().is_err());
        options.fill_defaults();
        assert_eq!(options, PoolOptions::default());
    }

    #[test]
    fn test_fill_defaults_keeps_explicit_values() {
        let options = PoolOptions::new()
            .with_queue_capacity(10)
            .with_worker_limit(2)
            .with_grow_above_ratio(0.25)
            .filled();
        assert_eq!(options.queue_capacity, 10);
        assert_eq!(options.worker_limit, 2);
        assert!((options.grow_above_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_json_str_uses_millis() {
        let options = PoolOptions::from_json_str(
            r#"{"auto_monitor_interval_ms": 250, "queue_capacity": 4, "close_below_ratio": 2.0}"#,
        )
        .unwrap();
        assert_eq!(options.auto_monitor_interval, Duration::from_millis(250));
        assert_eq!(options.queue_capacity, 4);
        assert!((options.close_below_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scheduler_config_validation() {
        let mut cfg = SchedulerConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.executor_count = 0;
        assert!(cfg.validate().is_err());
        cfg.backend = ExecutorBackend::Elastic;
        assert!(cfg.validate().is_ok());
    }
}
