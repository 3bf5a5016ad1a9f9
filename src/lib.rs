//! # Prometheus Task Engine
//!
//! A thread-based task execution engine with two cooperating parts.
//!
//! ## Core Problem Solved
//!
//! Background services need to run two kinds of work without hand-tuning thread counts:
//!
//! - **Bursty one-shot jobs**: the number of threads should follow the load, growing when
//!   the queue fills up and shrinking when workers sit idle
//! - **Recurring jobs**: named tasks that fire on a schedule and can be cancelled,
//!   suspended or triggered by hand while the process runs
//!
//! ## Key Features
//!
//! - **Elastic Worker Pool**: grows under queue pressure, workers retire themselves when
//!   their recent active ratio drops, never stalls with queued work and zero workers
//! - **Activity Accounting**: every worker tracks time spent per status, cumulatively and
//!   over a sliding window; retired workers fold into a pool-wide aggregate
//! - **Keyed Scheduler**: earliest-deadline dispatch with coalesced re-evaluation, fixed
//!   or elastic executors, ban/unban, manual execution
//! - **Pluggable Policies**: fixed interval, bounded interval, explicit plan, daily
//! - **Lifecycle Callbacks**: delivered off the dispatch path, identified by handles
//!
//! ## ElasticPool
//!
//! ```rust,no_run
//! use prometheus_task_engine::config::PoolOptions;
//! use prometheus_task_engine::core::ElasticPool;
//!
//! let pool = ElasticPool::new(PoolOptions::new().with_worker_limit(8))?;
//! for n in 0..100 {
//!     pool.put(move |worker| println!("job {n} on worker {worker}"))?;
//! }
//! pool.stop();
//! println!("{:?}", pool.aggregated_status_durations());
//! # Ok::<(), prometheus_task_engine::core::PoolError>(())
//! ```
//!
//! ## TimedScheduler
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use prometheus_task_engine::core::{BoundedInterval, TaskOutput, TimedScheduler};
//!
//! let scheduler = TimedScheduler::new(4)?;
//! scheduler
//!     .add(
//!         "report",
//!         || {
//!             let mut output = TaskOutput::new();
//!             output.insert("rows".into(), 42.into());
//!             Ok(output)
//!         },
//!         BoundedInterval::new(Duration::from_secs(10), 6),
//!     )
//!     .expect("fresh key");
//! scheduler.on_execute(|event| {
//!     if let Some(err) = event.error() {
//!         eprintln!("{} failed: {err}", event.task.key);
//!     }
//! });
//! scheduler.stop();
//! # Ok::<(), prometheus_task_engine::core::PoolError>(())
//! ```
//!
//! Logging goes through `tracing`; nothing is printed unless a subscriber is installed,
//! for example with [`util::init_tracing`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Configuration models for the pool and the scheduler.
pub mod config;
/// Worker pool, accounting and scheduling.
pub mod core;
/// Builders to construct engine components from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
