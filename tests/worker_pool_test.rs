//! Integration tests for ElasticPool
//!
//! These tests validate the pool's life cycle:
//! - Growth rules (zero-worker rule, pressure threshold, worker ceiling)
//! - Idle retirement and explicit close
//! - Aggregated activity accounting across retirement
//! - Graceful, idempotent shutdown

use crossbeam_channel::bounded;
use prometheus_task_engine::config::PoolOptions;
use prometheus_task_engine::core::{ElasticPool, PoolError, WorkerStatus, WorkerUid};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn quiet_options() -> PoolOptions {
    // Long monitor interval: no idle retirement during the test.
    PoolOptions::new().with_auto_monitor_interval(Duration::from_secs(600))
}

// ============================================================================
// GROWTH
// ============================================================================

#[test]
fn test_single_worker_below_threshold() {
    let pool = ElasticPool::new(
        quiet_options()
            .with_queue_capacity(10)
            .with_grow_above_ratio(0.9)
            .with_worker_limit(8),
    )
    .unwrap();

    let (gate_tx, gate_rx) = bounded::<()>(0);
    for _ in 0..9 {
        let gate = gate_rx.clone();
        pool.put(move |_| {
            let _ = gate.recv();
        })
        .unwrap();
    }

    assert_eq!(pool.live_worker_count(), 1);
    assert_eq!(pool.peak_live_worker_count(), 1);

    drop(gate_tx);
    pool.stop();
    assert_eq!(pool.stats().completed_jobs, 9);
}

#[test]
fn test_pressure_grows_up_to_limit() {
    let pool = ElasticPool::new(
        quiet_options()
            .with_queue_capacity(4)
            .with_grow_above_ratio(0.5)
            .with_worker_limit(3),
    )
    .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..40 {
        let done = Arc::clone(&done);
        pool.put(move |_| {
            thread::sleep(Duration::from_millis(5));
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(pool.live_worker_count() <= 3);
    }

    pool.stop();
    assert_eq!(done.load(Ordering::SeqCst), 40);
    assert!(pool.peak_live_worker_count() <= 3);
}

#[test]
fn test_concurrent_submitters() {
    let pool = Arc::new(ElasticPool::new(quiet_options().with_worker_limit(4)).unwrap());
    let done = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..50 {
                    let done = Arc::clone(&done);
                    pool.put(move |_| {
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }

    pool.stop();
    assert_eq!(done.load(Ordering::SeqCst), 200);
    assert_eq!(pool.stats().submitted_jobs, 200);
    assert!(pool.peak_live_worker_count() <= 4);
}

// ============================================================================
// RETIREMENT
// ============================================================================

#[test]
fn test_idle_worker_retires_and_durations_survive() {
    let pool = ElasticPool::new(
        PoolOptions::new()
            .with_auto_monitor_interval(Duration::from_millis(20))
            .with_recent_window(Duration::from_millis(60))
            .with_close_below_ratio(0.5),
    )
    .unwrap();

    pool.put(|_| thread::sleep(Duration::from_millis(30))).unwrap();
    assert!(wait_until(Duration::from_secs(5), || pool.live_worker_count() == 0));

    let durations = pool.aggregated_status_durations();
    assert!(durations[&WorkerStatus::Active] >= Duration::from_millis(30));
    assert!(durations.contains_key(&WorkerStatus::Sleep));

    // A retired pool still accepts work.
    let (tx, rx) = bounded(1);
    pool.put(move |worker| {
        let _ = tx.send(worker);
    })
    .unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), WorkerUid(0));
    pool.stop();
}

#[test]
fn test_close_worker() {
    let pool = ElasticPool::new(quiet_options()).unwrap();
    let (tx, rx) = bounded(1);
    pool.put(move |worker| {
        let _ = tx.send(worker);
    })
    .unwrap();
    let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();

    assert!(pool.close_worker(worker));
    assert!(wait_until(Duration::from_secs(5), || pool.live_worker_count() == 0));
    assert!(!pool.close_worker(worker));
    pool.stop();
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_stop_is_idempotent() {
    let pool = ElasticPool::new(quiet_options()).unwrap();
    pool.put(|_| {}).unwrap();
    pool.stop();
    pool.stop();

    assert!(pool.is_stopped());
    assert!(matches!(pool.put(|_| {}), Err(PoolError::PoolShutdown)));
    assert_eq!(pool.live_worker_count(), 0);
}

#[test]
fn test_every_accepted_job_runs_when_stop_races_put() {
    for round in 0..300usize {
        let pool = Arc::new(ElasticPool::new(quiet_options().with_queue_capacity(2)).unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let executed = Arc::new(AtomicUsize::new(0));

        let submitter = {
            let pool = Arc::clone(&pool);
            let accepted = Arc::clone(&accepted);
            let executed = Arc::clone(&executed);
            thread::spawn(move || loop {
                let executed = Arc::clone(&executed);
                let put = pool.put(move |_| {
                    executed.fetch_add(1, Ordering::SeqCst);
                });
                if put.is_err() {
                    break;
                }
                accepted.fetch_add(1, Ordering::SeqCst);
            })
        };

        while accepted.load(Ordering::SeqCst) < round % 7 {
            thread::yield_now();
        }
        pool.stop();
        submitter.join().unwrap();

        assert_eq!(
            executed.load(Ordering::SeqCst),
            accepted.load(Ordering::SeqCst),
            "round {round}"
        );
    }
}

#[test]
fn test_stats_after_panics() {
    let pool = ElasticPool::new(quiet_options()).unwrap();
    for n in 0..10 {
        pool.put(move |_| assert!(n % 2 == 0, "odd job {n}")).unwrap();
    }
    pool.stop();

    let stats = pool.stats();
    assert_eq!(stats.submitted_jobs, 10);
    assert_eq!(stats.completed_jobs, 5);
    assert_eq!(stats.panicked_jobs, 5);
    assert_eq!(stats.live_workers, 0);
}
