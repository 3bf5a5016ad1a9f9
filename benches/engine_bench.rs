//! Benchmarks for the task engine.
//!
//! Benchmarks cover:
//! - ElasticPool submit-and-drain throughput
//! - Task registry earliest-deadline selection
//! - Worker status accounting

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use prometheus_task_engine::config::PoolOptions;
use prometheus_task_engine::core::{
    ElasticPool, FixedInterval, TaskOutput, TaskRegistry, TaskState, WorkerState, WorkerStatus,
    WorkerUid,
};

// ============================================================================
// ElasticPool Benchmarks
// ============================================================================

fn bench_pool_put_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_put_drain");

    for jobs in [100u64, 1_000] {
        group.throughput(Throughput::Elements(jobs));
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &jobs, |b, &jobs| {
            b.iter(|| {
                let pool = ElasticPool::new(
                    PoolOptions::new()
                        .with_queue_capacity(256)
                        .with_auto_monitor_interval(Duration::from_secs(600)),
                )
                .unwrap();
                let sum = Arc::new(AtomicU64::new(0));
                for n in 0..jobs {
                    let sum = Arc::clone(&sum);
                    pool.put(move |_| {
                        sum.fetch_add(n, Ordering::Relaxed);
                    })
                    .unwrap();
                }
                pool.stop();
                black_box(sum.load(Ordering::Relaxed))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Registry Benchmarks
// ============================================================================

fn bench_registry_select_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_select_next");

    for size in [100usize, 1_000, 10_000] {
        let now = SystemTime::now();
        let registry = TaskRegistry::new();
        for n in 0..size {
            let millis = u64::try_from(n % 997 + 1).unwrap();
            registry.add(TaskState::new_at(
                format!("task-{n}"),
                Arc::new(|| Ok(TaskOutput::new())),
                Arc::new(FixedInterval::new(Duration::from_millis(millis))),
                now,
            ));
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(registry.select_next_exec(now)));
        });
    }

    group.finish();
}

// ============================================================================
// Accounting Benchmarks
// ============================================================================

fn bench_status_switching(c: &mut Criterion) {
    c.bench_function("status_switch_and_ratio", |b| {
        let start = Instant::now();
        let mut state = WorkerState::new_at(WorkerUid(0), Duration::from_secs(60), start);
        let mut now = start;
        b.iter(|| {
            now += Duration::from_micros(10);
            let _ = state.switch_to_at(WorkerStatus::Active, now);
            now += Duration::from_micros(10);
            let _ = state.switch_to_at(WorkerStatus::Sleep, now);
            black_box(state.recent_active_ratio_at(now))
        });
    });
}

criterion_group!(
    benches,
    bench_pool_put_drain,
    bench_registry_select_next,
    bench_status_switching
);
criterion_main!(benches);
