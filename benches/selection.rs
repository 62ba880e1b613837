//! Benchmarks for endpoint selection with varying endpoint counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relay::config::RetryConfig;
use relay::retry::RetryManager;

fn create_manager(endpoint_count: usize) -> RetryManager {
    let ids: Vec<String> = (0..endpoint_count).map(|i| format!("endpoint-{}", i)).collect();
    let manager = RetryManager::new(ids.clone(), &RetryConfig::default());

    // Spread success rates so selection has to compare every candidate.
    for (i, id) in ids.iter().enumerate() {
        if let Some(health) = manager.health(id) {
            for _ in 0..(i % 4) {
                health.record_failure();
            }
            for _ in 0..(10 - i % 7) {
                health.record_success();
            }
        }
    }
    manager
}

fn bench_next_endpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_endpoint");

    for count in [2usize, 8, 32] {
        let manager = create_manager(count);
        let none: Vec<String> = Vec::new();
        let exclude: Vec<String> = (0..count / 2).map(|i| format!("endpoint-{}", i)).collect();

        group.bench_with_input(BenchmarkId::new("no_exclusions", count), &count, |b, _| {
            b.iter(|| black_box(manager.next_endpoint(black_box(&none))))
        });
        group.bench_with_input(BenchmarkId::new("half_excluded", count), &count, |b, _| {
            b.iter(|| black_box(manager.next_endpoint(black_box(&exclude))))
        });
    }

    group.finish();
}

fn bench_health_status(c: &mut Criterion) {
    let manager = create_manager(16);
    c.bench_function("health_status_16", |b| {
        b.iter(|| black_box(manager.health_status()))
    });
}

criterion_group!(benches, bench_next_endpoint, bench_health_status);
criterion_main!(benches);
