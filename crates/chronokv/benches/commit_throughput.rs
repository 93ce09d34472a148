//! Benchmarks for commit throughput and read latency
//!
//! Run with: cargo bench --bench commit_throughput

use chronokv::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::thread;

fn bench_single_key_commits(c: &mut Criterion) {
    let db = ChronoDb::in_memory().unwrap();
    let mut i = 0u64;

    c.bench_function("commit_single_key", |b| {
        b.iter(|| {
            let mut tx = db.tx().unwrap();
            tx.put("counter", &i).unwrap();
            i += 1;
            black_box(tx.commit().unwrap());
        });
    });
}

fn bench_batch_commits(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_batch");

    for batch_size in [10usize, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = ChronoDb::in_memory().unwrap();
                let mut round = 0u64;
                b.iter(|| {
                    let mut tx = db.tx().unwrap();
                    for k in 0..batch_size {
                        tx.put(&format!("key_{}", k), &round).unwrap();
                    }
                    round += 1;
                    black_box(tx.commit().unwrap());
                });
            },
        );
    }
    group.finish();
}

fn bench_incremental_commit(c: &mut Criterion) {
    c.bench_function("incremental_commit_10x100", |b| {
        let db = ChronoDb::in_memory().unwrap();
        let mut round = 0u64;
        b.iter(|| {
            let mut tx = db.tx().unwrap();
            for chunk in 0..10 {
                for k in 0..100 {
                    tx.put(&format!("key_{}_{}", chunk, k), &round).unwrap();
                }
                tx.commit_incremental().unwrap();
            }
            round += 1;
            black_box(tx.commit().unwrap());
        });
    });
}

fn bench_branch_commits(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_branch_commits");

    for num_threads in [1usize, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*num_threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let db = Arc::new(ChronoDb::in_memory().unwrap());
                for t in 0..num_threads {
                    db.create_branch(&format!("branch_{}", t)).unwrap();
                }
                let mut round = 0u64;
                b.iter(|| {
                    round += 1;
                    let handles: Vec<_> = (0..num_threads)
                        .map(|t| {
                            let db = Arc::clone(&db);
                            thread::spawn(move || {
                                let mut tx = db.tx_on(&format!("branch_{}", t)).unwrap();
                                tx.put("value", &round).unwrap();
                                tx.commit().unwrap();
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for cache_enabled in [true, false] {
        let config = ChronoConfig::new().with_cache(cache_enabled);
        let db = ChronoDb::open(Arc::new(InMemoryBackend::new()), config).unwrap();
        let mut tx = db.tx().unwrap();
        for k in 0..1_000u64 {
            tx.put(&format!("key_{}", k), &k).unwrap();
        }
        tx.commit().unwrap();
        db.create_branch("child").unwrap();

        let label = if cache_enabled { "cached" } else { "uncached" };
        group.bench_function(BenchmarkId::new("master", label), |b| {
            let tx = db.read_only_tx().unwrap();
            let mut k = 0u64;
            b.iter(|| {
                k = (k + 1) % 1_000;
                black_box(tx.get::<u64>(&format!("key_{}", k)).unwrap());
            });
        });
        group.bench_function(BenchmarkId::new("inherited", label), |b| {
            let tx = db.tx_on("child").unwrap();
            let mut k = 0u64;
            b.iter(|| {
                k = (k + 1) % 1_000;
                black_box(tx.get::<u64>(&format!("key_{}", k)).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_key_commits,
    bench_batch_commits,
    bench_incremental_commit,
    bench_branch_commits,
    bench_reads
);
criterion_main!(benches);
