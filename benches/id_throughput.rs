//! Benchmarks for id issuance.
//!
//! Run with: cargo bench
//! View results in: target/criterion/report/index.html

use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seqstore::config::{IdFactoryConfig, StoreConfig};
use seqstore::contracts::IdFactory;
use seqstore::storage::{MemoryStore, RocksDbStore, StoreIdFactory};
use tempfile::TempDir;

fn rocksdb_factory(sync_writes: bool) -> (StoreIdFactory<RocksDbStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        data_dir: dir.path().to_path_buf(),
        sync_writes,
        ..StoreConfig::default()
    };
    let store = Arc::new(RocksDbStore::open_with_config(&config).unwrap());
    let factory = StoreIdFactory::open(store, IdFactoryConfig::new("bench_id")).unwrap();
    (factory, dir)
}

// =============================================================================
// Single caller
// =============================================================================

fn bench_next_id_memory(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::default());
    let factory = StoreIdFactory::open(store, IdFactoryConfig::new("bench_id")).unwrap();

    c.bench_function("next_id_memory", |b| {
        b.iter(|| factory.next_id().unwrap());
    });
}

fn bench_next_id_rocksdb(c: &mut Criterion) {
    let (factory, _dir) = rocksdb_factory(false);

    c.bench_function("next_id_rocksdb", |b| {
        b.iter(|| factory.next_id().unwrap());
    });
}

fn bench_next_id_rocksdb_synced(c: &mut Criterion) {
    let (factory, _dir) = rocksdb_factory(true);

    let mut group = c.benchmark_group("synced");
    group.sample_size(20);
    group.bench_function("next_id_rocksdb_sync", |b| {
        b.iter(|| factory.next_id().unwrap());
    });
    group.finish();
}

// =============================================================================
// Contended callers
// =============================================================================

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_rocksdb");
    let per_thread = 100u64;

    for threads in [2u64, 4, 8].iter() {
        let (factory, _dir) = rocksdb_factory(false);
        let factory = Arc::new(factory);

        group.throughput(Throughput::Elements(threads * per_thread));
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &n| {
            b.iter(|| {
                let handles: Vec<_> = (0..n)
                    .map(|_| {
                        let f = Arc::clone(&factory);
                        thread::spawn(move || {
                            for _ in 0..per_thread {
                                f.next_id().unwrap();
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_next_id_memory,
    bench_next_id_rocksdb,
    bench_next_id_rocksdb_synced,
    bench_contended,
);
criterion_main!(benches);
