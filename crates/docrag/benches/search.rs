//! Benchmarks for vector search latency.
//!
//! Measures top-k query latency across index sizes for both store backends.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docrag_core::{DistanceMetric, IndexSpec, StoredRecord, VectorStore};
#[cfg(feature = "lancedb")]
use docrag_store::LanceStore;
use docrag_store::MemoryStore;
use std::sync::Arc;
use tempfile::tempdir;

const EMBEDDING_DIM: usize = 384;

fn bench_spec() -> IndexSpec {
    IndexSpec {
        name: "bench".to_string(),
        dimension: EMBEDDING_DIM,
        metric: DistanceMetric::Cosine,
        model: "bench".to_string(),
    }
}

/// Deterministic pseudo-random vector for `seed`.
fn create_embedding(seed: u64) -> Vec<f32> {
    (0..EMBEDDING_DIM as u64)
        .map(|i| {
            let hash = blake3::hash(&(seed * EMBEDDING_DIM as u64 + i).to_le_bytes());
            f32::from(hash.as_bytes()[0]) / 127.5 - 1.0
        })
        .collect()
}

/// Populate store with `count` records spread over files of ten chunks.
async fn populate_store(store: &dyn VectorStore, count: usize) {
    let records: Vec<StoredRecord> = (0..count)
        .map(|i| {
            StoredRecord::new(
                &format!("file_{}.txt", i / 10),
                (i % 10) as u32,
                format!("Test content for chunk number {i}."),
                create_embedding(i as u64),
            )
        })
        .collect();

    for batch in records.chunks(100) {
        store.upsert(batch).await.unwrap();
    }
}

fn search_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let query = create_embedding(1_000_003);

    let mut group = c.benchmark_group("search");

    for count in &[100, 1_000, 10_000] {
        // Skip large benchmarks in CI
        if *count > 1_000 && std::env::var("CI").is_ok() {
            continue;
        }

        let memory = Arc::new(MemoryStore::new(bench_spec()));
        rt.block_on(async {
            memory.init().await.unwrap();
            populate_store(memory.as_ref(), *count).await;
        });

        group.bench_with_input(
            BenchmarkId::new("memory", format!("{count}_records")),
            count,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    black_box(memory.query(&query, 5).await.unwrap())
                });
            },
        );

        #[cfg(feature = "lancedb")]
        {
            let temp_dir = tempdir().unwrap();
            let lance = Arc::new(LanceStore::new(temp_dir.path().to_path_buf(), bench_spec()));
            rt.block_on(async {
                lance.init().await.unwrap();
                populate_store(lance.as_ref(), *count).await;
            });

            group.bench_with_input(
                BenchmarkId::new("lancedb", format!("{count}_records")),
                count,
                |b, _| {
                    b.to_async(&rt).iter(|| async {
                        black_box(lance.query(&query, 5).await.unwrap())
                    });
                },
            );
        }
    }

    group.finish();
}

fn persistence_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(10);

    let temp_dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::persistent(bench_spec(), temp_dir.path()));
    rt.block_on(async {
        store.init().await.unwrap();
        populate_store(store.as_ref(), 1_000).await;
    });

    let record = StoredRecord::new("extra.txt", 0, "extra".to_string(), create_embedding(7));
    group.bench_function("upsert_1000_records", |b| {
        b.to_async(&rt)
            .iter(|| async { store.upsert(std::slice::from_ref(&record)).await.unwrap() });
    });

    group.finish();
}

criterion_group!(benches, search_benchmark, persistence_benchmark);
criterion_main!(benches);
