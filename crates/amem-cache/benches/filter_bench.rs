//! Benchmarks for filtering a cached "all memories" slice (§4.3).
//!
//! Run with: cargo bench -p amem-cache --bench filter_bench

use std::hint::black_box;

use amem_cache::{LocalCache, MemoryCache};
use amem_core::{CacheConfig, Category, Filter, Lifespan, Memory, MemoryId, Mutability, Status};
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn generate_memories(count: usize) -> Vec<Memory> {
  let now = Utc::now();
  (0..count)
    .map(|i| Memory {
      id: MemoryId::new(),
      subject_key: "user-1".into(),
      namespace: "app-a".into(),
      category: Category::ALL[i % Category::ALL.len()],
      summary: format!("memory number {i} about some preference or fact"),
      raw_text: format!("memory number {i} about some preference or fact"),
      importance: (i % 5) as u8 + 1,
      mutability: Mutability::Mutable,
      lifespan: Lifespan::LongTerm,
      forget_score: 0.0,
      status: Status::Active,
      supersedes_canonical_keys: Default::default(),
      superseded_by_id: None,
      metadata: serde_json::Value::Null,
      created_at: now,
      updated_at: now,
      expires_at: None,
      entity_relationships: Vec::new(),
    })
    .collect()
}

fn bench_get_with_filter(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let mut group = c.benchmark_group("get_with_filter");

  for count in [100, 1_000, 10_000].iter() {
    let cache = LocalCache::new(CacheConfig::default());
    let memories = generate_memories(*count);
    rt.block_on(cache.put_all("user-1", "app-a", memories));

    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
      let filter = Filter::for_category(Category::Fact);
      b.iter(|| rt.block_on(cache.get_with_filter(black_box("user-1"), black_box("app-a"), black_box(&filter))));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_get_with_filter);
criterion_main!(benches);
