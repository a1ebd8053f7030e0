use amem_core::{Category, Filter, Memory};
use async_trait::async_trait;

/// Snapshot of a cache's hit/miss behavior, surfaced through
/// `MemoryCore::cache_stats` (§6.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  pub entries: usize,
}

/// A multi-tier memory cache: independently-TTL'd per-category slices plus
/// an "all memories" slice used to serve arbitrary filters (§4.3).
#[async_trait]
pub trait MemoryCache: Send + Sync {
  async fn get_category(&self, subject_key: &str, scope: &str, category: Category) -> Option<Vec<Memory>>;

  async fn put_category(&self, subject_key: &str, scope: &str, category: Category, memories: Vec<Memory>);

  async fn get_all(&self, subject_key: &str, scope: &str) -> Option<Vec<Memory>>;

  async fn put_all(&self, subject_key: &str, scope: &str, memories: Vec<Memory>);

  /// Serves an arbitrary filter against the cached "all memories" slice,
  /// re-applying the filter in-process; `None` means the slice itself was a
  /// cache miss, not that it matched nothing.
  async fn get_with_filter(&self, subject_key: &str, scope: &str, filter: &Filter) -> Option<Vec<Memory>>;

  async fn invalidate_category(&self, subject_key: &str, scope: &str, category: Category);

  /// Drops the "all memories" slice without touching per-category slices.
  async fn invalidate_all_slice(&self, subject_key: &str, scope: &str);

  async fn invalidate_user(&self, subject_key: &str);

  /// Pre-populates every category slice and the "all memories" slice for a
  /// session, used right after `rebind_user`/`rebind_scope` (§6.1 `warmup_cache`).
  async fn warmup(&self, subject_key: &str, scope: &str, by_category: Vec<(Category, Vec<Memory>)>);

  async fn stats(&self) -> CacheStats;

  /// Stops the background TTL sweeper, if one is running. Idempotent.
  async fn close(&self);
}
