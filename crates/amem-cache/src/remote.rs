use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration as StdDuration;

use amem_core::{Category, CacheConfig, CachedBundle, Filter, Memory, Status};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::contract::{CacheStats, MemoryCache};
use crate::error::Result;
use crate::key::{ALL_PREFIX, CATEGORY_PREFIX, build_key, user_prefix};
use crate::local::LocalCache;

/// Shared key/value store backing `RemoteCache` (a Redis-like service, in
/// production). Kept minimal: memory bundles are opaque bytes to the store.
#[async_trait]
pub trait RemoteKv: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
  async fn set(&self, key: &str, value: Vec<u8>, ttl: StdDuration) -> Result<()>;
  async fn delete(&self, key: &str) -> Result<()>;
  /// Keys whose name starts with `prefix`, for prefix-scoped invalidation
  /// (§6.1, §4.3 "invalidation by prefix uses a cursored scan").
  async fn scan(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Every cache hit re-filters with `status = active` and `expires_at`
/// absent-or-future (§4.3): a remote bundle can outlive one of its own
/// memories just as a local one can.
fn live_filter() -> Filter {
  Filter {
    status: Some(Status::Active),
    ..Default::default()
  }
}

/// Cache fronted by a shared remote KV, with a local L1 bounded by
/// `local_max_age` so repeated reads in the same process don't all pay the
/// network round trip (§4.3).
pub struct RemoteCache {
  kv: Arc<dyn RemoteKv>,
  l1: Arc<LocalCache>,
  config: CacheConfig,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl RemoteCache {
  pub fn new(kv: Arc<dyn RemoteKv>, config: CacheConfig) -> Self {
    let l1_ttl = config.local_max_age;
    let l1_config = CacheConfig {
      rules_ttl: l1_ttl,
      facts_ttl: l1_ttl,
      skills_ttl: l1_ttl,
      context_ttl: l1_ttl,
      all_memories_ttl: l1_ttl,
      local_max_age: l1_ttl,
      ..config.clone()
    };
    Self {
      kv,
      l1: LocalCache::new(l1_config),
      config,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    }
  }

  fn ttl_for(&self, category: Option<Category>) -> StdDuration {
    match category {
      Some(Category::Rule) => self.config.rules_ttl,
      Some(Category::Fact) => self.config.facts_ttl,
      Some(Category::Skill) => self.config.skills_ttl,
      Some(Category::Context) => self.config.context_ttl,
      _ => self.config.all_memories_ttl,
    }
  }

  /// Decodes the remote bundle for `key` and, alongside its memories, the TTL
  /// remaining on it — the L1 refill must not outlive the entry it copied
  /// from (§4.3).
  async fn fetch(&self, key: &str) -> Option<(Vec<Memory>, chrono::Duration)> {
    let raw = self.kv.get(key).await.ok().flatten()?;
    let bundle: CachedBundle = serde_json::from_slice(&raw).ok()?;
    let now = Utc::now();
    if bundle.is_expired(now) {
      return None;
    }
    let remaining = bundle.expires_at - now;
    Some((bundle.memories, remaining))
  }

  /// The L1 refill TTL: the lesser of the remote entry's remaining TTL and
  /// the configured local max age (§4.3).
  fn l1_refill_ttl(&self, remaining_remote_ttl: chrono::Duration) -> chrono::Duration {
    let local_max_age = chrono::Duration::from_std(self.config.local_max_age).unwrap_or(chrono::Duration::zero());
    remaining_remote_ttl.min(local_max_age).max(chrono::Duration::zero())
  }

  async fn store(&self, key: &str, memories: &[Memory], ttl_secs: StdDuration) -> Result<()> {
    let bundle = CachedBundle::new(memories.to_vec(), chrono::Duration::seconds(ttl_secs.as_secs() as i64));
    let bytes = serde_json::to_vec(&bundle)?;
    self.kv.set(key, bytes, ttl_secs).await
  }
}

#[async_trait]
impl MemoryCache for RemoteCache {
  async fn get_category(&self, subject_key: &str, scope: &str, category: Category) -> Option<Vec<Memory>> {
    if let Some(memories) = self.l1.get_category(subject_key, scope, category).await {
      self.hits.fetch_add(1, Ordering::Relaxed);
      return Some(memories);
    }

    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    match self.fetch(&key).await {
      Some((memories, remaining_ttl)) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let filter = live_filter();
        let memories: Vec<Memory> = memories.into_iter().filter(|m| filter.matches(m, now)).collect();
        let ttl = self.l1_refill_ttl(remaining_ttl);
        self.l1.put_category_with_ttl(subject_key, scope, category, memories.clone(), ttl).await;
        Some(memories)
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  async fn put_category(&self, subject_key: &str, scope: &str, category: Category, memories: Vec<Memory>) {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    if let Err(e) = self.store(&key, &memories, self.ttl_for(Some(category))).await {
      debug!("remote cache store failed for {key}: {e}");
    }
    self.l1.put_category(subject_key, scope, category, memories).await;
  }

  async fn get_all(&self, subject_key: &str, scope: &str) -> Option<Vec<Memory>> {
    if let Some(memories) = self.l1.get_all(subject_key, scope).await {
      self.hits.fetch_add(1, Ordering::Relaxed);
      return Some(memories);
    }

    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    match self.fetch(&key).await {
      Some((memories, remaining_ttl)) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let filter = live_filter();
        let memories: Vec<Memory> = memories.into_iter().filter(|m| filter.matches(m, now)).collect();
        let ttl = self.l1_refill_ttl(remaining_ttl);
        self.l1.put_all_with_ttl(subject_key, scope, memories.clone(), ttl).await;
        Some(memories)
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  async fn put_all(&self, subject_key: &str, scope: &str, memories: Vec<Memory>) {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    if let Err(e) = self.store(&key, &memories, self.ttl_for(None)).await {
      debug!("remote cache store failed for {key}: {e}");
    }
    self.l1.put_all(subject_key, scope, memories).await;
  }

  async fn get_with_filter(&self, subject_key: &str, scope: &str, filter: &Filter) -> Option<Vec<Memory>> {
    let all = self.get_all(subject_key, scope).await?;
    let now = Utc::now();
    Some(all.into_iter().filter(|m| filter.matches_scoped(m, scope, now)).collect())
  }

  async fn invalidate_category(&self, subject_key: &str, scope: &str, category: Category) {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    let _ = self.kv.delete(&key).await;
    self.l1.invalidate_category(subject_key, scope, category).await;
  }

  async fn invalidate_all_slice(&self, subject_key: &str, scope: &str) {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    let _ = self.kv.delete(&key).await;
    self.l1.invalidate_all_slice(subject_key, scope).await;
  }

  async fn invalidate_user(&self, subject_key: &str) {
    for prefix in [CATEGORY_PREFIX, ALL_PREFIX] {
      let pattern = user_prefix(prefix, subject_key);
      match self.kv.scan(&pattern).await {
        Ok(keys) => {
          for key in keys {
            if let Err(e) = self.kv.delete(&key).await {
              debug!("remote cache purge failed for {key}: {e}");
            }
          }
        }
        Err(e) => debug!("remote cache scan failed for {pattern}: {e}"),
      }
    }
    self.l1.invalidate_user(subject_key).await;
  }

  async fn warmup(&self, subject_key: &str, scope: &str, by_category: Vec<(Category, Vec<Memory>)>) {
    let mut all = Vec::new();
    for (category, memories) in by_category {
      all.extend(memories.clone());
      self.put_category(subject_key, scope, category, memories).await;
    }
    self.put_all(subject_key, scope, all).await;
  }

  async fn stats(&self) -> CacheStats {
    let l1_stats = self.l1.stats().await;
    CacheStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      entries: l1_stats.entries,
    }
  }

  async fn close(&self) {
    self.l1.close().await;
  }
}
