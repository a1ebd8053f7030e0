use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use amem_core::{Category, CacheConfig, CachedBundle, Filter, Memory, Status};
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::contract::{CacheStats, MemoryCache};
use crate::key::{ALL_PREFIX, CATEGORY_PREFIX, build_key};

const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Process-local cache: an `RwLock`-guarded map of cache keys to TTL'd
/// memory bundles, swept for expired entries every 60s by a detached
/// background task.
pub struct LocalCache {
  store: RwLock<HashMap<String, CachedBundle>>,
  config: CacheConfig,
  hits: AtomicU64,
  misses: AtomicU64,
  shutdown_tx: broadcast::Sender<()>,
  sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl LocalCache {
  pub fn new(config: CacheConfig) -> Arc<Self> {
    let (shutdown_tx, _) = broadcast::channel(1);
    let cache = Arc::new(Self {
      store: RwLock::new(HashMap::new()),
      config,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
      shutdown_tx,
      sweeper: StdMutex::new(None),
    });
    cache.clone().spawn_sweeper();
    cache
  }

  fn ttl_for(&self, category: Option<Category>) -> chrono::Duration {
    let secs = match category {
      Some(Category::Rule) => self.config.rules_ttl,
      Some(Category::Fact) => self.config.facts_ttl,
      Some(Category::Skill) => self.config.skills_ttl,
      Some(Category::Context) => self.config.context_ttl,
      _ => self.config.all_memories_ttl,
    }
    .as_secs();
    chrono::Duration::seconds(secs as i64)
  }

  fn spawn_sweeper(self: Arc<Self>) {
    let mut shutdown_rx = self.shutdown_tx.subscribe();
    let cache = self.clone();
    let handle = tokio::spawn(async move {
      let mut timer = interval(SWEEP_INTERVAL);
      timer.tick().await;
      loop {
        tokio::select! {
          _ = timer.tick() => {
            cache.sweep().await;
          }
          _ = shutdown_rx.recv() => {
            debug!("local cache sweeper received shutdown signal");
            break;
          }
        }
      }
    });
    *self.sweeper.lock().expect("sweeper mutex poisoned") = Some(handle);
  }

  /// Every cache hit re-filters with `status = active` and `expires_at`
  /// absent-or-future (§4.3): a bundle can outlive one of its own memories.
  fn live_filter() -> Filter {
    Filter {
      status: Some(Status::Active),
      ..Default::default()
    }
  }

  /// Inserts a category slice with an explicit TTL rather than the one
  /// `ttl_for` derives from `self.config`. Used by `RemoteCache` to refill L1
  /// with the lesser of the remote entry's remaining TTL and the configured
  /// local max age (§4.3).
  pub async fn put_category_with_ttl(&self, subject_key: &str, scope: &str, category: Category, memories: Vec<Memory>, ttl: chrono::Duration) {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    self.store.write().await.insert(key, CachedBundle::new(memories, ttl));
  }

  /// As `put_category_with_ttl`, for the "all memories" slice.
  pub async fn put_all_with_ttl(&self, subject_key: &str, scope: &str, memories: Vec<Memory>, ttl: chrono::Duration) {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    self.store.write().await.insert(key, CachedBundle::new(memories, ttl));
  }

  async fn sweep(&self) {
    let now = Utc::now();
    let mut store = self.store.write().await;
    let before = store.len();
    store.retain(|_, bundle| !bundle.is_expired(now));
    let swept = before - store.len();
    if swept > 0 {
      info!("local cache swept {} expired entries", swept);
    }
  }
}

#[async_trait::async_trait]
impl MemoryCache for LocalCache {
  async fn get_category(&self, subject_key: &str, scope: &str, category: Category) -> Option<Vec<Memory>> {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    let store = self.store.read().await;
    let now = Utc::now();
    match store.get(&key).filter(|bundle| !bundle.is_expired(now)) {
      Some(bundle) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let filter = Self::live_filter();
        Some(bundle.memories.iter().filter(|m| filter.matches(m, now)).cloned().collect())
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  async fn put_category(&self, subject_key: &str, scope: &str, category: Category, memories: Vec<Memory>) {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    let ttl = self.ttl_for(Some(category));
    self.store.write().await.insert(key, CachedBundle::new(memories, ttl));
  }

  async fn get_all(&self, subject_key: &str, scope: &str) -> Option<Vec<Memory>> {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    let store = self.store.read().await;
    let now = Utc::now();
    match store.get(&key).filter(|bundle| !bundle.is_expired(now)) {
      Some(bundle) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let filter = Self::live_filter();
        Some(bundle.memories.iter().filter(|m| filter.matches(m, now)).cloned().collect())
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  async fn put_all(&self, subject_key: &str, scope: &str, memories: Vec<Memory>) {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    let ttl = self.ttl_for(None);
    self.store.write().await.insert(key, CachedBundle::new(memories, ttl));
  }

  async fn get_with_filter(&self, subject_key: &str, scope: &str, filter: &Filter) -> Option<Vec<Memory>> {
    let all = self.get_all(subject_key, scope).await?;
    let now = Utc::now();
    Some(all.into_iter().filter(|m| filter.matches_scoped(m, scope, now)).collect())
  }

  async fn invalidate_category(&self, subject_key: &str, scope: &str, category: Category) {
    let key = build_key(CATEGORY_PREFIX, subject_key, scope, Some(category));
    self.store.write().await.remove(&key);
  }

  async fn invalidate_all_slice(&self, subject_key: &str, scope: &str) {
    let key = build_key(ALL_PREFIX, subject_key, scope, None);
    self.store.write().await.remove(&key);
  }

  async fn invalidate_user(&self, subject_key: &str) {
    let mut store = self.store.write().await;
    store.retain(|key, _| key.split(':').nth(1) != Some(subject_key));
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
    CacheStats {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      entries: self.store.read().await.len(),
    }
  }

  async fn close(&self) {
    let _ = self.shutdown_tx.send(());
  }
}
