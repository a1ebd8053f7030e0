use std::sync::Arc;
use std::sync::RwLock as StdRwLock;

use amem_cache::{CacheStats, LocalCache, MemoryCache, RemoteCache, RemoteKv};
use amem_core::{Category, CacheConfig, MemoryConfig, RetrievalMode};
use amem_ingest::IngestionPipeline;
use amem_llm::{DraftCandidate, Embedder, ExtractionLlm, RetrievalLlm};
use amem_retrieval::RetrievalPlanner;
use amem_vector::{VectorBackend, VectorRouter};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::messages::{ChatMessage, last_exchange};

/// Binds the router, cache, planner, and ingestion pipeline to one
/// `(subject_key, scope)` session (§4.6).
pub struct MemoryCore {
  router: Arc<AsyncRwLock<VectorRouter>>,
  cache: Arc<AsyncRwLock<Option<Arc<dyn MemoryCache>>>>,
  embedder: Arc<dyn Embedder>,
  extraction_llm: Option<Arc<dyn ExtractionLlm>>,
  retrieval_llm: Option<Arc<dyn RetrievalLlm>>,
  retrieval_mode: StdRwLock<RetrievalMode>,
  similarity_threshold: f32,
  messages: AsyncMutex<Vec<ChatMessage>>,
  ingestion_context: AsyncMutex<String>,
}

impl MemoryCore {
  pub fn new(initial_backend: Arc<dyn VectorBackend>, embedder: Arc<dyn Embedder>, subject_key: impl Into<String>, scope: impl Into<String>, config: &MemoryConfig) -> Self {
    let router = Arc::new(AsyncRwLock::new(VectorRouter::new(initial_backend, subject_key, scope)));
    let cache: Option<Arc<dyn MemoryCache>> = if config.default_cache.enabled {
      Some(LocalCache::new(config.default_cache.clone()))
    } else {
      None
    };

    Self {
      router,
      cache: Arc::new(AsyncRwLock::new(cache)),
      embedder,
      extraction_llm: None,
      retrieval_llm: None,
      retrieval_mode: StdRwLock::new(config.default_retrieval_mode),
      similarity_threshold: config.similarity_threshold,
      messages: AsyncMutex::new(Vec::new()),
      ingestion_context: AsyncMutex::new(String::new()),
    }
  }

  pub fn with_extraction_llm(mut self, llm: Arc<dyn ExtractionLlm>) -> Self {
    self.extraction_llm = Some(llm);
    self
  }

  pub fn with_retrieval_llm(mut self, llm: Arc<dyn RetrievalLlm>) -> Self {
    self.retrieval_llm = Some(llm);
    self
  }

  /// Registers an additional backend reachable by `switch_backend`, without
  /// changing which one is active.
  pub async fn register_backend(&self, backend: Arc<dyn VectorBackend>) {
    self.router.write().await.register(backend);
  }

  pub async fn get_context(&self, prompt: &str) -> Result<String> {
    let cache = self.cache.read().await.clone();
    let mode = *self.retrieval_mode.read().expect("retrieval mode lock poisoned");
    let planner = RetrievalPlanner::new(self.router.clone(), cache, self.embedder.clone(), self.retrieval_llm.clone());

    let (subject_key, scope) = {
      let router = self.router.read().await;
      (router.subject_key().to_string(), router.scope().to_string())
    };

    let planned = planner.plan(&subject_key, &scope, prompt, mode).await?;
    *self.ingestion_context.lock().await = planned.ingestion_context;
    Ok(planned.model_context)
  }

  /// Replaces the tracked message list; if it ends in a `(user, assistant)`
  /// pair, launches a detached ingestion task (§4.6).
  pub async fn update_history(&self, new_messages: Vec<ChatMessage>) {
    let exchange = last_exchange(&new_messages).map(|(u, a)| (u.to_string(), a.to_string()));
    *self.messages.lock().await = new_messages;

    let Some((user_msg, assistant_msg)) = exchange else {
      return;
    };

    if self.ingestion_context.lock().await.is_empty() {
      if let Err(e) = self.get_context(&user_msg).await {
        warn!("failed to seed ingestion context before ingestion: {e}");
      }
    }

    let Some(extraction_llm) = self.extraction_llm.clone() else {
      return;
    };

    let router = self.router.clone();
    let cache = self.cache.read().await.clone();
    let embedder = self.embedder.clone();
    let similarity_threshold = self.similarity_threshold;
    let ingestion_context = self.ingestion_context.lock().await.clone();

    let (subject_key, scope) = {
      let router = self.router.read().await;
      (router.subject_key().to_string(), router.scope().to_string())
    };

    tokio::spawn(async move {
      let Some(cache) = cache else {
        warn!("ingestion skipped: no cache configured to invalidate");
        return;
      };
      let pipeline = IngestionPipeline::new(router, cache, embedder, similarity_threshold);
      let conversation_text = format!("{ingestion_context}\n\nUser: {user_msg}\nAssistant: {assistant_msg}");

      let drafts: Vec<DraftCandidate> = match extraction_llm.extract_drafts(&conversation_text).await {
        Ok(drafts) => drafts,
        Err(e) => {
          error!("extraction failed, conversation yields zero memories: {e}");
          return;
        }
      };

      let report = pipeline.ingest(&subject_key, &scope, drafts).await;
      info!(
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        rejected = report.rejected.len(),
        "background ingestion complete"
      );
    });
  }

  pub async fn rebind_user(&self, subject_key: impl Into<String>) {
    self.router.write().await.rebind_user(subject_key);
    *self.ingestion_context.lock().await = String::new();
  }

  pub async fn rebind_scope(&self, scope: impl Into<String>) {
    self.router.write().await.rebind_scope(scope);
    *self.ingestion_context.lock().await = String::new();
  }

  pub async fn enable_cache(&self, config: CacheConfig) {
    let cache: Arc<dyn MemoryCache> = LocalCache::new(config);
    *self.cache.write().await = Some(cache);
  }

  pub async fn enable_remote_cache(&self, kv: Arc<dyn RemoteKv>, config: CacheConfig) {
    let cache: Arc<dyn MemoryCache> = Arc::new(RemoteCache::new(kv, config));
    *self.cache.write().await = Some(cache);
  }

  pub async fn disable_cache(&self) {
    let mut guard = self.cache.write().await;
    if let Some(cache) = guard.take() {
      cache.close().await;
    }
  }

  /// Pre-populates every cache tier from the backend for the bound session.
  pub async fn warmup_cache(&self) -> Result<()> {
    let guard = self.cache.read().await;
    let Some(cache) = guard.as_ref() else {
      return Ok(());
    };

    let router = self.router.read().await;
    let subject_key = router.subject_key().to_string();
    let scope = router.scope().to_string();

    let mut by_category = Vec::new();
    for category in Category::ALL.into_iter().filter(Category::is_cache_tier) {
      let filter = amem_core::Filter::for_category(category);
      let matches = router.query_by_metadata(&filter, 200).await?;
      let memories = matches.iter().filter_map(crate::reconstruct::memory_from_match).collect();
      by_category.push((category, memories));
    }

    cache.warmup(&subject_key, &scope, by_category).await;
    Ok(())
  }

  pub async fn invalidate_cache(&self) {
    let guard = self.cache.read().await;
    if let Some(cache) = guard.as_ref() {
      let subject_key = self.router.read().await.subject_key().to_string();
      cache.invalidate_user(&subject_key).await;
    }
  }

  pub async fn cache_stats(&self) -> CacheStats {
    let guard = self.cache.read().await;
    match guard.as_ref() {
      Some(cache) => cache.stats().await,
      None => CacheStats::default(),
    }
  }

  pub fn use_retrieval_mode(&self, mode: RetrievalMode) {
    *self.retrieval_mode.write().expect("retrieval mode lock poisoned") = mode;
  }

  pub async fn switch_backend(&self, tag: &str) -> Result<()> {
    self.router.write().await.switch_service(tag)?;
    Ok(())
  }

  /// Tears down the cache sweeper. Terminal: the session should not be used afterward.
  pub async fn close(&self) {
    let mut guard = self.cache.write().await;
    if let Some(cache) = guard.take() {
      cache.close().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use amem_core::{Filter, MemoryId};
  use amem_vector::{VectorMatch, VectorRecord};
  use async_trait::async_trait;

  use super::*;

  struct StubEmbedder;

  #[async_trait]
  impl Embedder for StubEmbedder {
    fn model_id(&self) -> &str {
      "stub"
    }
    fn dimensions(&self) -> usize {
      4
    }
    async fn embed(&self, _text: &str) -> amem_llm::Result<Vec<f32>> {
      Ok(vec![0.0; 4])
    }
    async fn embed_batch(&self, texts: &[&str]) -> amem_llm::Result<Vec<Vec<f32>>> {
      Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }
  }

  struct StubBackend;

  #[async_trait]
  impl VectorBackend for StubBackend {
    fn tag(&self) -> &'static str {
      "stub"
    }
    async fn upsert(&self, _record: VectorRecord) -> amem_vector::Result<()> {
      Ok(())
    }
    async fn query(&self, _embedding: &[f32], _filter: &Filter, _scope: &str, _top_k: usize) -> amem_vector::Result<Vec<VectorMatch>> {
      Ok(Vec::new())
    }
    async fn query_by_metadata(&self, _filter: &Filter, _scope: &str, _limit: usize) -> amem_vector::Result<Vec<VectorMatch>> {
      Ok(Vec::new())
    }
    async fn update_metadata(&self, _id: MemoryId, _metadata: serde_json::Value) -> amem_vector::Result<()> {
      Ok(())
    }
    async fn delete(&self, _id: MemoryId) -> amem_vector::Result<()> {
      Ok(())
    }
  }

  fn facade() -> MemoryCore {
    MemoryCore::new(Arc::new(StubBackend), Arc::new(StubEmbedder), "user-1", "app-a", &MemoryConfig::standard())
  }

  #[tokio::test]
  async fn get_context_on_empty_backend_returns_empty_string() {
    let core = facade();
    let context = core.get_context("what does the user like").await.unwrap();
    assert!(context.is_empty());
  }

  #[tokio::test]
  async fn rebind_user_resets_ingestion_context() {
    let core = facade();
    core.get_context("anything").await.unwrap();
    core.rebind_user("user-2").await;
    assert!(core.ingestion_context.lock().await.is_empty());
  }

  #[tokio::test]
  async fn disable_then_enable_cache_round_trips() {
    let core = facade();
    core.disable_cache().await;
    assert_eq!(core.cache_stats().await, CacheStats::default());
    core.enable_cache(CacheConfig::default()).await;
    core.get_context("anything").await.unwrap();
    let stats = core.cache_stats().await;
    assert!(stats.misses > 0);
  }

  #[tokio::test]
  async fn switch_backend_to_unregistered_tag_fails() {
    let core = facade();
    assert!(core.switch_backend("pinecone").await.is_err());
  }
}
