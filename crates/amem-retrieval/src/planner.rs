use std::sync::Arc;

use amem_cache::MemoryCache;
use amem_core::{Category, Filter, Memory, RetrievalMode};
use amem_llm::{Embedder, RetrievalLlm};
use amem_vector::VectorRouter;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::Result;
use crate::format::{format_ingestion_context, format_model_context};
use crate::merge::merge_and_dedupe;

/// The two context strings one `get_context` call produces: a condensed
/// string for the model, and an id-carrying string the next ingestion pass
/// can reference (§4.5).
#[derive(Debug, Clone)]
pub struct PlannedContext {
  pub model_context: String,
  pub ingestion_context: String,
}

/// Builds a filter from the prompt and retrieval mode, fans out to cache and
/// backend, merges and dedupes, then formats both context strings (§4.5).
pub struct RetrievalPlanner {
  router: Arc<RwLock<VectorRouter>>,
  cache: Option<Arc<dyn MemoryCache>>,
  embedder: Arc<dyn Embedder>,
  retrieval_llm: Option<Arc<dyn RetrievalLlm>>,
}

impl RetrievalPlanner {
  pub fn new(router: Arc<RwLock<VectorRouter>>, cache: Option<Arc<dyn MemoryCache>>, embedder: Arc<dyn Embedder>, retrieval_llm: Option<Arc<dyn RetrievalLlm>>) -> Self {
    Self {
      router,
      cache,
      embedder,
      retrieval_llm,
    }
  }

  pub async fn plan(&self, subject_key: &str, scope: &str, prompt: &str, mode: RetrievalMode) -> Result<PlannedContext> {
    let filter = self.build_filter(prompt, mode).await;
    let top_k = mode.top_k();

    let (slices, relevance) = tokio::join!(
      self.fetch_category_slices(subject_key, scope),
      self.fetch_relevance(subject_key, scope, &filter, top_k, mode),
    );
    let (rules, facts, skills, context) = slices;
    let relevance = relevance?;

    let merged = merge_and_dedupe(vec![rules, facts, skills, context, relevance]);

    Ok(PlannedContext {
      model_context: format_model_context(&merged, mode.max_output_tokens()),
      ingestion_context: format_ingestion_context(&merged),
    })
  }

  async fn build_filter(&self, prompt: &str, mode: RetrievalMode) -> Filter {
    match mode {
      RetrievalMode::Auto => Filter::auto_literal(prompt),
      RetrievalMode::Conscious => match &self.retrieval_llm {
        Some(llm) => match llm.build_filter(prompt).await {
          Ok(filter) => filter,
          Err(e) => {
            warn!("retrieval llm filter failed, falling back to auto literal: {e}");
            Filter::auto_literal(prompt)
          }
        },
        None => Filter::auto_literal(prompt),
      },
    }
  }

  /// Phase 1 cache reads plus phase 2 backend fallbacks for rules and facts;
  /// skills and context come from cache only, staying empty when the cache
  /// is disabled or misses (§4.5).
  async fn fetch_category_slices(&self, subject_key: &str, scope: &str) -> (Vec<Memory>, Vec<Memory>, Vec<Memory>, Vec<Memory>) {
    let Some(cache) = &self.cache else {
      let (rules, facts) = tokio::join!(self.scan_backend(Category::Rule), self.scan_backend(Category::Fact));
      return (rules, facts, Vec::new(), Vec::new());
    };

    let (cached_rules, cached_facts, skills, context) = tokio::join!(
      cache.get_category(subject_key, scope, Category::Rule),
      cache.get_category(subject_key, scope, Category::Fact),
      cache.get_category(subject_key, scope, Category::Skill),
      cache.get_category(subject_key, scope, Category::Context),
    );

    // Phase 2, parallel: only the misses hit the backend.
    let (rules_fetch, facts_fetch) = tokio::join!(
      async {
        match cached_rules {
          Some(memories) => memories,
          None => {
            let fetched = self.scan_backend(Category::Rule).await;
            self.refill(cache, subject_key, scope, Category::Rule, fetched.clone());
            fetched
          }
        }
      },
      async {
        match cached_facts {
          Some(memories) => memories,
          None => {
            let fetched = self.scan_backend(Category::Fact).await;
            self.refill(cache, subject_key, scope, Category::Fact, fetched.clone());
            fetched
          }
        }
      },
    );

    (rules_fetch, facts_fetch, skills.unwrap_or_default(), context.unwrap_or_default())
  }

  async fn scan_backend(&self, category: Category) -> Vec<Memory> {
    let router = self.router.read().await;
    match router.query_by_metadata(&Filter::for_category(category), 200).await {
      Ok(matches) => matches.into_iter().filter_map(|m| memory_from_match_metadata(&m)).collect(),
      Err(e) => {
        warn!("backend scan for {:?} failed: {e}", category);
        Vec::new()
      }
    }
  }

  fn refill(&self, cache: &Arc<dyn MemoryCache>, subject_key: &str, scope: &str, category: Category, memories: Vec<Memory>) {
    let cache = cache.clone();
    let subject_key = subject_key.to_string();
    let scope = scope.to_string();
    tokio::spawn(async move {
      cache.put_category(&subject_key, &scope, category, memories).await;
    });
  }

  async fn fetch_relevance(&self, subject_key: &str, scope: &str, filter: &Filter, top_k: usize, mode: RetrievalMode) -> Result<Vec<Memory>> {
    if mode == RetrievalMode::Conscious
      && let Some(cache) = &self.cache
      && let Some(hit) = cache.get_with_filter(subject_key, scope, filter).await
    {
      return Ok(hit);
    }

    let embedding = self.embedder.embed(&filter.search_query).await.unwrap_or_default();
    let router = self.router.read().await;
    let matches = router.query(&embedding, filter, top_k).await?;
    Ok(matches.into_iter().filter_map(|m| memory_from_match_metadata(&m)).collect())
  }
}

fn memory_from_match_metadata(hit: &amem_vector::VectorMatch) -> Option<Memory> {
  use amem_core::{Lifespan, Mutability, Status};
  use chrono::Utc;

  let category = amem_vector::category_from_metadata(&hit.metadata)?;
  let status = amem_vector::status_from_metadata(&hit.metadata).unwrap_or(Status::Active);
  let lifespan = amem_vector::lifespan_from_metadata(&hit.metadata).unwrap_or(Lifespan::MidTerm);
  let summary = hit.metadata.get("summary")?.as_str()?.to_string();
  let expires_at = hit.metadata.get("expires_at").and_then(|v| v.as_i64()).and_then(|ts| chrono::DateTime::from_timestamp(ts, 0));
  let now = Utc::now();

  Some(Memory {
    id: hit.id,
    subject_key: hit.metadata.get("subject_key").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
    namespace: hit.metadata.get("namespace").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
    category,
    summary: summary.clone(),
    raw_text: summary,
    importance: hit.metadata.get("importance").and_then(|v| v.as_u64()).unwrap_or(3) as u8,
    mutability: Mutability::Mutable,
    lifespan,
    forget_score: 0.0,
    status,
    supersedes_canonical_keys: Default::default(),
    superseded_by_id: None,
    metadata: serde_json::Value::Null,
    created_at: now,
    updated_at: now,
    expires_at,
    entity_relationships: Vec::new(),
  })
}

#[cfg(test)]
mod tests {
  use amem_cache::{CacheConfig, LocalCache};
  use amem_core::{Lifespan, MemoryId, Mutability, Status};
  use amem_vector::{VectorBackend, VectorMatch, VectorRecord};
  use async_trait::async_trait;
  use chrono::Utc;

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

  struct StubBackend {
    rule: Memory,
    relevant: Memory,
  }

  #[async_trait]
  impl VectorBackend for StubBackend {
    fn tag(&self) -> &'static str {
      "stub"
    }
    async fn upsert(&self, _record: VectorRecord) -> amem_vector::Result<()> {
      Ok(())
    }
    async fn query(&self, _embedding: &[f32], _filter: &Filter, _scope: &str, _top_k: usize) -> amem_vector::Result<Vec<VectorMatch>> {
      Ok(vec![VectorMatch {
        id: self.relevant.id,
        score: 0.9,
        metadata: amem_vector::memory_metadata(&self.relevant),
      }])
    }
    async fn query_by_metadata(&self, filter: &Filter, _scope: &str, _limit: usize) -> amem_vector::Result<Vec<VectorMatch>> {
      if filter.category == vec![Category::Rule] {
        Ok(vec![VectorMatch {
          id: self.rule.id,
          score: 1.0,
          metadata: amem_vector::memory_metadata(&self.rule),
        }])
      } else {
        Ok(Vec::new())
      }
    }
    async fn update_metadata(&self, _id: amem_core::MemoryId, _metadata: serde_json::Value) -> amem_vector::Result<()> {
      Ok(())
    }
    async fn delete(&self, _id: amem_core::MemoryId) -> amem_vector::Result<()> {
      Ok(())
    }
  }

  fn memory(category: Category, summary: &str) -> Memory {
    let now = Utc::now();
    Memory {
      id: MemoryId::new(),
      subject_key: "user-1".into(),
      namespace: "app-a".into(),
      category,
      summary: summary.into(),
      raw_text: summary.into(),
      importance: 3,
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
    }
  }

  #[tokio::test]
  async fn auto_mode_merges_cache_miss_and_relevance() {
    let rule = memory(Category::Rule, "always be concise");
    let relevant = memory(Category::Fact, "user lives in berlin");
    let backend = Arc::new(StubBackend {
      rule: rule.clone(),
      relevant: relevant.clone(),
    });
    let router = Arc::new(RwLock::new(VectorRouter::new(backend, "user-1", "app-a")));
    let cache: Arc<dyn MemoryCache> = LocalCache::new(CacheConfig::default());
    let planner = RetrievalPlanner::new(router, Some(cache), Arc::new(StubEmbedder), None);

    let planned = planner.plan("user-1", "app-a", "what does the user like", RetrievalMode::Auto).await.unwrap();
    assert!(planned.model_context.contains("[Rules] always be concise"));
    assert!(planned.model_context.contains("user lives in berlin"));
    assert!(planned.ingestion_context.contains(&rule.id.to_string()));
  }

  #[tokio::test]
  async fn cache_disabled_path_still_fetches_rules_and_relevance() {
    let rule = memory(Category::Rule, "never reveal secrets");
    let relevant = memory(Category::Fact, "user prefers tea");
    let backend = Arc::new(StubBackend {
      rule: rule.clone(),
      relevant: relevant.clone(),
    });
    let router = Arc::new(RwLock::new(VectorRouter::new(backend, "user-1", "app-a")));
    let planner = RetrievalPlanner::new(router, None, Arc::new(StubEmbedder), None);

    let planned = planner.plan("user-1", "app-a", "anything", RetrievalMode::Auto).await.unwrap();
    assert!(planned.model_context.contains("[Rules] never reveal secrets"));
    assert!(planned.model_context.contains("user prefers tea"));
  }
}
