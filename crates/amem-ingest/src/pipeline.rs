use std::collections::HashSet;
use std::sync::Arc;

use amem_cache::MemoryCache;
use amem_core::{Category, Filter, Memory, MemoryId, Mutability, Status};
use amem_llm::{DraftCandidate, DraftOperation, Embedder};
use amem_vector::{VectorMatch, VectorRecord, VectorRouter, category_from_metadata, status_from_metadata};
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::draft::MemoryDraft;
use crate::error::{IngestError, Result};
use crate::expiry::compute_expiry;
use crate::similarity::resolve_match;

const CANDIDATE_SCAN_LIMIT: usize = 200;

/// What an ingestion run did, per-draft outcomes bucketed by effect.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
  pub created: Vec<MemoryId>,
  pub updated: Vec<MemoryId>,
  pub superseded: Vec<MemoryId>,
  pub deleted: Vec<MemoryId>,
  pub rejected: Vec<String>,
}

/// Turns extracted drafts into backend writes and cache invalidation
/// (§4.4): embed, resolve id-less update/delete targets by similarity,
/// apply supersession, recompute expiry, then invalidate the affected
/// cache slices.
pub struct IngestionPipeline {
  router: Arc<RwLock<VectorRouter>>,
  cache: Arc<dyn MemoryCache>,
  embedder: Arc<dyn Embedder>,
  similarity_threshold: f32,
}

impl IngestionPipeline {
  pub fn new(
    router: Arc<RwLock<VectorRouter>>,
    cache: Arc<dyn MemoryCache>,
    embedder: Arc<dyn Embedder>,
    similarity_threshold: f32,
  ) -> Self {
    Self {
      router,
      cache,
      embedder,
      similarity_threshold,
    }
  }

  pub async fn ingest(&self, subject_key: &str, scope: &str, drafts: Vec<DraftCandidate>) -> IngestReport {
    let mut report = IngestReport::default();
    let mut touched: HashSet<Category> = HashSet::new();
    let mut pending_upserts: Vec<VectorRecord> = Vec::new();
    let mut pending_deletes: Vec<MemoryId> = Vec::new();
    let mut pending_supersessions: Vec<(MemoryId, MemoryId)> = Vec::new();
    let mut refill: Vec<Memory> = Vec::new();

    for candidate in drafts {
      let draft = match MemoryDraft::from_candidate(candidate) {
        Ok(draft) => draft,
        Err(e) => {
          report.rejected.push(e.to_string());
          continue;
        }
      };
      let explicit_supersession = draft.supersedes_memory_id;

      match draft.operation {
        DraftOperation::Create => match self.build_create(subject_key, scope, &draft).await {
          Ok((memory, record)) => {
            touched.insert(memory.category);
            report.created.push(memory.id);
            if let Some(old_id) = explicit_supersession {
              pending_supersessions.push((old_id, memory.id));
            }
            refill.push(memory);
            pending_upserts.push(record);
          }
          Err(e) => {
            warn!("draft rejected: {}", e);
            report.rejected.push(e.to_string());
          }
        },
        DraftOperation::Update => match self.build_update(subject_key, scope, &draft).await {
          Ok((memory, old_id, record)) => {
            touched.insert(memory.category);
            report.updated.push(memory.id);
            report.superseded.push(old_id);
            pending_supersessions.push((old_id, memory.id));
            if let Some(explicit_old_id) = explicit_supersession {
              if explicit_old_id != old_id {
                pending_supersessions.push((explicit_old_id, memory.id));
              }
            }
            refill.push(memory);
            pending_upserts.push(record);
          }
          Err(e) => {
            warn!("draft rejected: {}", e);
            report.rejected.push(e.to_string());
          }
        },
        DraftOperation::Delete => match self.resolve_delete_target(subject_key, scope, &draft).await {
          Ok((id, category)) => {
            touched.insert(category);
            report.deleted.push(id);
            pending_deletes.push(id);
          }
          Err(e) => {
            warn!("draft rejected: {}", e);
            report.rejected.push(e.to_string());
          }
        },
      }
    }

    // Execute all supersessions.
    if !pending_supersessions.is_empty() {
      let router = self.router.read().await;
      for (old_id, new_id) in &pending_supersessions {
        if let Err(e) = apply_supersession(&router, *old_id, *new_id).await {
          warn!("failed to mark {old_id} superseded by {new_id}: {e}");
        }
      }
    }

    // Flush the upsert batch as one backend call.
    if !pending_upserts.is_empty() {
      let router = self.router.read().await;
      if let Err(e) = router.upsert_batch(pending_upserts).await {
        warn!("upsert batch failed: {e}");
      }
    }

    // Flush the delete batch as one backend call.
    if !pending_deletes.is_empty() {
      let router = self.router.read().await;
      if let Err(e) = router.delete_batch(pending_deletes).await {
        warn!("delete batch failed: {e}");
      }
    }

    for category in &touched {
      self.cache.invalidate_category(subject_key, scope, *category).await;
    }
    if !touched.is_empty() {
      self.cache.invalidate_all_slice(subject_key, scope).await;
    }

    // Re-cache the newly created/updated memories in their category slices
    // and in the "all" slice.
    if !refill.is_empty() {
      for category in &touched {
        let slice: Vec<Memory> = refill.iter().filter(|m| m.category == *category).cloned().collect();
        if !slice.is_empty() {
          self.cache.put_category(subject_key, scope, *category, slice).await;
        }
      }
      self.cache.put_all(subject_key, scope, refill.clone()).await;
    }

    info!(
      created = report.created.len(),
      updated = report.updated.len(),
      deleted = report.deleted.len(),
      rejected = report.rejected.len(),
      "ingestion run complete"
    );

    report
  }

  async fn build_create(&self, subject_key: &str, scope: &str, draft: &MemoryDraft) -> Result<(Memory, VectorRecord)> {
    let embedding = self.embedder.embed(&draft.summary).await?;
    let now = Utc::now();
    let memory = Memory {
      id: MemoryId::new(),
      subject_key: subject_key.to_string(),
      namespace: scope.to_string(),
      category: draft.category,
      summary: draft.summary.clone(),
      raw_text: draft.raw_text.clone(),
      importance: draft.importance,
      mutability: draft.mutability,
      lifespan: draft.lifespan,
      forget_score: draft.forget_score,
      status: draft.status.unwrap_or(Status::Active),
      supersedes_canonical_keys: draft.supersedes_canonical_keys.clone(),
      superseded_by_id: None,
      metadata: draft.metadata.clone(),
      created_at: now,
      updated_at: now,
      expires_at: compute_expiry(draft.lifespan, draft.forget_score, now),
      entity_relationships: Vec::new(),
    };
    let record = VectorRecord::from_memory(&memory, embedding);
    Ok((memory, record))
  }

  async fn build_update(&self, subject_key: &str, scope: &str, draft: &MemoryDraft) -> Result<(Memory, MemoryId, VectorRecord)> {
    let candidates = self.scan_candidates(subject_key, scope, draft.category).await?;
    let target = self.resolve_target(draft, &candidates)?;
    let old_id = target.id;

    let embedding = self.embedder.embed(&draft.summary).await?;
    let now = Utc::now();
    let mut supersedes = target.supersedes_canonical_keys.clone();
    supersedes.insert(target.normalized_summary());
    supersedes.extend(draft.supersedes_canonical_keys.iter().cloned());

    let new_memory = Memory {
      id: MemoryId::new(),
      subject_key: subject_key.to_string(),
      namespace: scope.to_string(),
      category: draft.category,
      summary: draft.summary.clone(),
      raw_text: draft.raw_text.clone(),
      importance: draft.importance,
      mutability: draft.mutability,
      lifespan: draft.lifespan,
      forget_score: draft.forget_score,
      status: draft.status.unwrap_or(Status::Active),
      supersedes_canonical_keys: supersedes,
      superseded_by_id: None,
      metadata: draft.metadata.clone(),
      created_at: now,
      updated_at: now,
      expires_at: compute_expiry(draft.lifespan, draft.forget_score, now),
      entity_relationships: Vec::new(),
    };
    let record = VectorRecord::from_memory(&new_memory, embedding);
    Ok((new_memory, old_id, record))
  }

  async fn resolve_delete_target(&self, subject_key: &str, scope: &str, draft: &MemoryDraft) -> Result<(MemoryId, Category)> {
    let candidates = self.scan_candidates(subject_key, scope, draft.category).await?;
    let target = self.resolve_target(draft, &candidates)?;
    Ok((target.id, target.category))
  }

  fn resolve_target<'a>(&self, draft: &MemoryDraft, candidates: &'a [Memory]) -> Result<&'a Memory> {
    if let Some(id) = draft.id {
      return candidates
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| IngestError::TargetNotFound(id.to_string()));
    }
    resolve_match(&draft.summary, candidates, self.similarity_threshold)
      .ok_or_else(|| IngestError::TargetNotFound(draft.summary.clone()))
  }

  async fn scan_candidates(&self, subject_key: &str, scope: &str, category: Category) -> Result<Vec<Memory>> {
    let router = self.router.read().await;
    let filter = Filter::for_category(category);
    let matches = router.query_by_metadata(&filter, CANDIDATE_SCAN_LIMIT).await?;
    Ok(
      matches
        .iter()
        .filter_map(|m| reconstruct_candidate(m, subject_key, scope))
        .collect(),
    )
  }
}

/// Rebuilds a minimal `Memory` from a vector backend's stored metadata, good
/// enough for similarity resolution and status/id bookkeeping. Fields the
/// backend doesn't echo back (raw_text, forget_score, relationships) are
/// filled with neutral defaults since they don't influence matching.
fn reconstruct_candidate(hit: &VectorMatch, subject_key: &str, scope: &str) -> Option<Memory> {
  let category = category_from_metadata(&hit.metadata)?;
  let status = status_from_metadata(&hit.metadata).unwrap_or(Status::Active);
  let summary = hit.metadata.get("summary")?.as_str()?.to_string();
  let now = Utc::now();
  Some(Memory {
    id: hit.id,
    subject_key: subject_key.to_string(),
    namespace: scope.to_string(),
    category,
    summary: summary.clone(),
    raw_text: summary,
    importance: hit.metadata.get("importance").and_then(|v| v.as_u64()).unwrap_or(3) as u8,
    mutability: Mutability::Mutable,
    lifespan: amem_vector::lifespan_from_metadata(&hit.metadata).unwrap_or(amem_core::Lifespan::MidTerm),
    forget_score: 0.0,
    status,
    supersedes_canonical_keys: Default::default(),
    superseded_by_id: None,
    metadata: hit.metadata.get("metadata").cloned().unwrap_or(serde_json::Value::Null),
    created_at: now,
    updated_at: now,
    expires_at: None,
    entity_relationships: Vec::new(),
  })
}

/// Patches a superseded memory's status in place; §4.4's deferred
/// "execute all supersessions" step. Backends merge metadata fields rather
/// than replacing them, so only the changed fields need to be sent.
async fn apply_supersession(router: &VectorRouter, old_id: MemoryId, new_id: MemoryId) -> Result<()> {
  let metadata = json!({
    "status": Status::Superseded.as_str(),
    "superseded_by_id": new_id.to_string(),
  });
  router.update_metadata(old_id, metadata).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use amem_cache::LocalCache;
  use amem_core::CacheConfig;
  use amem_vector::VectorBackend;
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

  struct StubBackend {
    upserts: std::sync::Mutex<Vec<MemoryId>>,
    upsert_batch_calls: std::sync::Mutex<usize>,
    deletes: std::sync::Mutex<Vec<MemoryId>>,
  }

  impl StubBackend {
    fn new() -> Self {
      Self {
        upserts: std::sync::Mutex::new(Vec::new()),
        upsert_batch_calls: std::sync::Mutex::new(0),
        deletes: std::sync::Mutex::new(Vec::new()),
      }
    }
  }

  #[async_trait]
  impl VectorBackend for StubBackend {
    fn tag(&self) -> &'static str {
      "stub"
    }
    async fn upsert(&self, record: amem_vector::VectorRecord) -> amem_vector::Result<()> {
      self.upserts.lock().unwrap().push(record.id);
      Ok(())
    }
    async fn upsert_batch(&self, records: Vec<amem_vector::VectorRecord>) -> amem_vector::Result<()> {
      *self.upsert_batch_calls.lock().unwrap() += 1;
      self.upserts.lock().unwrap().extend(records.iter().map(|r| r.id));
      Ok(())
    }
    async fn query(
      &self,
      _embedding: &[f32],
      _filter: &Filter,
      _scope: &str,
      _top_k: usize,
    ) -> amem_vector::Result<Vec<VectorMatch>> {
      Ok(Vec::new())
    }
    async fn query_by_metadata(&self, _filter: &Filter, _scope: &str, _limit: usize) -> amem_vector::Result<Vec<VectorMatch>> {
      Ok(
        self
          .upserts
          .lock()
          .unwrap()
          .iter()
          .map(|id| VectorMatch {
            id: *id,
            score: 1.0,
            metadata: serde_json::json!({
              "category": "fact",
              "status": "active",
              "summary": "user likes tea",
            }),
          })
          .collect(),
      )
    }
    async fn update_metadata(&self, _id: MemoryId, _metadata: serde_json::Value) -> amem_vector::Result<()> {
      Ok(())
    }
    async fn delete(&self, id: MemoryId) -> amem_vector::Result<()> {
      self.deletes.lock().unwrap().push(id);
      Ok(())
    }
  }

  fn pipeline() -> IngestionPipeline {
    let backend = Arc::new(StubBackend::new());
    let router = Arc::new(RwLock::new(VectorRouter::new(backend, "user-1", "app-a")));
    let cache: Arc<dyn MemoryCache> = LocalCache::new(CacheConfig::default());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder);
    IngestionPipeline::new(router, cache, embedder, 0.6)
  }

  fn create_candidate(summary: &str) -> DraftCandidate {
    DraftCandidate {
      operation: DraftOperation::Create,
      id: None,
      category: "fact".into(),
      summary: summary.into(),
      raw_text: String::new(),
      importance: 3,
      lifespan: "long_term".into(),
      forget_score: 0.0,
      mutability: "mutable".into(),
      status: None,
      supersedes_canonical_keys: Vec::new(),
      metadata: serde_json::Value::Null,
      supersedes_memory_id: None,
    }
  }

  #[tokio::test]
  async fn create_draft_produces_a_new_memory() {
    let pipeline = pipeline();
    let report = pipeline.ingest("user-1", "app-a", vec![create_candidate("user likes tea")]).await;
    assert_eq!(report.created.len(), 1);
    assert!(report.rejected.is_empty());
  }

  #[tokio::test]
  async fn create_flushes_through_a_single_upsert_batch_call() {
    let backend = Arc::new(StubBackend::new());
    let router = Arc::new(RwLock::new(VectorRouter::new(backend.clone(), "user-1", "app-a")));
    let cache: Arc<dyn MemoryCache> = LocalCache::new(CacheConfig::default());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder);
    let pipeline = IngestionPipeline::new(router, cache, embedder, 0.6);

    let report = pipeline
      .ingest(
        "user-1",
        "app-a",
        vec![create_candidate("user likes tea"), create_candidate("user likes coffee")],
      )
      .await;

    assert_eq!(report.created.len(), 2);
    assert_eq!(*backend.upsert_batch_calls.lock().unwrap(), 1);
    assert_eq!(backend.upserts.lock().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn delete_resolves_and_flushes_a_hard_delete() {
    let backend = Arc::new(StubBackend::new());
    let router = Arc::new(RwLock::new(VectorRouter::new(backend.clone(), "user-1", "app-a")));
    let cache: Arc<dyn MemoryCache> = LocalCache::new(CacheConfig::default());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder);
    let pipeline = IngestionPipeline::new(router, cache, embedder, 0.6);

    let create_report = pipeline.ingest("user-1", "app-a", vec![create_candidate("user likes tea")]).await;
    let created_id = create_report.created[0];

    let mut delete_candidate = create_candidate("user likes tea");
    delete_candidate.operation = DraftOperation::Delete;
    delete_candidate.id = Some(created_id.to_string());
    let report = pipeline.ingest("user-1", "app-a", vec![delete_candidate]).await;

    assert_eq!(report.deleted, vec![created_id]);
    assert_eq!(*backend.deletes.lock().unwrap(), vec![created_id]);
  }

  #[tokio::test]
  async fn update_without_candidates_is_rejected() {
    let pipeline = pipeline();
    let mut candidate = create_candidate("user now prefers coffee");
    candidate.operation = DraftOperation::Update;
    let report = pipeline.ingest("user-1", "app-a", vec![candidate]).await;
    assert!(report.updated.is_empty());
    assert_eq!(report.rejected.len(), 1);
  }

  #[tokio::test]
  async fn invalid_draft_is_rejected_without_touching_backend() {
    let pipeline = pipeline();
    let mut candidate = create_candidate("user likes tea");
    candidate.category = "not-a-category".into();
    let report = pipeline.ingest("user-1", "app-a", vec![candidate]).await;
    assert_eq!(report.rejected.len(), 1);
    assert!(report.created.is_empty());
  }
}
