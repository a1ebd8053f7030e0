use std::collections::HashMap;
use std::sync::Arc;

use amem_core::{Filter, Memory, MemoryId};
use serde_json::Value;
use tracing::info;

use crate::backend::VectorBackend;
use crate::error::{BackendError, Result};
use crate::record::{VectorMatch, VectorRecord};

/// Binds one `(subject_key, scope)` session to an active vector backend,
/// while keeping every registered backend reachable so `switch_service` can
/// hot-swap without losing the session's binding (§4.1, §6.1 `switch_backend`).
pub struct VectorRouter {
  active_tag: &'static str,
  registry: HashMap<&'static str, Arc<dyn VectorBackend>>,
  subject_key: String,
  scope: String,
}

impl VectorRouter {
  pub fn new(initial: Arc<dyn VectorBackend>, subject_key: impl Into<String>, scope: impl Into<String>) -> Self {
    let tag = initial.tag();
    let mut registry = HashMap::new();
    registry.insert(tag, initial);
    Self {
      active_tag: tag,
      registry,
      subject_key: subject_key.into(),
      scope: scope.into(),
    }
  }

  /// Makes an additional backend reachable by `switch_service`, without
  /// changing which one is currently active.
  pub fn register(&mut self, backend: Arc<dyn VectorBackend>) {
    self.registry.insert(backend.tag(), backend);
  }

  pub fn active_tag(&self) -> &'static str {
    self.active_tag
  }

  pub fn subject_key(&self) -> &str {
    &self.subject_key
  }

  pub fn scope(&self) -> &str {
    &self.scope
  }

  pub fn rebind_user(&mut self, subject_key: impl Into<String>) {
    self.subject_key = subject_key.into();
  }

  pub fn rebind_scope(&mut self, scope: impl Into<String>) {
    self.scope = scope.into();
  }

  /// Switches the active backend to a previously registered one, identified
  /// by its `tag()`. The `(subject_key, scope)` binding carries over unchanged.
  pub fn switch_service(&mut self, tag: &str) -> Result<()> {
    let backend = self.registry.get(tag).ok_or_else(|| BackendError::UnknownTag(tag.to_string()))?;
    info!("vector router switching to backend {tag}");
    self.active_tag = backend.tag();
    Ok(())
  }

  fn active(&self) -> Result<&Arc<dyn VectorBackend>> {
    self.registry.get(self.active_tag).ok_or(BackendError::NoActiveBackend)
  }

  pub async fn upsert(&self, memory: &Memory, embedding: Vec<f32>) -> Result<()> {
    self.active()?.upsert(VectorRecord::from_memory(memory, embedding)).await
  }

  /// Flushes a batch of prepared records through the backend's `upsert_batch`
  /// (§4.4 ingestion batching).
  pub async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
    self.active()?.upsert_batch(records).await
  }

  /// Flushes a batch of deletes through the backend's `delete_batch`.
  pub async fn delete_batch(&self, ids: Vec<MemoryId>) -> Result<()> {
    self.active()?.delete_batch(ids).await
  }

  pub async fn query(&self, embedding: &[f32], filter: &Filter, top_k: usize) -> Result<Vec<VectorMatch>> {
    self.active()?.query(embedding, filter, &self.scope, top_k).await
  }

  pub async fn query_by_metadata(&self, filter: &Filter, limit: usize) -> Result<Vec<VectorMatch>> {
    self.active()?.query_by_metadata(filter, &self.scope, limit).await
  }

  pub async fn update_metadata(&self, id: MemoryId, metadata: Value) -> Result<()> {
    self.active()?.update_metadata(id, metadata).await
  }

  pub async fn delete(&self, id: MemoryId) -> Result<()> {
    self.active()?.delete(id).await
  }
}

#[cfg(test)]
mod tests {
  use amem_core::Category;
  use async_trait::async_trait;

  use super::*;

  struct StubBackend(&'static str);

  #[async_trait]
  impl VectorBackend for StubBackend {
    fn tag(&self) -> &'static str {
      self.0
    }

    async fn upsert(&self, _record: VectorRecord) -> Result<()> {
      Ok(())
    }

    async fn query(&self, _embedding: &[f32], _filter: &Filter, _scope: &str, _top_k: usize) -> Result<Vec<VectorMatch>> {
      Ok(Vec::new())
    }

    async fn query_by_metadata(&self, _filter: &Filter, _scope: &str, _limit: usize) -> Result<Vec<VectorMatch>> {
      Ok(Vec::new())
    }

    async fn update_metadata(&self, _id: MemoryId, _metadata: Value) -> Result<()> {
      Ok(())
    }

    async fn delete(&self, _id: MemoryId) -> Result<()> {
      Ok(())
    }
  }

  #[tokio::test]
  async fn switch_service_moves_active_backend() {
    let mut router = VectorRouter::new(Arc::new(StubBackend("upstash")), "user-1", "app-a");
    router.register(Arc::new(StubBackend("pinecone")));
    assert_eq!(router.active_tag(), "upstash");

    router.switch_service("pinecone").unwrap();
    assert_eq!(router.active_tag(), "pinecone");

    let err = router.switch_service("missing").unwrap_err();
    assert!(matches!(err, BackendError::UnknownTag(tag) if tag == "missing"));
  }

  #[tokio::test]
  async fn rebind_updates_scope_without_touching_backend() {
    let mut router = VectorRouter::new(Arc::new(StubBackend("upstash")), "user-1", "app-a");
    router.rebind_scope("app-b");
    router.rebind_user("user-2");
    assert_eq!(router.scope(), "app-b");
    assert_eq!(router.subject_key(), "user-2");
    assert_eq!(router.active_tag(), "upstash");

    let filter = Filter::for_category(Category::Fact);
    let result = router.query_by_metadata(&filter, 5).await.unwrap();
    assert!(result.is_empty());
  }
}
