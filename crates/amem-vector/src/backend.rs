use amem_core::{Filter, MemoryId};
use async_trait::async_trait;

use crate::error::Result;
use crate::record::{VectorMatch, VectorRecord};

/// A vector store capable of upserting embeddings and answering k-NN
/// queries narrowed by a compiled `Filter` (§4.1). Every method takes the
/// caller's `scope` explicitly so the trait itself carries no session
/// state — binding `(user, scope)` to an active backend is `VectorRouter`'s
/// job, not the backend's.
#[async_trait]
pub trait VectorBackend: Send + Sync {
  /// Stable identifier used by `switch_service` (e.g. `"upstash"`, `"pinecone"`).
  fn tag(&self) -> &'static str;

  async fn upsert(&self, record: VectorRecord) -> Result<()>;

  async fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
    for record in records {
      self.upsert(record).await?;
    }
    Ok(())
  }

  /// k-NN query against `embedding`, narrowed by the compiled filter.
  async fn query(&self, embedding: &[f32], filter: &Filter, scope: &str, top_k: usize) -> Result<Vec<VectorMatch>>;

  /// Metadata-only scan (no embedding), used when a caller wants every
  /// memory matching a filter rather than the `top_k` nearest to a query.
  async fn query_by_metadata(&self, filter: &Filter, scope: &str, limit: usize) -> Result<Vec<VectorMatch>>;

  async fn update_metadata(&self, id: MemoryId, metadata: serde_json::Value) -> Result<()>;

  async fn delete(&self, id: MemoryId) -> Result<()>;

  async fn delete_batch(&self, ids: Vec<MemoryId>) -> Result<()> {
    for id in ids {
      self.delete(id).await?;
    }
    Ok(())
  }
}
