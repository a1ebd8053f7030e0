use amem_core::{Category, Lifespan, Memory, MemoryId, Status};
use serde_json::{Value, json};

/// What gets upserted into a vector backend: the embedding plus the metadata
/// fields a backend's filter compiler needs to see (§4.1).
#[derive(Debug, Clone)]
pub struct VectorRecord {
  pub id: MemoryId,
  pub embedding: Vec<f32>,
  pub metadata: Value,
}

impl VectorRecord {
  pub fn from_memory(memory: &Memory, embedding: Vec<f32>) -> Self {
    Self {
      id: memory.id,
      embedding,
      metadata: memory_metadata(memory),
    }
  }
}

/// A backend's raw query hit: the memory id, a relevance score, and whatever
/// metadata the backend stored alongside the vector (used to reconstruct a
/// `Memory` without a second round-trip where the backend supports it).
#[derive(Debug, Clone)]
pub struct VectorMatch {
  pub id: MemoryId,
  pub score: f32,
  pub metadata: Value,
}

/// The metadata payload every backend stores next to a memory's embedding.
pub fn memory_metadata(memory: &Memory) -> Value {
  json!({
    "subject_key": memory.subject_key,
    "namespace": memory.namespace,
    "category": memory.category.as_str(),
    "lifespan": memory.lifespan.as_str(),
    "importance": memory.importance,
    "status": memory.status.as_str(),
    "expires_at": memory.expires_at.map(|t| t.timestamp()),
    "superseded_by_id": memory.superseded_by_id.map(|id| id.to_string()),
    "summary": memory.summary,
    "metadata": memory.metadata,
  })
}

pub fn category_from_metadata(metadata: &Value) -> Option<Category> {
  metadata.get("category")?.as_str()?.parse().ok()
}

pub fn lifespan_from_metadata(metadata: &Value) -> Option<Lifespan> {
  metadata.get("lifespan")?.as_str()?.parse().ok()
}

pub fn status_from_metadata(metadata: &Value) -> Option<Status> {
  metadata.get("status")?.as_str()?.parse().ok()
}
