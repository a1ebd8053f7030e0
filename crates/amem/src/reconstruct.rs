use amem_core::{Lifespan, Memory, Mutability, Status};
use amem_vector::{VectorMatch, category_from_metadata, lifespan_from_metadata, status_from_metadata};
use chrono::Utc;

/// Rebuilds a `Memory` from a vector backend's stored metadata for cache
/// warmup, where only the metadata fields a backend echoes back are
/// available (no raw_text, forget_score, or relationships).
pub fn memory_from_match(hit: &VectorMatch) -> Option<Memory> {
  let category = category_from_metadata(&hit.metadata)?;
  let status = status_from_metadata(&hit.metadata).unwrap_or(Status::Active);
  let lifespan = lifespan_from_metadata(&hit.metadata).unwrap_or(Lifespan::MidTerm);
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
