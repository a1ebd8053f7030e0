use amem_core::Filter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An embedding provider: turns text into a fixed-dimension vector for the
/// vector backend to index (§4.2).
#[async_trait]
pub trait Embedder: Send + Sync {
  fn model_id(&self) -> &str;
  fn dimensions(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// A draft memory operation as proposed by an extraction LLM, before the
/// ingestion pipeline resolves it against existing memories (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftCandidate {
  pub operation: DraftOperation,
  #[serde(default)]
  pub id: Option<String>,
  pub category: String,
  pub summary: String,
  #[serde(default)]
  pub raw_text: String,
  #[serde(default = "default_importance")]
  pub importance: u8,
  #[serde(default = "default_lifespan")]
  pub lifespan: String,
  #[serde(default)]
  pub forget_score: f32,
  #[serde(default = "default_mutability")]
  pub mutability: String,
  /// Explicit status override; absent means "active" once resolved.
  #[serde(default)]
  pub status: Option<String>,
  /// Canonical-key strings this draft supersedes, carried straight onto the
  /// resulting `Memory.supersedes_canonical_keys`.
  #[serde(default)]
  pub supersedes_canonical_keys: Vec<String>,
  #[serde(default)]
  pub metadata: serde_json::Value,
  /// When set, names a memory id this draft supersedes regardless of how
  /// its own target id was resolved (§4.4 algorithm step 2).
  #[serde(default)]
  pub supersedes_memory_id: Option<String>,
}

fn default_importance() -> u8 {
  3
}

fn default_lifespan() -> String {
  "mid_term".to_string()
}

fn default_mutability() -> String {
  "mutable".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftOperation {
  Create,
  Update,
  Delete,
}

/// An LLM used to extract candidate memory drafts from conversational text.
#[async_trait]
pub trait ExtractionLlm: Send + Sync {
  async fn extract_drafts(&self, conversation_text: &str) -> Result<Vec<DraftCandidate>>;
}

/// An LLM used by `Conscious` mode retrieval to turn a free-form prompt into
/// a structured `Filter` (§4.5).
#[async_trait]
pub trait RetrievalLlm: Send + Sync {
  async fn build_filter(&self, prompt: &str) -> Result<Filter>;
}
