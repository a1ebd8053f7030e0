use std::collections::HashSet;

use amem_core::{Category, Lifespan, MemoryId, Mutability, Status};
use amem_llm::{DraftCandidate, DraftOperation};

use crate::error::{IngestError, Result};

/// A validated, typed draft ready for pipeline resolution. Built from the
/// loosely-typed `DraftCandidate` an `ExtractionLlm` returns (§4.4).
#[derive(Debug, Clone)]
pub struct MemoryDraft {
  pub operation: DraftOperation,
  pub id: Option<MemoryId>,
  pub category: Category,
  pub summary: String,
  pub raw_text: String,
  pub importance: u8,
  pub lifespan: Lifespan,
  pub forget_score: f32,
  pub mutability: Mutability,
  pub status: Option<Status>,
  pub supersedes_canonical_keys: HashSet<String>,
  pub metadata: serde_json::Value,
  pub supersedes_memory_id: Option<MemoryId>,
}

impl MemoryDraft {
  pub fn from_candidate(candidate: DraftCandidate) -> Result<Self> {
    if candidate.summary.trim().is_empty() {
      return Err(IngestError::InvalidDraft("summary is empty".into()));
    }

    let category = candidate
      .category
      .parse()
      .map_err(|e: String| IngestError::InvalidDraft(e))?;
    let lifespan = candidate
      .lifespan
      .parse()
      .map_err(|e: String| IngestError::InvalidDraft(e))?;
    let mutability = parse_mutability(&candidate.mutability)?;
    let id = candidate
      .id
      .as_deref()
      .map(str::parse::<MemoryId>)
      .transpose()
      .map_err(|e| IngestError::InvalidDraft(format!("bad id: {e}")))?;
    let status = candidate
      .status
      .as_deref()
      .map(str::parse::<Status>)
      .transpose()
      .map_err(IngestError::InvalidDraft)?;
    let supersedes_memory_id = candidate
      .supersedes_memory_id
      .as_deref()
      .map(str::parse::<MemoryId>)
      .transpose()
      .map_err(|e| IngestError::InvalidDraft(format!("bad supersedes_memory_id: {e}")))?;

    let raw_text = if candidate.raw_text.is_empty() {
      candidate.summary.clone()
    } else {
      candidate.raw_text
    };

    Ok(Self {
      operation: candidate.operation,
      id,
      category,
      summary: candidate.summary,
      raw_text,
      importance: candidate.importance.min(5),
      lifespan,
      forget_score: candidate.forget_score.clamp(0.0, 1.0),
      mutability,
      status,
      supersedes_canonical_keys: candidate.supersedes_canonical_keys.into_iter().collect(),
      metadata: candidate.metadata,
      supersedes_memory_id,
    })
  }
}

fn parse_mutability(s: &str) -> Result<Mutability> {
  match s.trim().to_lowercase().as_str() {
    "mutable" => Ok(Mutability::Mutable),
    "immutable" => Ok(Mutability::Immutable),
    other => Err(IngestError::InvalidDraft(format!("unknown mutability: {other}"))),
  }
}

#[cfg(test)]
mod tests {
  use amem_llm::DraftOperation;

  use super::*;

  fn candidate() -> DraftCandidate {
    DraftCandidate {
      operation: DraftOperation::Create,
      id: None,
      category: "fact".into(),
      summary: "user prefers dark mode".into(),
      raw_text: String::new(),
      importance: 9,
      lifespan: "long_term".into(),
      forget_score: 1.5,
      mutability: "mutable".into(),
      status: None,
      supersedes_canonical_keys: Vec::new(),
      metadata: serde_json::Value::Null,
      supersedes_memory_id: None,
    }
  }

  #[test]
  fn clamps_importance_and_forget_score() {
    let draft = MemoryDraft::from_candidate(candidate()).unwrap();
    assert_eq!(draft.importance, 5);
    assert_eq!(draft.forget_score, 1.0);
  }

  #[test]
  fn falls_back_to_summary_for_empty_raw_text() {
    let draft = MemoryDraft::from_candidate(candidate()).unwrap();
    assert_eq!(draft.raw_text, "user prefers dark mode");
  }

  #[test]
  fn rejects_empty_summary() {
    let mut c = candidate();
    c.summary = "   ".into();
    assert!(MemoryDraft::from_candidate(c).is_err());
  }

  #[test]
  fn rejects_unknown_category() {
    let mut c = candidate();
    c.category = "nonsense".into();
    assert!(MemoryDraft::from_candidate(c).is_err());
  }

  #[test]
  fn threads_status_and_explicit_supersession() {
    let mut c = candidate();
    c.status = Some("superseded".into());
    c.supersedes_memory_id = Some(MemoryId::new().to_string());
    c.supersedes_canonical_keys = vec!["old summary".into()];
    c.metadata = serde_json::json!({"source": "test"});
    let draft = MemoryDraft::from_candidate(c).unwrap();
    assert_eq!(draft.status, Some(Status::Superseded));
    assert!(draft.supersedes_memory_id.is_some());
    assert!(draft.supersedes_canonical_keys.contains("old summary"));
    assert_eq!(draft.metadata, serde_json::json!({"source": "test"}));
  }

  #[test]
  fn rejects_bad_status() {
    let mut c = candidate();
    c.status = Some("nonsense".into());
    assert!(MemoryDraft::from_candidate(c).is_err());
  }
}
