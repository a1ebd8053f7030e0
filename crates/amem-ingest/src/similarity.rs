//! Similarity matching used to resolve an id-less update/delete draft
//! against an existing memory (§4.4 "Similarity"): normalize, then try an
//! exact or substring match, then fall back to Jaccard token overlap.

use amem_core::{Memory, normalize_text};
use std::collections::HashSet;

/// Find the best candidate in `existing` for `draft_summary`, if any clears
/// `threshold`. Candidates are assumed pre-filtered to the same subject/scope.
pub fn resolve_match<'a>(draft_summary: &str, existing: &'a [Memory], threshold: f32) -> Option<&'a Memory> {
  let normalized_draft = normalize_text(draft_summary);
  if normalized_draft.is_empty() {
    return None;
  }

  for memory in existing {
    let normalized_existing = memory.normalized_summary();
    if normalized_draft == normalized_existing {
      return Some(memory);
    }
    if normalized_existing.contains(&normalized_draft) || normalized_draft.contains(&normalized_existing) {
      return Some(memory);
    }
  }

  existing
    .iter()
    .map(|memory| (memory, jaccard_similarity(&normalized_draft, &memory.normalized_summary())))
    .filter(|(_, score)| *score >= threshold)
    .max_by(|a, b| a.1.total_cmp(&b.1))
    .map(|(memory, _)| memory)
}

/// Content-word Jaccard similarity: token sets intersected over their union,
/// ignoring short stop-word-like fragments.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
  let tokens_a = content_tokens(a);
  let tokens_b = content_tokens(b);

  if tokens_a.is_empty() && tokens_b.is_empty() {
    return 1.0;
  }

  let intersection = tokens_a.intersection(&tokens_b).count();
  let union = tokens_a.union(&tokens_b).count();

  if union == 0 {
    return 0.0;
  }

  intersection as f32 / union as f32
}

fn content_tokens(text: &str) -> HashSet<&str> {
  text.split_whitespace().filter(|token| token.len() >= 3).collect()
}

#[cfg(test)]
mod tests {
  use amem_core::{Category, Lifespan, MemoryId, Mutability, Status};
  use chrono::Utc;

  use super::*;

  fn memory_with_summary(summary: &str) -> Memory {
    let now = Utc::now();
    Memory {
      id: MemoryId::new(),
      subject_key: "user-1".into(),
      namespace: "app-a".into(),
      category: Category::Fact,
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

  #[test]
  fn exact_normalized_match_wins() {
    let existing = vec![memory_with_summary("User prefers dark mode.")];
    let found = resolve_match("user prefers dark mode", &existing, 0.6).unwrap();
    assert_eq!(found.id, existing[0].id);
  }

  #[test]
  fn substring_match_catches_refinement() {
    let existing = vec![memory_with_summary("user prefers dark mode in the editor")];
    let found = resolve_match("user prefers dark mode", &existing, 0.6).unwrap();
    assert_eq!(found.id, existing[0].id);
  }

  #[test]
  fn jaccard_fallback_respects_threshold() {
    let existing = vec![memory_with_summary("user likes vim keybindings and dark themes")];
    assert!(resolve_match("user enjoys vim keybindings and dark colors", &existing, 0.9).is_none());
    assert!(resolve_match("user likes vim keybindings and dark themes today", &existing, 0.5).is_some());
  }

  #[test]
  fn unrelated_summaries_do_not_match() {
    let existing = vec![memory_with_summary("the project uses postgres for storage")];
    assert!(resolve_match("user prefers tabs over spaces", &existing, 0.6).is_none());
  }
}
