use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{Category, Lifespan, Status};

/// A semantic description of which memories to retrieve.
///
/// Backends compile a `Filter` into their own predicate language (see
/// `amem-vector`); caches apply it in-process against a cached "all
/// memories" slice (see `amem-cache`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
  #[serde(default)]
  pub search_query: String,
  #[serde(default)]
  pub category: Vec<Category>,
  #[serde(default)]
  pub lifespan: Vec<Lifespan>,
  #[serde(default)]
  pub importance: Option<u8>,
  #[serde(default)]
  pub expiry: Option<DateTime<Utc>>,
  #[serde(default)]
  pub status: Option<Status>,
  #[serde(default)]
  pub include_all_scopes: bool,
}

impl Filter {
  /// The literal filter used by `Auto` mode retrieval: the raw prompt as
  /// search text, every category and lifespan, `status = active`.
  pub fn auto_literal(prompt: impl Into<String>) -> Self {
    Self {
      search_query: prompt.into(),
      category: Category::ALL.to_vec(),
      lifespan: vec![
        Lifespan::ShortTerm,
        Lifespan::MidTerm,
        Lifespan::LongTerm,
        Lifespan::Lifelong,
      ],
      importance: None,
      expiry: None,
      status: Some(Status::Active),
      include_all_scopes: false,
    }
  }

  /// A bare scan for a single category, `status = active` implied by the
  /// caller re-checking on read (cache and backend both re-filter).
  pub fn for_category(category: Category) -> Self {
    Self {
      category: vec![category],
      status: Some(Status::Active),
      ..Default::default()
    }
  }

  /// Predicates that don't depend on the bound scope. Use `matches_scoped`
  /// when the namespace predicate (§4.1) also needs to apply.
  pub fn matches(&self, memory: &crate::memory::Memory, now: DateTime<Utc>) -> bool {
    if let Some(status) = self.status
      && memory.status != status
    {
      return false;
    }
    if !self.category.is_empty() && !self.category.contains(&memory.category) {
      return false;
    }
    if !self.lifespan.is_empty() && !self.lifespan.contains(&memory.lifespan) {
      return false;
    }
    if let Some(min_importance) = self.importance
      && memory.importance < min_importance
    {
      return false;
    }
    if let Some(expiry) = self.expiry {
      match memory.expires_at {
        Some(exp) if exp <= expiry => {}
        _ => return false,
      }
    }
    if memory.expires_at.is_some_and(|exp| exp <= now) && self.status != Some(Status::Deleted) {
      // expired memories never satisfy a live filter, matching invariant 1.
      return false;
    }
    true
  }

  /// `matches`, plus the namespace predicate every query carries unless
  /// `include_all_scopes` is set (spec §4.1 "Namespace handling").
  pub fn matches_scoped(&self, memory: &crate::memory::Memory, scope: &str, now: DateTime<Utc>) -> bool {
    if !self.include_all_scopes && memory.namespace != scope {
      return false;
    }
    self.matches(memory, now)
  }
}
