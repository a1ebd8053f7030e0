use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a memory, unique within `(subject_key, namespace)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(Uuid);

impl MemoryId {
  pub fn new() -> Self {
    Self(Uuid::now_v7())
  }

  pub fn from_uuid(id: Uuid) -> Self {
    Self(id)
  }

  pub fn as_uuid(&self) -> Uuid {
    self.0
  }
}

impl Default for MemoryId {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Display for MemoryId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl std::str::FromStr for MemoryId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self(Uuid::parse_str(s)?))
  }
}

/// The seven retrieval categories a Memory can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Fact,
  Preference,
  Skill,
  Context,
  Rule,
  Entity,
  Episodic,
}

impl Category {
  pub const ALL: [Category; 7] = [
    Category::Fact,
    Category::Preference,
    Category::Skill,
    Category::Context,
    Category::Rule,
    Category::Entity,
    Category::Episodic,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Fact => "fact",
      Category::Preference => "preference",
      Category::Skill => "skill",
      Category::Context => "context",
      Category::Rule => "rule",
      Category::Entity => "entity",
      Category::Episodic => "episodic",
    }
  }

  /// The four categories that the memory cache slices independently.
  pub fn is_cache_tier(&self) -> bool {
    matches!(self, Category::Rule | Category::Fact | Category::Skill | Category::Context)
  }
}

impl std::str::FromStr for Category {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "fact" => Ok(Category::Fact),
      "preference" => Ok(Category::Preference),
      "skill" => Ok(Category::Skill),
      "context" => Ok(Category::Context),
      "rule" => Ok(Category::Rule),
      "entity" => Ok(Category::Entity),
      "episodic" => Ok(Category::Episodic),
      other => Err(format!("unknown category: {other}")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
  Mutable,
  Immutable,
}

impl Mutability {
  pub fn as_str(&self) -> &'static str {
    match self {
      Mutability::Mutable => "mutable",
      Mutability::Immutable => "immutable",
    }
  }
}

/// Categorical lifetime tier; combined with `forget_score` to derive `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifespan {
  ShortTerm,
  MidTerm,
  LongTerm,
  Lifelong,
}

impl Lifespan {
  pub fn as_str(&self) -> &'static str {
    match self {
      Lifespan::ShortTerm => "short_term",
      Lifespan::MidTerm => "mid_term",
      Lifespan::LongTerm => "long_term",
      Lifespan::Lifelong => "lifelong",
    }
  }

  /// Base duration before applying `(1 - forget_score)`, absent for `Lifelong`.
  pub fn base_duration(&self) -> Option<chrono::Duration> {
    match self {
      Lifespan::ShortTerm => Some(chrono::Duration::days(7)),
      Lifespan::MidTerm => Some(chrono::Duration::days(90)),
      Lifespan::LongTerm => Some(chrono::Duration::days(365)),
      Lifespan::Lifelong => None,
    }
  }
}

impl std::str::FromStr for Lifespan {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "short_term" => Ok(Lifespan::ShortTerm),
      "mid_term" => Ok(Lifespan::MidTerm),
      "long_term" => Ok(Lifespan::LongTerm),
      "lifelong" => Ok(Lifespan::Lifelong),
      other => Err(format!("unknown lifespan: {other}")),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  Active,
  Superseded,
  Deleted,
}

impl Status {
  pub fn as_str(&self) -> &'static str {
    match self {
      Status::Active => "active",
      Status::Superseded => "superseded",
      Status::Deleted => "deleted",
    }
  }
}

impl Default for Status {
  fn default() -> Self {
    Status::Active
  }
}

impl std::str::FromStr for Status {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "active" => Ok(Status::Active),
      "superseded" => Ok(Status::Superseded),
      "deleted" => Ok(Status::Deleted),
      other => Err(format!("unknown status: {other}")),
    }
  }
}

/// Adjacency record carried on `category = entity` memories.
///
/// Validating that `target_id` actually points at an entity memory is the
/// storage layer's concern (see spec invariant 3.1); this core does not
/// enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRelationship {
  pub target_id: MemoryId,
  pub relation: String,
}

/// The atomic unit of knowledge retained by the subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
  pub id: MemoryId,
  pub subject_key: String,
  pub namespace: String,
  pub category: Category,
  pub summary: String,
  pub raw_text: String,
  pub importance: u8,
  pub mutability: Mutability,
  pub lifespan: Lifespan,
  pub forget_score: f32,
  pub status: Status,
  #[serde(default)]
  pub supersedes_canonical_keys: HashSet<String>,
  #[serde(default)]
  pub superseded_by_id: Option<MemoryId>,
  #[serde(default)]
  pub metadata: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub expires_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub entity_relationships: Vec<EntityRelationship>,
}

impl Memory {
  /// Whether this memory is eligible for retrieval right now (invariant 1).
  pub fn is_retrievable(&self, now: DateTime<Utc>) -> bool {
    self.status == Status::Active && self.expires_at.is_none_or(|exp| exp > now)
  }

  /// Normalized form used by the dedupe and similarity passes: lowercased,
  /// punctuation stripped, whitespace collapsed.
  pub fn normalized_summary(&self) -> String {
    normalize_text(&self.summary)
  }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
  let lowered = text.to_lowercase();
  let stripped: String = lowered
    .chars()
    .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
    .collect();
  stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_round_trips_through_str() {
    for cat in Category::ALL {
      let parsed: Category = cat.as_str().parse().unwrap();
      assert_eq!(parsed, cat);
    }
  }

  #[test]
  fn lifelong_has_no_base_duration() {
    assert!(Lifespan::Lifelong.base_duration().is_none());
    assert!(Lifespan::ShortTerm.base_duration().is_some());
  }

  #[test]
  fn normalize_text_strips_punctuation_and_case() {
    assert_eq!(normalize_text("I Like, Adidas!!"), "i like adidas");
    assert_eq!(normalize_text("  lots   of   space "), "lots of space");
  }

  #[test]
  fn is_retrievable_respects_status_and_expiry() {
    let now = Utc::now();
    let mut m = Memory {
      id: MemoryId::new(),
      subject_key: "u".into(),
      namespace: "ns".into(),
      category: Category::Fact,
      summary: "s".into(),
      raw_text: "s".into(),
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
      expires_at: Some(now + chrono::Duration::days(1)),
      entity_relationships: Vec::new(),
    };
    assert!(m.is_retrievable(now));

    m.expires_at = Some(now - chrono::Duration::days(1));
    assert!(!m.is_retrievable(now));

    m.expires_at = None;
    assert!(m.is_retrievable(now));

    m.status = Status::Superseded;
    assert!(!m.is_retrievable(now));
  }
}
