//! Configuration for the memory subsystem: retrieval-mode defaults, token
//! budgets, and cache TTLs (§6.2's `CacheConfig` table, plus the `MemoryConfig`
//! ambient wrapper a caller loads once at startup).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retrieval mode: `Auto` (fixed literal filter) or `Conscious` (LLM-built
/// filter, narrower budget).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
  #[default]
  Auto,
  Conscious,
}

impl RetrievalMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RetrievalMode::Auto => "auto",
      RetrievalMode::Conscious => "conscious",
    }
  }

  /// Approximate max output tokens for the formatted context (§4.5 table).
  pub fn max_output_tokens(&self) -> usize {
    match self {
      RetrievalMode::Auto => 800,
      RetrievalMode::Conscious => 400,
    }
  }

  /// top_k for the k-NN relevance query (§4.5 table).
  pub fn top_k(&self) -> usize {
    match self {
      RetrievalMode::Auto => 5,
      RetrievalMode::Conscious => 3,
    }
  }
}

impl std::str::FromStr for RetrievalMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "auto" => Ok(RetrievalMode::Auto),
      "conscious" => Ok(RetrievalMode::Conscious),
      other => Err(format!("unknown retrieval mode: {other}")),
    }
  }
}

/// Which cache implementation backs a session: process-local only, or a
/// shared remote KV fronted by a local L1 (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
  #[default]
  Local,
  Remote,
}

/// Recognized `CacheConfig` options (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: CacheBackendKind,
  #[serde(with = "duration_secs")]
  pub rules_ttl: Duration,
  #[serde(with = "duration_secs")]
  pub facts_ttl: Duration,
  #[serde(with = "duration_secs")]
  pub skills_ttl: Duration,
  #[serde(with = "duration_secs")]
  pub context_ttl: Duration,
  #[serde(with = "duration_secs")]
  pub all_memories_ttl: Duration,
  #[serde(with = "duration_secs")]
  pub local_max_age: Duration,
  pub enabled: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackendKind::Local,
      rules_ttl: Duration::from_secs(30 * 60),
      facts_ttl: Duration::from_secs(20 * 60),
      skills_ttl: Duration::from_secs(25 * 60),
      context_ttl: Duration::from_secs(10 * 60),
      all_memories_ttl: Duration::from_secs(15 * 60),
      local_max_age: Duration::from_secs(5 * 60),
      enabled: true,
    }
  }
}

mod duration_secs {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
  }
}

/// Ambient, caller-loaded configuration for a memory session. Layered under
/// the per-call `CacheConfig` the facade accepts from `enable_cache`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MemoryConfig {
  pub default_retrieval_mode: RetrievalMode,
  pub default_cache: CacheConfig,
  /// Similarity threshold used by the ingestion pipeline's id-less
  /// update/delete resolution (§4.4, "Similarity"); configurable per the
  /// Open Question in §9.
  pub similarity_threshold: f32,
}

impl MemoryConfig {
  pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
    self.similarity_threshold = threshold;
    self
  }
}

const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

impl MemoryConfig {
  pub fn standard() -> Self {
    Self {
      default_retrieval_mode: RetrievalMode::Auto,
      default_cache: CacheConfig::default(),
      similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
    }
  }

  /// Loads from `<project_path>/.amem/config.toml`, falling back to the
  /// user config directory, falling back to `standard()`.
  pub fn load_for_project(project_path: &Path) -> Self {
    let project_config = Self::project_config_path(project_path);
    if project_config.exists()
      && let Ok(content) = std::fs::read_to_string(&project_config)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(content) = std::fs::read_to_string(&user_config_path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    Self::standard()
  }

  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AMEM_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }
    dirs::config_dir().map(|p| p.join("amem").join("config.toml"))
  }

  pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join(".amem").join("config.toml")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cache_config_defaults_match_spec_table() {
    let cfg = CacheConfig::default();
    assert_eq!(cfg.rules_ttl, Duration::from_secs(30 * 60));
    assert_eq!(cfg.facts_ttl, Duration::from_secs(20 * 60));
    assert_eq!(cfg.skills_ttl, Duration::from_secs(25 * 60));
    assert_eq!(cfg.context_ttl, Duration::from_secs(10 * 60));
    assert_eq!(cfg.all_memories_ttl, Duration::from_secs(15 * 60));
    assert_eq!(cfg.local_max_age, Duration::from_secs(5 * 60));
    assert!(cfg.enabled);
  }

  #[test]
  fn retrieval_mode_budgets_match_spec_table() {
    assert_eq!(RetrievalMode::Auto.max_output_tokens(), 800);
    assert_eq!(RetrievalMode::Auto.top_k(), 5);
    assert_eq!(RetrievalMode::Conscious.max_output_tokens(), 400);
    assert_eq!(RetrievalMode::Conscious.top_k(), 3);
  }

  #[test]
  fn memory_config_standard_uses_default_similarity_threshold() {
    let cfg = MemoryConfig::standard();
    assert_eq!(cfg.similarity_threshold, 0.6);
  }

  #[test]
  fn load_for_project_reads_project_toml_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let amem_dir = dir.path().join(".amem");
    std::fs::create_dir_all(&amem_dir).unwrap();
    std::fs::write(amem_dir.join("config.toml"), "similarity_threshold = 0.8\ndefault_retrieval_mode = \"conscious\"\n").unwrap();

    let cfg = MemoryConfig::load_for_project(dir.path());
    assert_eq!(cfg.similarity_threshold, 0.8);
    assert_eq!(cfg.default_retrieval_mode, RetrievalMode::Conscious);
  }

  #[test]
  fn load_for_project_falls_back_to_standard_when_no_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = MemoryConfig::load_for_project(dir.path());
    assert_eq!(cfg.similarity_threshold, 0.0);
  }
}
