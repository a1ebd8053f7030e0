use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::Memory;

/// A wrapper around a memory slice; the value type for every cache entry
/// (per-category slices, the "all memories" slice, and remote-KV records).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedBundle {
  pub memories: Vec<Memory>,
  pub cached_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl CachedBundle {
  pub fn new(memories: Vec<Memory>, ttl: chrono::Duration) -> Self {
    let now = Utc::now();
    Self {
      memories,
      cached_at: now,
      expires_at: now + ttl,
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bundle_expires_after_ttl() {
    let bundle = CachedBundle::new(Vec::new(), chrono::Duration::seconds(-1));
    assert!(bundle.is_expired(Utc::now()));

    let bundle = CachedBundle::new(Vec::new(), chrono::Duration::minutes(30));
    assert!(!bundle.is_expired(Utc::now()));
  }
}
