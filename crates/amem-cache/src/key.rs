use amem_core::Category;

/// Builds a cache key of the form `<prefix>:<user>:<scope>[:category]`
/// (§4.3). The "all memories" slice omits the category segment.
pub fn build_key(prefix: &str, subject_key: &str, scope: &str, category: Option<Category>) -> String {
  match category {
    Some(category) => format!("{prefix}:{subject_key}:{scope}:{}", category.as_str()),
    None => format!("{prefix}:{subject_key}:{scope}"),
  }
}

pub const CATEGORY_PREFIX: &str = "cat";
pub const ALL_PREFIX: &str = "all";

/// Prefix matching every key `build_key` produces for a given user under
/// `prefix`, for a remote KV's scan-by-prefix invalidation (§6.1).
pub fn user_prefix(prefix: &str, subject_key: &str) -> String {
  format!("{prefix}:{subject_key}:")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_includes_category_when_given() {
    assert_eq!(
      build_key(CATEGORY_PREFIX, "user-1", "app-a", Some(Category::Rule)),
      "cat:user-1:app-a:rule"
    );
  }

  #[test]
  fn key_omits_category_for_all_slice() {
    assert_eq!(build_key(ALL_PREFIX, "user-1", "app-a", None), "all:user-1:app-a");
  }

  #[test]
  fn user_prefix_matches_every_key_build_key_makes_for_that_user() {
    let prefix = user_prefix(CATEGORY_PREFIX, "user-1");
    assert!(build_key(CATEGORY_PREFIX, "user-1", "app-a", Some(Category::Rule)).starts_with(&prefix));
    assert!(!build_key(CATEGORY_PREFIX, "user-2", "app-a", Some(Category::Rule)).starts_with(&prefix));
  }
}
