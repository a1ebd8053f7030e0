//! Compiles an `amem_core::Filter` into each backend's native predicate
//! language (§4.1: Upstash's string-predicate grammar, Pinecone's structured
//! `$and`/`$eq`/`$lte` JSON — Pinecone only supports `$eq` for category,
//! lifespan, status, namespace, importance, and `$lte` for expiry).

use amem_core::Filter;
use serde_json::{Value, json};

/// `category = 'fact' AND status = 'active' AND namespace = 'app-a'`-style
/// predicate string, clauses `AND`-joined, string literals single-quoted,
/// multi-value fields rendered as `IN (...)`.
pub fn compile_upstash(filter: &Filter, scope: &str) -> String {
  let mut clauses = Vec::new();

  if !filter.include_all_scopes {
    clauses.push(format!("namespace = '{}'", escape_literal(scope)));
  }
  if let Some(status) = filter.status {
    clauses.push(format!("status = '{}'", status.as_str()));
  }
  if !filter.category.is_empty() {
    clauses.push(in_clause("category", filter.category.iter().map(|c| c.as_str())));
  }
  if !filter.lifespan.is_empty() {
    clauses.push(in_clause("lifespan", filter.lifespan.iter().map(|l| l.as_str())));
  }
  if let Some(importance) = filter.importance {
    clauses.push(format!("importance >= {importance}"));
  }
  if let Some(expiry) = filter.expiry {
    clauses.push(format!("expires_at <= {}", expiry.timestamp()));
  }

  clauses.join(" AND ")
}

fn in_clause<'a>(field: &str, values: impl Iterator<Item = &'a str>) -> String {
  let quoted: Vec<String> = values.map(|v| format!("'{}'", escape_literal(v))).collect();
  format!("{field} IN ({})", quoted.join(", "))
}

fn escape_literal(value: &str) -> String {
  value.replace('\'', "\\'")
}

/// Pinecone-style structured metadata filter: an `$and` array of single-key
/// `$eq`/`$lte` clauses. A category/lifespan list naming every possible value
/// is "no restriction" and compiles to no clause at all; a single-value list
/// compiles to `$eq`.
pub fn compile_pinecone(filter: &Filter, scope: &str) -> Value {
  let mut clauses = Vec::new();

  if !filter.include_all_scopes {
    clauses.push(json!({ "namespace": { "$eq": scope } }));
  }
  if let Some(status) = filter.status {
    clauses.push(json!({ "status": { "$eq": status.as_str() } }));
  }
  if let Some(value) = eq_value(&filter.category, amem_core::Category::ALL.len(), |c| c.as_str()) {
    clauses.push(json!({ "category": { "$eq": value } }));
  }
  if let Some(value) = eq_value(&filter.lifespan, 4, |l| l.as_str()) {
    clauses.push(json!({ "lifespan": { "$eq": value } }));
  }
  if let Some(importance) = filter.importance {
    clauses.push(json!({ "importance": { "$eq": importance } }));
  }
  if let Some(expiry) = filter.expiry {
    clauses.push(json!({ "expires_at": { "$lte": expiry.timestamp() } }));
  }

  if clauses.is_empty() {
    json!({})
  } else if clauses.len() == 1 {
    clauses.remove(0)
  } else {
    json!({ "$and": clauses })
  }
}

/// Reduces a category/lifespan list to a single `$eq` value, or `None` when
/// the list is empty or names every possible value (no restriction, and
/// `$eq` can't express "one of several" anyway).
fn eq_value<T>(values: &[T], all_len: usize, as_str: impl Fn(&T) -> &'static str) -> Option<&'static str> {
  if values.is_empty() || values.len() >= all_len || values.len() > 1 {
    return None;
  }
  Some(as_str(&values[0]))
}

#[cfg(test)]
mod tests {
  use amem_core::{Category, Status};

  use super::*;

  #[test]
  fn upstash_scopes_by_namespace_unless_told_otherwise() {
    let filter = Filter::for_category(Category::Rule);
    let compiled = compile_upstash(&filter, "app-a");
    assert!(compiled.contains("namespace = 'app-a'"));
    assert!(compiled.contains("category IN ('rule')"));

    let mut scoped = filter.clone();
    scoped.include_all_scopes = true;
    let compiled = compile_upstash(&scoped, "app-a");
    assert!(!compiled.contains("namespace"));
  }

  #[test]
  fn pinecone_collapses_single_clause() {
    let mut filter = Filter::default();
    filter.include_all_scopes = true;
    filter.status = Some(Status::Active);
    let compiled = compile_pinecone(&filter, "app-a");
    assert_eq!(compiled, json!({ "status": { "$eq": "active" } }));
  }

  #[test]
  fn pinecone_wraps_multiple_clauses_in_and() {
    let filter = Filter::for_category(Category::Fact);
    let compiled = compile_pinecone(&filter, "app-a");
    let obj = compiled.as_object().unwrap();
    assert!(obj.contains_key("$and"));
  }

  #[test]
  fn pinecone_single_category_compiles_to_eq() {
    let filter = Filter::for_category(Category::Rule);
    let compiled = compile_pinecone(&filter, "app-a");
    let and = compiled["$and"].as_array().unwrap();
    assert!(and.contains(&json!({ "category": { "$eq": "rule" } })));
    assert!(!compiled.to_string().contains("$in"));
  }

  #[test]
  fn pinecone_omits_category_clause_when_every_value_is_present() {
    let filter = Filter::auto_literal("anything");
    let compiled = compile_pinecone(&filter, "app-a");
    assert!(!compiled.to_string().contains("\"category\""));
    assert!(!compiled.to_string().contains("\"lifespan\""));
  }
}
