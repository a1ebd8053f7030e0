//! Renders a merged memory list into the two context strings the planner
//! produces (§4.5 "Context formatting").

use amem_core::{Category, Memory, Status};

const RULE_CLAUSE_MAX_CHARS: usize = 80;
const CHARS_PER_TOKEN: usize = 5;

/// Condensed, model-facing context: a single `[Rules] …` line followed by
/// bullet lines for everything else, cut off once the approximate token
/// budget is spent.
pub fn format_model_context(merged: &[Memory], max_output_tokens: usize) -> String {
  let budget_chars = max_output_tokens * CHARS_PER_TOKEN;
  let mut output = String::new();

  let rule_clauses: Vec<String> = merged
    .iter()
    .filter(|m| m.category == Category::Rule)
    .map(|m| condense_rule(&m.summary))
    .collect();
  if !rule_clauses.is_empty() {
    output.push_str("[Rules] ");
    output.push_str(&rule_clauses.join("; "));
    output.push('\n');
  }

  for memory in merged.iter().filter(|m| m.category != Category::Rule) {
    let line = format!("- {}\n", memory.summary);
    if output.len() + line.len() > budget_chars {
      break;
    }
    output.push_str(&line);
  }

  output
}

fn condense_rule(summary: &str) -> String {
  let trimmed = summary.trim();
  if trimmed.chars().count() <= RULE_CLAUSE_MAX_CHARS {
    trimmed.to_string()
  } else {
    let truncated: String = trimmed.chars().take(RULE_CLAUSE_MAX_CHARS.saturating_sub(1)).collect();
    format!("{truncated}…")
  }
}

/// One line per memory carrying its id, category, status, and expiry, so
/// the extraction LLM can reference existing memories by id on the next
/// ingestion pass (§4.5 "Context formatting (for the next ingestion call)").
pub fn format_ingestion_context(merged: &[Memory]) -> String {
  let mut output = String::from("Existing memories — use these IDs for updates/supersedes:\n");
  for memory in merged {
    let expires = memory
      .expires_at
      .map(|e| format!(" [Expires:{}]", e.format("%Y-%m-%d")))
      .unwrap_or_default();
    output.push_str(&format!(
      "[ID:{}] [Category:{}] [Status:{}]{} {}\n",
      memory.id,
      memory.category.as_str(),
      status_label(memory.status),
      expires,
      memory.summary
    ));
  }
  output
}

fn status_label(status: Status) -> &'static str {
  status.as_str()
}
