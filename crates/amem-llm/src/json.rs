//! Tolerant JSON extraction from LLM response text: handles raw JSON as well
//! as responses wrapped in ` ```json ... ``` ` or ` ``` ... ``` ` code fences.

use serde::Deserialize;

pub fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> std::result::Result<T, serde_json::Error> {
  let json_str = extract_code_block(text).unwrap_or_else(|| text.trim());
  serde_json::from_str(json_str)
}

fn extract_code_block(text: &str) -> Option<&str> {
  let text = text.trim();
  if !text.starts_with("```") {
    return None;
  }

  let first_newline = text.find('\n')?;
  let after_fence = &text[first_newline + 1..];
  let end = after_fence.rfind("```")?;
  Some(after_fence[..end].trim())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_json_code_block() {
    let text = "```json\n{\"key\": \"value\"}\n```";
    assert_eq!(extract_code_block(text), Some(r#"{"key": "value"}"#));
  }

  #[test]
  fn extracts_plain_code_block() {
    let text = "```\n{\"key\": \"value\"}\n```";
    assert_eq!(extract_code_block(text), Some(r#"{"key": "value"}"#));
  }

  #[test]
  fn passes_through_raw_json() {
    assert_eq!(extract_code_block(r#"{"key": "value"}"#), None);
  }

  #[test]
  fn parse_json_handles_both_forms() {
    let raw: serde_json::Value = parse_json(r#"{"key": "value"}"#).unwrap();
    let fenced: serde_json::Value = parse_json("```json\n{\"key\": \"value\"}\n```").unwrap();
    assert_eq!(raw, fenced);
  }
}
