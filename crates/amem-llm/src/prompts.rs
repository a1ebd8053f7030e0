//! Prompt templates for the two LLM-driven operations the subsystem needs:
//! extracting memory drafts from a conversation, and building a `Conscious`
//! mode retrieval filter from a free-form prompt.

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You extract durable memories from a conversation. \
Respond with a JSON array of objects: {operation, id, category, summary, raw_text, importance, \
lifespan, forget_score, mutability}. operation is one of create/update/delete. category is one \
of fact/preference/skill/context/rule/entity/episodic. Only emit memories worth retaining.";

pub fn build_extraction_prompt(conversation_text: &str) -> String {
  format!("Conversation:\n{conversation_text}\n\nExtract memory drafts as a JSON array.")
}

pub const FILTER_SYSTEM_PROMPT: &str = "You translate a user request into a JSON retrieval filter: \
{search_query, category: [...], lifespan: [...], importance, status}. Omit fields you have no \
opinion on.";

pub fn build_filter_prompt(prompt: &str) -> String {
  format!("Request: {prompt}\n\nRespond with a JSON filter object.")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extraction_prompt_embeds_conversation_text() {
    let prompt = build_extraction_prompt("user: hello");
    assert!(prompt.contains("user: hello"));
  }

  #[test]
  fn filter_prompt_embeds_request() {
    let prompt = build_filter_prompt("what do I know about the user's editor preferences?");
    assert!(prompt.contains("editor preferences"));
  }
}
