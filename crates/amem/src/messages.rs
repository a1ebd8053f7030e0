/// Who sent a message in the conversation history `update_history` tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  User,
  Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
  pub role: Role,
  pub content: String,
}

impl ChatMessage {
  pub fn user(content: impl Into<String>) -> Self {
    Self {
      role: Role::User,
      content: content.into(),
    }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self {
      role: Role::Assistant,
      content: content.into(),
    }
  }
}

/// Whether the last two messages form a `(user, assistant)` pair ready for
/// ingestion, and if so, their text.
pub fn last_exchange(messages: &[ChatMessage]) -> Option<(&str, &str)> {
  let len = messages.len();
  if len < 2 {
    return None;
  }
  let user = &messages[len - 2];
  let assistant = &messages[len - 1];
  if user.role == Role::User && assistant.role == Role::Assistant {
    Some((&user.content, &assistant.content))
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_trailing_user_assistant_pair() {
    let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
    assert_eq!(last_exchange(&messages), Some(("hi", "hello")));
  }

  #[test]
  fn ignores_non_trailing_pairs() {
    let messages = vec![ChatMessage::assistant("hello"), ChatMessage::user("hi")];
    assert_eq!(last_exchange(&messages), None);
  }

  #[test]
  fn too_short_is_not_an_exchange() {
    let messages = vec![ChatMessage::user("hi")];
    assert_eq!(last_exchange(&messages), None);
  }
}
