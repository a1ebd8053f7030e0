use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("provider error: {0}")]
  ProviderError(String),

  #[error("network error: {0}")]
  Network(String),

  #[error("request timed out")]
  Timeout,

  #[error("failed to parse JSON response: {0}")]
  ParseError(#[from] serde_json::Error),

  #[error("provider not available")]
  NotAvailable,
}

pub type Result<T> = std::result::Result<T, LlmError>;
