use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
  #[error("vector backend: {0}")]
  Backend(#[from] amem_vector::BackendError),

  #[error("llm: {0}")]
  Llm(#[from] amem_llm::LlmError),

  #[error("draft rejected: {0}")]
  InvalidDraft(String),

  #[error("update/delete targeted an id not found in this scope: {0}")]
  TargetNotFound(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
