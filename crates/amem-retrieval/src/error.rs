use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
  #[error("vector backend: {0}")]
  Backend(#[from] amem_vector::BackendError),

  #[error("llm: {0}")]
  Llm(#[from] amem_llm::LlmError),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
