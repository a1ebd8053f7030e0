use thiserror::Error;

/// Fatal-at-startup errors only; everything else degrades gracefully per
/// §7's error-handling policy instead of surfacing here.
#[derive(Error, Debug)]
pub enum Error {
  #[error("missing backend credentials: {0}")]
  Config(String),

  #[error("retrieval: {0}")]
  Retrieval(#[from] amem_retrieval::RetrievalError),

  #[error("vector backend: {0}")]
  Backend(#[from] amem_vector::BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
