use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("remote cache transport: {0}")]
  Remote(String),

  #[error("serialization: {0}")]
  Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
