use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("http transport: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("{service} returned {status}: {body}")]
  Provider {
    service: &'static str,
    status: u16,
    body: String,
  },

  #[error("malformed vector record: {0}")]
  Malformed(String),

  #[error("no active backend bound")]
  NoActiveBackend,

  #[error("unknown backend tag: {0}")]
  UnknownTag(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;
