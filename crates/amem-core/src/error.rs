use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("config: {0}")]
  Config(String),

  #[error("validation: {0}")]
  Validation(String),

  #[error("not found: {entity} {id}")]
  NotFound { entity: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
