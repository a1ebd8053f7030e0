pub mod error;
pub mod json;
pub mod prompts;
pub mod reqwest_clients;
pub mod resilient;
pub mod traits;

pub use error::{LlmError, Result};
pub use json::parse_json;
pub use reqwest_clients::{HttpEmbedder, HttpExtractionLlm, HttpRetrievalLlm};
pub use resilient::{RetryConfig, ResilientEmbedder, is_retryable_error};
pub use traits::{DraftCandidate, DraftOperation, Embedder, ExtractionLlm, RetrievalLlm};
