// Resilient embedder wrapper with retries and backoff.
//
// - Exponential backoff with jitter
// - Retries on provider errors carrying 429/502/503/504 and on timeouts
// - Network errors are retried; other provider errors are not

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::traits::Embedder;

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
  pub backoff_multiplier: f64,
  pub add_jitter: bool,
  pub request_timeout: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(30),
      backoff_multiplier: 2.0,
      add_jitter: true,
      request_timeout: Duration::from_secs(60),
    }
  }
}

impl RetryConfig {
  pub fn for_cloud() -> Self {
    Self {
      max_retries: 5,
      initial_backoff: Duration::from_secs(1),
      max_backoff: Duration::from_secs(60),
      backoff_multiplier: 2.0,
      add_jitter: true,
      request_timeout: Duration::from_secs(120),
    }
  }

  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
    let mut backoff = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

    if self.add_jitter {
      let jitter_factor = 1.0 + (jitter_fraction() * 0.25);
      backoff = Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor);
    }

    backoff.min(self.max_backoff)
  }
}

fn jitter_fraction() -> f64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
  (nanos as f64 / u32::MAX as f64).fract()
}

pub fn is_retryable_error(error: &LlmError) -> bool {
  match error {
    LlmError::Network(_) => true,
    LlmError::Timeout => true,
    LlmError::ProviderError(msg) => {
      msg.contains("429") || msg.contains("502") || msg.contains("503") || msg.contains("504")
    }
    _ => false,
  }
}

/// Wraps an `Embedder` with retry-with-backoff around `embed`/`embed_batch`.
pub struct ResilientEmbedder<E: Embedder> {
  inner: E,
  config: RetryConfig,
}

impl<E: Embedder> ResilientEmbedder<E> {
  pub fn new(inner: E) -> Self {
    Self {
      inner,
      config: RetryConfig::default(),
    }
  }

  pub fn with_config(inner: E, config: RetryConfig) -> Self {
    Self { inner, config }
  }

  async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let backoff = self.config.backoff_for_attempt(attempt - 1);
        debug!("retry attempt {} after {:?}", attempt, backoff);
        sleep(backoff).await;
      }

      match tokio::time::timeout(self.config.request_timeout, self.inner.embed(text)).await {
        Ok(Ok(result)) => return Ok(result),
        Ok(Err(e)) => {
          if is_retryable_error(&e) && attempt < self.config.max_retries {
            warn!("retryable error on attempt {}: {}", attempt + 1, e);
            last_error = Some(e);
            continue;
          }
          return Err(e);
        }
        Err(_) => {
          warn!("embed request timed out on attempt {}", attempt + 1);
          last_error = Some(LlmError::Timeout);
        }
      }
    }

    Err(last_error.unwrap_or_else(|| LlmError::ProviderError("max retries exceeded".to_string())))
  }
}

#[async_trait]
impl<E: Embedder> Embedder for ResilientEmbedder<E> {
  fn model_id(&self) -> &str {
    self.inner.model_id()
  }

  fn dimensions(&self) -> usize {
    self.inner.dimensions()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    self.embed_with_retry(text).await
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
    let mut results = Vec::with_capacity(texts.len());
    for text in texts {
      results.push(self.embed_with_retry(text).await?);
    }
    Ok(results)
  }
}
