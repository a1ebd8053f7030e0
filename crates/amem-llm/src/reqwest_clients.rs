use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::json::parse_json;
use crate::prompts::{EXTRACTION_SYSTEM_PROMPT, FILTER_SYSTEM_PROMPT, build_extraction_prompt, build_filter_prompt};
use crate::traits::{DraftCandidate, Embedder, ExtractionLlm, RetrievalLlm};

const DEFAULT_EMBEDDING_URL: &str = "https://openrouter.ai/api/v1/embeddings";
const DEFAULT_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";

/// Embedding provider backed by an OpenRouter-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
  client: reqwest::Client,
  url: String,
  api_key: String,
  model: String,
  dimensions: usize,
}

impl HttpEmbedder {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: DEFAULT_EMBEDDING_URL.to_string(),
      api_key: api_key.into(),
      model: DEFAULT_EMBEDDING_MODEL.to_string(),
      dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
    }
  }

  pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
    self.model = model.into();
    self.dimensions = dimensions;
    self
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = url.into();
    self
  }

  pub fn from_env() -> Option<Self> {
    std::env::var("OPENROUTER_API_KEY").ok().map(Self::new)
  }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
  Single(&'a str),
  Batch(Vec<&'a str>),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    debug!("embedding {} chars", text.len());
    let request = EmbeddingRequest {
      model: &self.model,
      input: EmbeddingInput::Single(text),
    };
    let result: EmbeddingResponse = self.post(&request).await?;
    result.data.into_iter().next().map(|d| d.embedding).ok_or_else(|| {
      LlmError::ProviderError("no embedding in response".into())
    })
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }
    let request = EmbeddingRequest {
      model: &self.model,
      input: EmbeddingInput::Batch(texts.to_vec()),
    };
    let result: EmbeddingResponse = self.post(&request).await?;
    Ok(result.data.into_iter().map(|d| d.embedding).collect())
  }
}

impl HttpEmbedder {
  async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(&self, body: &Req) -> Result<Resp> {
    let response = self
      .client
      .post(&self.url)
      .header("Authorization", format!("Bearer {}", self.api_key))
      .json(body)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let text = response.text().await.unwrap_or_default();
      warn!("embedding endpoint returned {}: {}", status, text);
      return Err(LlmError::ProviderError(format!("{status}: {text}")));
    }

    Ok(response.json().await?)
  }
}

/// Chat-completion client shared by the extraction and retrieval-filter LLMs:
/// both send a system+user prompt and tolerantly JSON-parse the text reply.
#[derive(Debug, Clone)]
struct ChatClient {
  client: reqwest::Client,
  url: String,
  api_key: String,
  model: String,
}

impl ChatClient {
  fn new(api_key: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: DEFAULT_CHAT_URL.to_string(),
      api_key: api_key.into(),
      model: DEFAULT_CHAT_MODEL.to_string(),
    }
  }

  async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
    let request = ChatRequest {
      model: &self.model,
      messages: vec![
        ChatMessage {
          role: "system",
          content: system_prompt,
        },
        ChatMessage {
          role: "user",
          content: user_prompt,
        },
      ],
    };

    let response = self
      .client
      .post(&self.url)
      .header("Authorization", format!("Bearer {}", self.api_key))
      .json(&request)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let text = response.text().await.unwrap_or_default();
      warn!("chat completion endpoint returned {}: {}", status, text);
      return Err(LlmError::ProviderError(format!("{status}: {text}")));
    }

    let parsed: ChatResponse = response.json().await?;
    parsed
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .ok_or_else(|| LlmError::ProviderError("no choices in chat response".into()))
  }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
  content: String,
}

/// Extraction LLM backed by an OpenRouter-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpExtractionLlm {
  chat: ChatClient,
}

impl HttpExtractionLlm {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      chat: ChatClient::new(api_key),
    }
  }

  pub fn from_env() -> Option<Self> {
    std::env::var("OPENROUTER_API_KEY").ok().map(Self::new)
  }
}

#[async_trait]
impl ExtractionLlm for HttpExtractionLlm {
  async fn extract_drafts(&self, conversation_text: &str) -> Result<Vec<DraftCandidate>> {
    let prompt = build_extraction_prompt(conversation_text);
    let text = self.chat.complete(EXTRACTION_SYSTEM_PROMPT, &prompt).await?;
    Ok(parse_json(&text)?)
  }
}

/// Retrieval filter LLM backed by an OpenRouter-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpRetrievalLlm {
  chat: ChatClient,
}

impl HttpRetrievalLlm {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      chat: ChatClient::new(api_key),
    }
  }

  pub fn from_env() -> Option<Self> {
    std::env::var("OPENROUTER_API_KEY").ok().map(Self::new)
  }
}

#[async_trait]
impl RetrievalLlm for HttpRetrievalLlm {
  async fn build_filter(&self, prompt: &str) -> Result<amem_core::Filter> {
    let user_prompt = build_filter_prompt(prompt);
    let text = self.chat.complete(FILTER_SYSTEM_PROMPT, &user_prompt).await?;
    Ok(parse_json(&text)?)
  }
}
