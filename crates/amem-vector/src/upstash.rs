use amem_core::{Filter, MemoryId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::VectorBackend;
use crate::error::{BackendError, Result};
use crate::filter_compile::compile_upstash;
use crate::record::{VectorMatch, VectorRecord};

/// Client for an Upstash Vector index, addressed via its REST endpoint and
/// read-write token.
#[derive(Debug, Clone)]
pub struct UpstashBackend {
  client: reqwest::Client,
  url: String,
  token: String,
  dimensions: usize,
}

impl UpstashBackend {
  pub fn new(url: impl Into<String>, token: impl Into<String>, dimensions: usize) -> Self {
    Self {
      client: reqwest::Client::new(),
      url: url.into(),
      token: token.into(),
      dimensions,
    }
  }

  pub fn from_env() -> Option<Self> {
    let url = std::env::var("UPSTASH_VECTOR_REST_URL").ok()?;
    let token = std::env::var("UPSTASH_VECTOR_REST_TOKEN").ok()?;
    Some(Self::new(url, token, 1536))
  }

  async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(&self, path: &str, body: &Req) -> Result<Resp> {
    let response = self
      .client
      .post(format!("{}/{}", self.url.trim_end_matches('/'), path))
      .header("Authorization", format!("Bearer {}", self.token))
      .json(body)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      warn!("upstash {} returned {}: {}", path, status, body);
      return Err(BackendError::Provider {
        service: "upstash",
        status,
        body,
      });
    }

    Ok(response.json::<Envelope<Resp>>().await?.result)
  }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  result: T,
}

#[derive(Debug, Serialize)]
struct UpsertBody {
  id: String,
  vector: Vec<f32>,
  metadata: Value,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
  vector: &'a [f32],
  #[serde(rename = "topK")]
  top_k: usize,
  #[serde(rename = "includeMetadata")]
  include_metadata: bool,
  #[serde(skip_serializing_if = "str::is_empty")]
  filter: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryHit {
  id: String,
  score: f32,
  #[serde(default)]
  metadata: Value,
}

#[derive(Debug, Serialize)]
struct UpdateBody {
  id: String,
  metadata: Value,
}

#[derive(Debug, Serialize)]
struct DeleteBody {
  ids: Vec<String>,
}

#[async_trait]
impl VectorBackend for UpstashBackend {
  fn tag(&self) -> &'static str {
    "upstash"
  }

  async fn upsert(&self, record: VectorRecord) -> Result<()> {
    debug!("upstash upsert {}", record.id);
    let body = UpsertBody {
      id: record.id.to_string(),
      vector: record.embedding,
      metadata: record.metadata,
    };
    self.post::<_, Value>("upsert", &body).await?;
    Ok(())
  }

  async fn query(&self, embedding: &[f32], filter: &Filter, scope: &str, top_k: usize) -> Result<Vec<VectorMatch>> {
    let compiled = compile_upstash(filter, scope);
    let body = QueryBody {
      vector: embedding,
      top_k,
      include_metadata: true,
      filter: &compiled,
    };
    let hits: Vec<QueryHit> = self.post("query", &body).await?;
    hits_to_matches(hits)
  }

  async fn query_by_metadata(&self, filter: &Filter, scope: &str, limit: usize) -> Result<Vec<VectorMatch>> {
    let zero = vec![0.0_f32; self.dimensions];
    self.query(&zero, filter, scope, limit).await
  }

  async fn update_metadata(&self, id: MemoryId, metadata: Value) -> Result<()> {
    let body = UpdateBody {
      id: id.to_string(),
      metadata,
    };
    self.post::<_, Value>("update", &body).await?;
    Ok(())
  }

  async fn delete(&self, id: MemoryId) -> Result<()> {
    let body = DeleteBody { ids: vec![id.to_string()] };
    self.post::<_, Value>("delete", &body).await?;
    Ok(())
  }
}

fn hits_to_matches(hits: Vec<QueryHit>) -> Result<Vec<VectorMatch>> {
  hits
    .into_iter()
    .map(|hit| {
      let id = hit
        .id
        .parse::<MemoryId>()
        .map_err(|e| BackendError::Malformed(format!("upstash id {}: {e}", hit.id)))?;
      Ok(VectorMatch {
        id,
        score: hit.score,
        metadata: hit.metadata,
      })
    })
    .collect()
}
