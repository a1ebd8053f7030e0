use amem_core::{Filter, MemoryId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::VectorBackend;
use crate::error::{BackendError, Result};
use crate::filter_compile::compile_pinecone;
use crate::record::{VectorMatch, VectorRecord};

/// Client for a Pinecone index, addressed via its per-index host and API key.
#[derive(Debug, Clone)]
pub struct PineconeBackend {
  client: reqwest::Client,
  host: String,
  api_key: String,
  dimensions: usize,
}

impl PineconeBackend {
  pub fn new(host: impl Into<String>, api_key: impl Into<String>, dimensions: usize) -> Self {
    Self {
      client: reqwest::Client::new(),
      host: host.into(),
      api_key: api_key.into(),
      dimensions,
    }
  }

  pub fn from_env() -> Option<Self> {
    let host = std::env::var("PINECONE_HOST").ok()?;
    let api_key = std::env::var("PINECONE_API_KEY").ok()?;
    Some(Self::new(host, api_key, 1536))
  }

  async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(&self, path: &str, body: &Req) -> Result<Resp> {
    let response = self
      .client
      .post(format!("{}/{}", self.host.trim_end_matches('/'), path))
      .header("Api-Key", &self.api_key)
      .header("Content-Type", "application/json")
      .json(body)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      warn!("pinecone {} returned {}: {}", path, status, body);
      return Err(BackendError::Provider {
        service: "pinecone",
        status,
        body,
      });
    }

    Ok(response.json().await?)
  }

  /// Integrated-records upsert (§4.1): when a caller has no embedding to
  /// send, Pinecone treats `summary` as the text body and computes the
  /// embedding itself against the index's configured field map.
  async fn upsert_integrated(&self, record: VectorRecord, namespace: &str) -> Result<()> {
    let fields = integrated_record_fields(&record)?;
    let line = serde_json::to_string(&fields).map_err(|e| BackendError::Malformed(e.to_string()))?;

    let response = self
      .client
      .post(format!("{}/records/namespaces/{}/upsert", self.host.trim_end_matches('/'), namespace))
      .header("Api-Key", &self.api_key)
      .header("Content-Type", "application/x-ndjson")
      .body(line)
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      warn!("pinecone records/upsert returned {}: {}", status, body);
      return Err(BackendError::Provider {
        service: "pinecone",
        status,
        body,
      });
    }

    Ok(())
  }
}

#[derive(Debug, Serialize)]
struct Vector {
  id: String,
  values: Vec<f32>,
  metadata: Value,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
  vectors: Vec<Vector>,
  namespace: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
  vector: &'a [f32],
  #[serde(rename = "topK")]
  top_k: usize,
  #[serde(rename = "includeMetadata")]
  include_metadata: bool,
  filter: Value,
  namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
  matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
  id: String,
  score: f32,
  #[serde(default)]
  metadata: Value,
}

#[derive(Debug, Serialize)]
struct UpdateRequest {
  id: String,
  #[serde(rename = "setMetadata")]
  set_metadata: Value,
  namespace: String,
}

#[derive(Debug, Serialize)]
struct DeleteRequest {
  ids: Vec<String>,
  namespace: String,
}

#[async_trait]
impl VectorBackend for PineconeBackend {
  fn tag(&self) -> &'static str {
    "pinecone"
  }

  async fn upsert(&self, record: VectorRecord) -> Result<()> {
    debug!("pinecone upsert {}", record.id);
    let namespace = record
      .metadata
      .get("namespace")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string();

    if record.embedding.is_empty() {
      return self.upsert_integrated(record, &namespace).await;
    }

    let body = UpsertRequest {
      vectors: vec![Vector {
        id: record.id.to_string(),
        values: record.embedding,
        metadata: record.metadata,
      }],
      namespace,
    };
    self.post::<_, Value>("vectors/upsert", &body).await?;
    Ok(())
  }

  async fn query(&self, embedding: &[f32], filter: &Filter, scope: &str, top_k: usize) -> Result<Vec<VectorMatch>> {
    let body = QueryRequest {
      vector: embedding,
      top_k,
      include_metadata: true,
      filter: compile_pinecone(filter, scope),
      namespace: scope,
    };
    let response: QueryResponse = self.post("query", &body).await?;
    matches_to_hits(response.matches)
  }

  async fn query_by_metadata(&self, filter: &Filter, scope: &str, limit: usize) -> Result<Vec<VectorMatch>> {
    let zero = vec![0.0_f32; self.dimensions];
    self.query(&zero, filter, scope, limit).await
  }

  async fn update_metadata(&self, id: MemoryId, metadata: Value) -> Result<()> {
    let namespace = metadata.get("namespace").and_then(Value::as_str).unwrap_or_default().to_string();
    let body = UpdateRequest {
      id: id.to_string(),
      set_metadata: metadata,
      namespace,
    };
    self.post::<_, Value>("vectors/update", &body).await?;
    Ok(())
  }

  async fn delete(&self, id: MemoryId) -> Result<()> {
    let body = DeleteRequest {
      ids: vec![id.to_string()],
      namespace: String::new(),
    };
    self.post::<_, Value>("vectors/delete", &body).await?;
    Ok(())
  }
}

/// Builds the NDJSON record for an integrated-records upsert: the stored
/// metadata plus Pinecone's `_id` and `text` fields.
fn integrated_record_fields(record: &VectorRecord) -> Result<Value> {
  let text = record.metadata.get("summary").and_then(Value::as_str).unwrap_or_default().to_string();
  let mut fields = record.metadata.clone();
  let Value::Object(ref mut map) = fields else {
    return Err(BackendError::Malformed(format!("record {} metadata is not an object", record.id)));
  };
  map.insert("_id".to_string(), Value::String(record.id.to_string()));
  map.insert("text".to_string(), Value::String(text));
  Ok(fields)
}

fn matches_to_hits(matches: Vec<QueryMatch>) -> Result<Vec<VectorMatch>> {
  matches
    .into_iter()
    .map(|m| {
      let id = m
        .id
        .parse::<MemoryId>()
        .map_err(|e| BackendError::Malformed(format!("pinecone id {}: {e}", m.id)))?;
      Ok(VectorMatch {
        id,
        score: m.score,
        metadata: m.metadata,
      })
    })
    .collect()
}
