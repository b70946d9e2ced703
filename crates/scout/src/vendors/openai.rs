//! OpenAI-compatible embeddings client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{retry_backoff, should_retry, EmbeddingProvider};

/// Talks to any endpoint exposing the OpenAI `/embeddings` shape
#[derive(Clone)]
pub struct OpenAiEmbedder {
  client: Client,
  endpoint: String,
  model: String,
  dimensions: Option<usize>,
  max_retries: usize,
}

impl OpenAiEmbedder {
  pub fn new(
    api_key: &str,
    base_url: &str,
    model: &str,
    dimensions: Option<usize>,
    timeout: Duration,
    max_retries: usize,
  ) -> Result<Self> {
    anyhow::ensure!(!api_key.trim().is_empty(), "missing embeddings API key");
    anyhow::ensure!(!model.trim().is_empty(), "missing embeddings model name");

    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid embeddings API key")?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let client = Client::builder()
      .timeout(timeout)
      .default_headers(headers)
      .build()
      .context("failed to build embeddings HTTP client")?;

    Ok(Self {
      client,
      endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
      model: model.to_string(),
      dimensions,
      max_retries: max_retries.max(1),
    })
  }

  fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
  }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
  fn model(&self) -> String {
    self.model.clone()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let request = EmbeddingRequest { model: &self.model, input: [text], dimensions: self.dimensions };

    let mut attempt = 0usize;
    loop {
      match self.client.post(&self.endpoint).json(&request).send().await {
        Ok(resp) => {
          let status = resp.status();
          if status.is_success() {
            let parsed: EmbeddingResponse =
              resp.json().await.context("failed to parse embedding response")?;
            return parsed.into_single();
          }

          let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
          if should_retry(status) && attempt + 1 < self.max_retries {
            attempt += 1;
            warn!(status = %status, attempt, "Embedding request throttled, retrying");
            tokio::time::sleep(retry_backoff(attempt)).await;
            continue;
          }
          anyhow::bail!("embeddings request failed ({}): {}", status, body);
        }
        Err(err) => {
          if Self::is_retryable_error(&err) && attempt + 1 < self.max_retries {
            attempt += 1;
            debug!(error = %err, attempt, "Embedding transport error, retrying");
            tokio::time::sleep(retry_backoff(attempt)).await;
            continue;
          }
          return Err(err.into());
        }
      }
    }
  }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: [&'a str; 1],
  #[serde(skip_serializing_if = "Option::is_none")]
  dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
  #[serde(default)]
  index: usize,
}

impl EmbeddingResponse {
  fn into_single(mut self) -> Result<Vec<f32>> {
    self.data.sort_by_key(|entry| entry.index);
    anyhow::ensure!(self.data.len() == 1, "expected 1 embedding, got {}", self.data.len());
    let embedding = self.data.remove(0).embedding;
    anyhow::ensure!(!embedding.is_empty(), "embedding response contained an empty vector");
    Ok(embedding)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_endpoint_is_joined_without_double_slash() {
    let embedder =
      OpenAiEmbedder::new("sk-test", "https://api.example.com/v1/", "text-embedding-3-small", None, Duration::from_secs(5), 3)
        .unwrap();
    assert_eq!(embedder.endpoint, "https://api.example.com/v1/embeddings");
    assert_eq!(embedder.model(), "text-embedding-3-small");
  }

  #[test]
  fn test_blank_key_is_rejected() {
    assert!(OpenAiEmbedder::new(" ", "https://api.example.com/v1", "m", None, Duration::from_secs(5), 3).is_err());
  }

  #[test]
  fn test_request_omits_unset_dimensions() {
    let request = EmbeddingRequest { model: "m", input: ["hello"], dimensions: None };
    assert_eq!(serde_json::to_value(&request).unwrap(), json!({"model": "m", "input": ["hello"]}));
  }

  #[test]
  fn test_response_must_hold_one_vector() {
    let single: EmbeddingResponse =
      serde_json::from_value(json!({"data": [{"embedding": [0.1, 0.2], "index": 0}]})).unwrap();
    assert_eq!(single.into_single().unwrap(), vec![0.1, 0.2]);

    let empty: EmbeddingResponse = serde_json::from_value(json!({"data": []})).unwrap();
    assert!(empty.into_single().is_err());
  }
}
