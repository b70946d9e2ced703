//! External capabilities consumed by the pipeline
//!
//! Discovery, extraction, embedding and reranking are provided by outside
//! vendors. Each is a trait here so the orchestrator and the retrieval
//! components can be exercised against mocks, and so backends can be swapped
//! for evaluation. Implementations return `anyhow::Result`; callers wrap every
//! call in `with_timeout`, which converts both errors and elapsed timers into
//! `ScoutError::VendorUnavailable`.

pub mod anthropic;
pub mod openai;
pub mod scraper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Capability, Result, ScoutError};
use crate::models::{AcquisitionTarget, ExtractionBatch, ProfileStub};

pub use anthropic::AnthropicReranker;
pub use openai::OpenAiEmbedder;
pub use scraper::ScraperClient;

/// Cheap, approximate candidate discovery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
  /// Return at most `target.max_items` stubs (vendors may overcount)
  async fn discover(&self, target: &AcquisitionTarget) -> anyhow::Result<Vec<ProfileStub>>;
}

/// Full-profile extraction, priced per thousand items
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
  async fn extract(&self, raw_identifiers: &[String]) -> anyhow::Result<ExtractionBatch>;
}

/// Text to fixed-dimension vector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  /// Model name recorded next to stored vectors
  fn model(&self) -> String;

  async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Generative reranking over one candidate batch
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RerankProvider: Send + Sync {
  /// Judge the batch; `index` in each judgement refers to `candidates[index]`
  async fn rank(&self, query: &str, candidates: &[RerankCandidate]) -> anyhow::Result<Vec<RerankJudgement>>;
}

/// Salient attributes of one candidate as sent to the reranker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankCandidate {
  pub index: usize,
  pub canonical_id: String,
  pub summary: String,
}

/// One entry of the reranker's ordering, most relevant first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankJudgement {
  pub index: usize,
  pub score: f32,
  #[serde(default)]
  pub rationale: Option<String>,
}

pub type SharedDiscovery = Arc<dyn DiscoveryProvider>;
pub type SharedExtraction = Arc<dyn ExtractionProvider>;
pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;
pub type SharedReranker = Arc<dyn RerankProvider>;

/// Run a vendor call under a deadline
pub async fn with_timeout<T, F>(capability: Capability, limit: Duration, call: F) -> Result<T>
where
  F: Future<Output = anyhow::Result<T>>,
{
  match tokio::time::timeout(limit, call).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(err)) => Err(ScoutError::vendor(capability, format!("{err:#}"))),
    Err(_) => Err(ScoutError::vendor(
      capability,
      format!("timed out after {}ms", limit.as_millis()),
    )),
  }
}

/// Read a secret from the named environment variable
pub fn api_key_from_env(var: &str) -> anyhow::Result<String> {
  match std::env::var(var) {
    Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
    _ => Err(anyhow::anyhow!("{} is not set", var)),
  }
}

/// Exponential backoff shared by the HTTP clients: 500ms, 1s, 2s, ... capped at 16s
pub(crate) fn retry_backoff(attempt: usize) -> Duration {
  let capped = attempt.min(5) as u32;
  Duration::from_millis(500 * (1 << capped))
}

pub(crate) fn should_retry(status: reqwest::StatusCode) -> bool {
  status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[tokio::test]
  async fn test_timeout_maps_to_vendor_unavailable() {
    let result: Result<()> = with_timeout(Capability::Rerank, Duration::from_millis(10), async {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(())
    })
    .await;

    match result {
      Err(ScoutError::VendorUnavailable { capability, message }) => {
        assert_eq!(capability, Capability::Rerank);
        assert!(message.contains("timed out"));
      }
      other => panic!("expected VendorUnavailable, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_vendor_error_is_wrapped_with_capability() {
    let result: Result<u32> = with_timeout(Capability::Discovery, Duration::from_secs(1), async {
      Err(anyhow::anyhow!("502 Bad Gateway"))
    })
    .await;
    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("discovery vendor unavailable"));
  }

  #[test]
  fn test_backoff_doubles_and_caps() {
    assert_eq!(retry_backoff(1), Duration::from_millis(1000));
    assert_eq!(retry_backoff(2), Duration::from_millis(2000));
    assert_eq!(retry_backoff(9), Duration::from_millis(16000));
  }

  #[test]
  #[serial]
  fn test_api_key_from_env() {
    std::env::set_var("SCOUT_TEST_API_KEY", "  sk-test ");
    assert_eq!(api_key_from_env("SCOUT_TEST_API_KEY").unwrap(), "sk-test");
    std::env::remove_var("SCOUT_TEST_API_KEY");
    assert!(api_key_from_env("SCOUT_TEST_API_KEY").is_err());
  }
}
