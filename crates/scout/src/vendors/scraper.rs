//! HTTP client for the scraping vendor
//!
//! One client implements both capabilities: `POST {base}/discover` returns
//! cheap stubs for a target, `POST {base}/extract` returns full attribute sets
//! for a list of identifiers and may report what the call cost.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{DiscoveryProvider, ExtractionProvider};
use crate::models::{AcquisitionTarget, ExtractionBatch, ProfileStub, TargetKind};

#[derive(Clone)]
pub struct ScraperClient {
  client: Client,
  base_url: String,
}

impl ScraperClient {
  pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
      let auth = format!("Bearer {}", token.trim());
      headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid scraper token")?);
    }

    let client = Client::builder()
      .timeout(timeout)
      .default_headers(headers)
      .build()
      .context("failed to build scraper HTTP client")?;

    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url, path)
  }

  async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
    let url = self.url(path);
    let resp = self
      .client
      .post(&url)
      .json(body)
      .send()
      .await
      .with_context(|| format!("failed to reach {url}"))?;

    let status = resp.status();
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
      bail!("scraper returned {} for {}: {}", status, path, text);
    }
    resp.json().await.with_context(|| format!("failed to parse scraper {path} response"))
  }
}

/// Discovery request in the vendor's terms
#[derive(Debug, Serialize, PartialEq)]
struct DiscoverRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  search_terms: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  location: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  company: Option<&'a str>,
  max_items: u32,
}

impl<'a> DiscoverRequest<'a> {
  fn for_target(target: &'a AcquisitionTarget) -> Self {
    let value = Some(target.value.as_str());
    let mut request = Self { search_terms: None, location: None, company: None, max_items: target.max_items };
    match target.kind {
      TargetKind::Query => request.search_terms = value,
      TargetKind::Location => request.location = value,
      TargetKind::CompanyFilter => request.company = value,
    }
    request
  }
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
  #[serde(alias = "results", alias = "items")]
  profiles: Vec<ProfileStub>,
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
  identifiers: &'a [String],
}

#[async_trait]
impl DiscoveryProvider for ScraperClient {
  async fn discover(&self, target: &AcquisitionTarget) -> Result<Vec<ProfileStub>> {
    let response: DiscoverResponse = self.post("discover", &DiscoverRequest::for_target(target)).await?;
    debug!(target = %target.label(), stubs = response.profiles.len(), "Discovery returned");
    Ok(response.profiles)
  }
}

#[async_trait]
impl ExtractionProvider for ScraperClient {
  async fn extract(&self, raw_identifiers: &[String]) -> Result<ExtractionBatch> {
    if raw_identifiers.is_empty() {
      return Ok(ExtractionBatch::default());
    }
    let batch: ExtractionBatch = self.post("extract", &ExtractRequest { identifiers: raw_identifiers }).await?;
    debug!(requested = raw_identifiers.len(), returned = batch.profiles.len(), "Extraction returned");
    Ok(batch)
  }
}
