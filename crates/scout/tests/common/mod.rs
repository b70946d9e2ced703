//! Hand-written vendor fakes shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use scout::models::{AcquisitionTarget, Attributes, CandidateProfile, ExtractedProfile, ExtractionBatch, ProfileStub};
use scout::vendors::{
  DiscoveryProvider, EmbeddingProvider, ExtractionProvider, RerankCandidate, RerankJudgement, RerankProvider,
};

/// Discovery keyed by target value; unknown values fail
#[derive(Default)]
pub struct FakeDiscovery {
  results: HashMap<String, Vec<String>>,
  pub calls: Mutex<Vec<String>>,
}

impl FakeDiscovery {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, value: &str, identifiers: &[&str]) -> Self {
    self.results.insert(value.to_string(), identifiers.iter().map(|s| s.to_string()).collect());
    self
  }

  pub fn with_generated(mut self, value: &str, prefix: &str, count: usize) -> Self {
    self.results.insert(value.to_string(), (0..count).map(|i| format!("{prefix}{i}")).collect());
    self
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl DiscoveryProvider for FakeDiscovery {
  async fn discover(&self, target: &AcquisitionTarget) -> anyhow::Result<Vec<ProfileStub>> {
    self.calls.lock().unwrap().push(target.value.clone());
    match self.results.get(&target.value) {
      Some(ids) => Ok(ids.iter().map(ProfileStub::new).collect()),
      None => Err(anyhow::anyhow!("no results configured for {}", target.value)),
    }
  }
}

/// Extraction echoing the requested identifiers as profiles
#[derive(Default)]
pub struct FakeExtraction {
  /// Return at most this many profiles per call
  pub max_returned: Option<usize>,
  pub reported_cost: Option<f64>,
  pub fail: bool,
  pub calls: Mutex<Vec<Vec<String>>>,
}

impl FakeExtraction {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing() -> Self {
    Self { fail: true, ..Self::default() }
  }

  pub fn calls(&self) -> Vec<Vec<String>> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl ExtractionProvider for FakeExtraction {
  async fn extract(&self, raw_identifiers: &[String]) -> anyhow::Result<ExtractionBatch> {
    self.calls.lock().unwrap().push(raw_identifiers.to_vec());
    if self.fail {
      return Err(anyhow::anyhow!("extraction vendor returned 500"));
    }

    let take = self.max_returned.unwrap_or(raw_identifiers.len());
    let profiles = raw_identifiers
      .iter()
      .take(take)
      .map(|id| {
        let mut attributes = Attributes::new();
        attributes.insert("name".into(), json!(format!("Candidate {id}")));
        ExtractedProfile { raw_identifier: id.clone(), attributes }
      })
      .collect();
    Ok(ExtractionBatch { profiles, reported_cost: self.reported_cost })
  }
}

/// Embeddings looked up by exact text, with a fallback vector
pub struct TableEmbedder {
  pub model: String,
  vectors: HashMap<String, Vec<f32>>,
  fallback: Option<Vec<f32>>,
}

impl TableEmbedder {
  pub fn new(model: &str) -> Self {
    Self { model: model.to_string(), vectors: HashMap::new(), fallback: None }
  }

  pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
    self.vectors.insert(text.to_string(), vector);
    self
  }

  pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
    self.fallback = Some(vector);
    self
  }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
  fn model(&self) -> String {
    self.model.clone()
  }

  async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
    self
      .vectors
      .get(text)
      .cloned()
      .or_else(|| self.fallback.clone())
      .ok_or_else(|| anyhow::anyhow!("no vector for {text:?}"))
  }
}

/// Reranker that reverses its input, with descending scores
pub struct ReversingReranker {
  pub calls: Mutex<usize>,
}

impl ReversingReranker {
  pub fn new() -> Self {
    Self { calls: Mutex::new(0) }
  }
}

#[async_trait]
impl RerankProvider for ReversingReranker {
  async fn rank(&self, _query: &str, candidates: &[RerankCandidate]) -> anyhow::Result<Vec<RerankJudgement>> {
    *self.calls.lock().unwrap() += 1;
    let n = candidates.len();
    Ok(
      candidates
        .iter()
        .rev()
        .enumerate()
        .map(|(position, candidate)| RerankJudgement {
          index: candidate.index,
          score: (n - position) as f32 / n as f32,
          rationale: Some(format!("ranked {}", position + 1)),
        })
        .collect(),
    )
  }
}

/// Reranker that always errors
pub struct FailingReranker;

#[async_trait]
impl RerankProvider for FailingReranker {
  async fn rank(&self, _query: &str, _candidates: &[RerankCandidate]) -> anyhow::Result<Vec<RerankJudgement>> {
    Err(anyhow::anyhow!("rerank model overloaded"))
  }
}

/// Profile named `P{i}` ingested `i` minutes after a fixed epoch
pub fn numbered_profile(i: usize) -> CandidateProfile {
  let mut attributes = Attributes::new();
  attributes.insert("name".into(), json!(format!("P{i}")));
  let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(i as i64);
  CandidateProfile::ingested(format!("https://x/in/p{i}"), attributes, at)
}
