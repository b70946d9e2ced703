//! Search queries and ranked results

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::profile::CandidateProfile;
use crate::error::{Result, ScoutError};

/// A free-text query with its two-stage sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
  pub text: String,
  /// Candidates retrieved by vector search before reranking
  pub fanout: usize,
  /// Candidates returned to the caller
  pub top_k: usize,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>, fanout: usize, top_k: usize) -> Self {
    Self { text: text.into(), fanout, top_k }
  }

  /// Reject malformed parameters before any external call is made
  pub fn validate(&self) -> Result<()> {
    if self.text.trim().is_empty() {
      return Err(ScoutError::InvalidQuery("query text is empty".to_string()));
    }
    if self.top_k == 0 {
      return Err(ScoutError::InvalidQuery("top_k must be at least 1".to_string()));
    }
    if self.fanout < self.top_k {
      return Err(ScoutError::InvalidQuery(format!(
        "fanout {} is smaller than top_k {}",
        self.fanout, self.top_k
      )));
    }
    Ok(())
  }
}

/// Vector-stage candidate
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProfile {
  pub profile: CandidateProfile,
  pub similarity: f32,
}

/// Final ranked entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
  pub profile: CandidateProfile,
  /// Reranker score, or the similarity when reranking was skipped
  pub relevance_score: f32,
  /// Vector-stage cosine similarity
  pub similarity: f32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rationale: Option<String>,
}

/// Which stage produced the final order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankingSource {
  Reranked,
  EmbeddingOrder,
  /// The query could not be embedded; no candidates were retrieved
  Unavailable,
}

/// Ordered hits; index 0 is most relevant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
  pub hits: Vec<SearchHit>,
  pub ranking: RankingSource,
}

impl SearchResult {
  pub fn unavailable() -> Self {
    Self { hits: Vec::new(), ranking: RankingSource::Unavailable }
  }

  pub fn canonical_ids(&self) -> Vec<&str> {
    self.hits.iter().map(|hit| hit.profile.canonical_id.as_str()).collect()
  }

  pub fn len(&self) -> usize {
    self.hits.len()
  }

  pub fn is_empty(&self) -> bool {
    self.hits.is_empty()
  }
}
