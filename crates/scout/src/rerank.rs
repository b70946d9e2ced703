//! Generative reranking with embedding-order fallback
//!
//! The whole shortlist goes to the provider in one call. The reply is only
//! trusted if it is a complete permutation of the shortlist with finite
//! scores; anything else, including a failed or timed-out call, passes the
//! input through unchanged with the vector similarity as relevance.

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Capability;
use crate::index::rerank_summary;
use crate::models::{ScoredProfile, SearchHit};
use crate::vendors::{with_timeout, RerankCandidate, RerankJudgement, SharedReranker};

/// Reranked hits plus whether the provider's order was used
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
  pub hits: Vec<SearchHit>,
  pub reranked: bool,
}

pub struct Reranker {
  provider: Option<SharedReranker>,
  timeout: Duration,
  summary_chars: usize,
}

impl Reranker {
  pub fn new(provider: SharedReranker, timeout: Duration, summary_chars: usize) -> Self {
    Self { provider: Some(provider), timeout, summary_chars }
  }

  /// A reranker that always keeps the embedding order
  pub fn passthrough() -> Self {
    Self { provider: None, timeout: Duration::ZERO, summary_chars: 0 }
  }

  pub fn is_enabled(&self) -> bool {
    self.provider.is_some()
  }

  pub async fn rerank(&self, query_text: &str, candidates: Vec<ScoredProfile>) -> RerankOutcome {
    let Some(provider) = self.provider.as_ref() else {
      return fallback(candidates);
    };
    if candidates.is_empty() {
      return fallback(candidates);
    }

    let batch: Vec<RerankCandidate> = candidates
      .iter()
      .enumerate()
      .map(|(index, scored)| RerankCandidate {
        index,
        canonical_id: scored.profile.canonical_id.clone(),
        summary: rerank_summary(&scored.profile, self.summary_chars),
      })
      .collect();

    let judgements = match with_timeout(Capability::Rerank, self.timeout, provider.rank(query_text, &batch)).await {
      Ok(judgements) => judgements,
      Err(err) => {
        warn!(stage = "rerank", candidates = candidates.len(), error = %err, "Reranking failed, keeping embedding order");
        return fallback(candidates);
      }
    };

    if let Err(reason) = validate_permutation(&judgements, candidates.len()) {
      warn!(stage = "rerank", candidates = candidates.len(), reason, "Malformed ranking, keeping embedding order");
      return fallback(candidates);
    }

    let mut slots: Vec<Option<ScoredProfile>> = candidates.into_iter().map(Some).collect();
    let hits = judgements
      .into_iter()
      .filter_map(|judgement| {
        slots[judgement.index].take().map(|scored| SearchHit {
          profile: scored.profile,
          relevance_score: judgement.score,
          similarity: scored.similarity,
          rationale: judgement.rationale.filter(|r| !r.trim().is_empty()),
        })
      })
      .collect::<Vec<_>>();

    debug!(hits = hits.len(), "Applied reranked order");
    RerankOutcome { hits, reranked: true }
  }
}

/// Input order with similarity as relevance
fn fallback(candidates: Vec<ScoredProfile>) -> RerankOutcome {
  let hits = candidates
    .into_iter()
    .map(|scored| SearchHit {
      relevance_score: scored.similarity,
      similarity: scored.similarity,
      profile: scored.profile,
      rationale: None,
    })
    .collect();
  RerankOutcome { hits, reranked: false }
}

/// Every index in `0..len` exactly once, with finite scores
fn validate_permutation(judgements: &[RerankJudgement], len: usize) -> std::result::Result<(), &'static str> {
  if judgements.len() != len {
    return Err("ranking does not cover every candidate");
  }
  let mut seen = HashSet::with_capacity(len);
  for judgement in judgements {
    if judgement.index >= len {
      return Err("ranking references an unknown candidate");
    }
    if !seen.insert(judgement.index) {
      return Err("ranking repeats a candidate");
    }
    if !judgement.score.is_finite() {
      return Err("ranking contains a non-finite score");
    }
  }
  Ok(())
}
