//! Two-stage search: vector recall, then reranking

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{Result, ScoutError};
use crate::index::EmbeddingIndex;
use crate::models::{RankingSource, SearchQuery, SearchResult};
use crate::rerank::Reranker;

pub struct HybridRetriever {
  index: Arc<EmbeddingIndex>,
  reranker: Reranker,
}

impl HybridRetriever {
  pub fn new(index: Arc<EmbeddingIndex>, reranker: Reranker) -> Self {
    Self { index, reranker }
  }

  pub fn reranker_enabled(&self) -> bool {
    self.reranker.is_enabled()
  }

  /// Run a query through both stages
  ///
  /// Invalid parameters are rejected before any vendor call. If the query
  /// cannot be embedded the result is empty with `RankingSource::Unavailable`;
  /// a failed rerank keeps the vector order. Only a dimension mismatch or a
  /// storage failure surfaces as an error.
  pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
    query.validate()?;
    let started = Instant::now();

    let candidates = match self.index.search(&query.text, query.fanout).await {
      Ok(candidates) => candidates,
      Err(ScoutError::EmbeddingUnavailable(message)) => {
        warn!(stage = "embed_query", error = %message, "Query embedding unavailable");
        return Ok(SearchResult::unavailable());
      }
      Err(err) => return Err(err),
    };
    let recalled = candidates.len();

    let outcome = self.reranker.rerank(&query.text, candidates).await;
    let mut hits = outcome.hits;
    hits.truncate(query.top_k);

    let ranking = if outcome.reranked { RankingSource::Reranked } else { RankingSource::EmbeddingOrder };
    info!(
      recalled,
      returned = hits.len(),
      ranking = ?ranking,
      elapsed_ms = started.elapsed().as_millis() as u64,
      "Search complete"
    );
    Ok(SearchResult { hits, ranking })
  }
}
