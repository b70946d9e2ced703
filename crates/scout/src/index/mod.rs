//! Embedding index over the persisted corpus
//!
//! Vectors live in the corpus store next to their profile, tagged with the
//! model that produced them. Search is an exact cosine scan over the vectors
//! of the active model, cached in memory and re-read whenever the store's
//! vector count for that model changes.

pub mod projection;
pub mod similarity;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Capability, Result, ScoutError};
use crate::models::{CandidateProfile, ScoredProfile};
use crate::store::SharedCorpusStore;
use crate::vendors::{with_timeout, SharedEmbedder};

pub use projection::{profile_text, rerank_summary};
pub use similarity::cosine_similarity;

/// Outcome of an embedding backfill pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
  pub attempted: usize,
  pub embedded: usize,
  pub failed: usize,
}

pub struct EmbeddingIndex {
  store: SharedCorpusStore,
  embedder: SharedEmbedder,
  model: String,
  dimension: usize,
  timeout: Duration,
  cache: RwLock<Option<CachedVectors>>,
}

/// Embedded profiles of the active model as last read from the store
struct CachedVectors {
  /// Store-side vector count at load time
  stored: usize,
  entries: Vec<CandidateProfile>,
}

impl EmbeddingIndex {
  pub fn new(store: SharedCorpusStore, embedder: SharedEmbedder, dimension: usize, timeout: Duration) -> Self {
    let model = embedder.model();
    Self { store, embedder, model, dimension, timeout, cache: RwLock::new(None) }
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }

  fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
    if embedding.len() != self.dimension {
      return Err(ScoutError::DimensionMismatch { expected: self.dimension, actual: embedding.len() });
    }
    Ok(())
  }

  async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
    let embedding = with_timeout(Capability::Embedding, self.timeout, self.embedder.embed(text))
      .await
      .map_err(|e| ScoutError::EmbeddingUnavailable(e.to_string()))?;
    self.check_dimension(&embedding)?;
    Ok(embedding)
  }

  /// Embed a stored profile's projection and persist the vector
  ///
  /// On `EmbeddingUnavailable` the profile stays in the corpus without a
  /// vector and is picked up by a later `backfill`.
  pub async fn embed_and_store(&self, profile: &CandidateProfile) -> Result<CandidateProfile> {
    let embedding = self.embed_text(&profile_text(profile)).await?;
    self.store.set_embedding(&profile.canonical_id, &embedding, &self.model).await?;
    self.reload().await;

    debug!(canonical_id = %profile.canonical_id, model = %self.model, "Stored embedding");
    Ok(CandidateProfile { embedding: Some(embedding), ..profile.clone() })
  }

  /// Drop the cached vectors so the next search re-reads the store
  async fn reload(&self) {
    *self.cache.write().await = None;
  }

  /// Re-read the store when its vector count for the active model moved
  ///
  /// An `acquire` or `backfill` in another process writes to the same store
  /// as a running server.
  async fn ensure_fresh(&self) -> Result<()> {
    let stored = self.store.stats().await?.models.get(&self.model).copied().unwrap_or(0);
    if self.cache.read().await.as_ref().is_some_and(|cached| cached.stored == stored) {
      return Ok(());
    }

    let entries = self.store.embedded_profiles(&self.model).await?;
    for entry in &entries {
      if let Some(embedding) = &entry.embedding {
        self.check_dimension(embedding)?;
      }
    }
    debug!(vectors = entries.len(), model = %self.model, "Loaded embedding index");
    *self.cache.write().await = Some(CachedVectors { stored: entries.len(), entries });
    Ok(())
  }

  /// The `fanout` nearest profiles to `query_text`, most similar first
  ///
  /// Ties are broken by `ingested_at` ascending, then by canonical id.
  pub async fn search(&self, query_text: &str, fanout: usize) -> Result<Vec<ScoredProfile>> {
    let query = self.embed_text(query_text).await?;
    self.ensure_fresh().await?;

    let cache = self.cache.read().await;
    let entries = cache.as_ref().map(|cached| cached.entries.as_slice()).unwrap_or_default();

    let mut scored = Vec::with_capacity(entries.len());
    for entry in entries {
      let Some(embedding) = entry.embedding.as_deref() else { continue };
      let similarity = cosine_similarity(&query, embedding)?;
      scored.push(ScoredProfile { profile: entry.clone(), similarity });
    }

    scored.sort_by(|a, b| {
      b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.profile.ingested_at.cmp(&b.profile.ingested_at))
        .then_with(|| a.profile.canonical_id.cmp(&b.profile.canonical_id))
    });
    scored.truncate(fanout);
    Ok(scored)
  }

  /// Embed up to `limit` stored profiles that have no vector for the active model
  pub async fn backfill(&self, limit: usize) -> Result<BackfillReport> {
    let pending = self.store.missing_embeddings(&self.model, limit).await?;
    let mut report = BackfillReport { attempted: pending.len(), ..BackfillReport::default() };

    for profile in &pending {
      match self.embed_and_store(profile).await {
        Ok(_) => report.embedded += 1,
        Err(err) if err.is_recoverable() => {
          warn!(canonical_id = %profile.canonical_id, stage = "backfill", error = %err, "Embedding failed");
          report.failed += 1;
        }
        Err(err) => return Err(err),
      }
    }

    info!(
      attempted = report.attempted,
      embedded = report.embedded,
      failed = report.failed,
      "Embedding backfill finished"
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Attributes;
  use crate::store::{CorpusStore, MemoryCorpusStore};
  use crate::vendors::MockEmbeddingProvider;
  use chrono::{TimeZone, Utc};
  use serde_json::json;
  use std::sync::Arc;

  fn named(raw: &str, name: &str, minute: u32) -> CandidateProfile {
    let mut attributes = Attributes::new();
    attributes.insert("name".into(), json!(name));
    CandidateProfile::ingested(raw, attributes, Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap())
  }

  /// "Name: rust" -> [1, 0], "Name: go" -> [0, 1], anything else -> [1, 1]
  fn keyword_embedder() -> MockEmbeddingProvider {
    let mut embedder = MockEmbeddingProvider::new();
    embedder.expect_model().return_const("kw-1".to_string());
    embedder.expect_embed().returning(|text| {
      Ok(match text {
        t if t.ends_with("rust") => vec![1.0, 0.0],
        t if t.ends_with("go") => vec![0.0, 1.0],
        _ => vec![1.0, 1.0],
      })
    });
    embedder
  }

  async fn seeded(store: &Arc<MemoryCorpusStore>, profiles: &[CandidateProfile]) {
    for profile in profiles {
      store.upsert(profile).await.unwrap();
    }
  }

  #[tokio::test]
  async fn test_search_orders_by_similarity_then_ingestion() -> Result<()> {
    let store = Arc::new(MemoryCorpusStore::new());
    let profiles =
      [named("https://x/in/late", "rust", 9), named("https://x/in/go", "go", 0), named("https://x/in/early", "rust", 1)];
    seeded(&store, &profiles).await;

    let index = EmbeddingIndex::new(store.clone(), Arc::new(keyword_embedder()), 2, Duration::from_secs(1));
    for profile in &profiles {
      index.embed_and_store(profile).await?;
    }

    let results = index.search("rust", 10).await?;
    let ids: Vec<_> = results.iter().map(|r| r.profile.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["https://x/in/early", "https://x/in/late", "https://x/in/go"]);
    assert!((results[0].similarity - 1.0).abs() < 1e-6);

    assert_eq!(index.search("rust", 1).await?.len(), 1);
    Ok(())
  }

  #[tokio::test]
  async fn test_vectors_written_by_another_index_are_searched() -> Result<()> {
    let store = Arc::new(MemoryCorpusStore::new());
    let first = named("https://x/in/first", "rust", 0);
    let later = named("https://x/in/later", "rust", 5);
    seeded(&store, &[first.clone(), later.clone()]).await;

    let serving = EmbeddingIndex::new(store.clone(), Arc::new(keyword_embedder()), 2, Duration::from_secs(1));
    serving.embed_and_store(&first).await?;
    assert_eq!(serving.search("rust", 10).await?.len(), 1);

    // a separate process backfilling the same corpus
    let writer = EmbeddingIndex::new(store.clone(), Arc::new(keyword_embedder()), 2, Duration::from_secs(1));
    writer.embed_and_store(&later).await?;

    let ids: Vec<_> = serving.search("rust", 10).await?.into_iter().map(|r| r.profile.canonical_id).collect();
    assert_eq!(ids, vec!["https://x/in/first", "https://x/in/later"]);
    Ok(())
  }

  #[tokio::test]
  async fn test_embedding_failure_leaves_profile_unindexed() -> Result<()> {
    let store = Arc::new(MemoryCorpusStore::new());
    let profile = named("https://x/in/a", "rust", 0);
    seeded(&store, &[profile.clone()]).await;

    let mut embedder = MockEmbeddingProvider::new();
    embedder.expect_model().return_const("kw-1".to_string());
    embedder.expect_embed().returning(|_| Err(anyhow::anyhow!("quota exhausted")));
    let index = EmbeddingIndex::new(store.clone(), Arc::new(embedder), 2, Duration::from_secs(1));

    let err = index.embed_and_store(&profile).await.unwrap_err();
    assert!(matches!(err, ScoutError::EmbeddingUnavailable(_)));
    assert!(store.get("https://x/in/a").await?.is_some());
    assert!(store.embedded_profiles("kw-1").await?.is_empty());
    Ok(())
  }

  #[tokio::test]
  async fn test_wrong_dimension_fails_fast() -> Result<()> {
    let store = Arc::new(MemoryCorpusStore::new());
    let profile = named("https://x/in/a", "rust", 0);
    seeded(&store, &[profile.clone()]).await;
    store.set_embedding("https://x/in/a", &[1.0, 0.0, 0.0], "kw-1").await?;

    let index = EmbeddingIndex::new(store.clone(), Arc::new(keyword_embedder()), 2, Duration::from_secs(1));
    let err = index.search("rust", 5).await.unwrap_err();
    assert!(matches!(err, ScoutError::DimensionMismatch { expected: 2, actual: 3 }));

    let narrow = EmbeddingIndex::new(store, Arc::new(keyword_embedder()), 3, Duration::from_secs(1));
    let err = narrow.embed_and_store(&profile).await.unwrap_err();
    assert!(matches!(err, ScoutError::DimensionMismatch { expected: 3, actual: 2 }));
    Ok(())
  }

  #[tokio::test]
  async fn test_backfill_counts_failures_without_aborting() -> Result<()> {
    let store = Arc::new(MemoryCorpusStore::new());
    seeded(&store, &[named("https://x/in/a", "rust", 0), named("https://x/in/b", "flaky", 1)]).await;

    let mut embedder = MockEmbeddingProvider::new();
    embedder.expect_model().return_const("kw-1".to_string());
    embedder.expect_embed().returning(|text| {
      if text.contains("flaky") {
        Err(anyhow::anyhow!("503"))
      } else {
        Ok(vec![1.0, 0.0])
      }
    });
    let index = EmbeddingIndex::new(store.clone(), Arc::new(embedder), 2, Duration::from_secs(1));

    let report = index.backfill(10).await?;
    assert_eq!(report, BackfillReport { attempted: 2, embedded: 1, failed: 1 });
    assert_eq!(store.missing_embeddings("kw-1", 10).await?.len(), 1);
    Ok(())
  }
}
