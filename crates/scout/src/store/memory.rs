//! In-memory corpus store for tests and ephemeral runs

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{CorpusStats, CorpusStore, UpsertOutcome};
use crate::error::{Result, ScoutError};
use crate::models::CandidateProfile;

#[derive(Debug, Clone)]
struct StoredProfile {
  profile: CandidateProfile,
  embedding_model: Option<String>,
}

/// Same contract as the SQLite store, kept in a map
#[derive(Debug, Default)]
pub struct MemoryCorpusStore {
  rows: RwLock<BTreeMap<String, StoredProfile>>,
}

impl MemoryCorpusStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn poisoned() -> ScoutError {
    ScoutError::Storage("Corpus map lock poisoned".to_string())
  }

  fn sorted(mut profiles: Vec<CandidateProfile>) -> Vec<CandidateProfile> {
    profiles.sort_by(|a, b| {
      a.ingested_at.cmp(&b.ingested_at).then_with(|| a.canonical_id.cmp(&b.canonical_id))
    });
    profiles
  }
}

#[async_trait]
impl CorpusStore for MemoryCorpusStore {
  async fn upsert(&self, profile: &CandidateProfile) -> Result<UpsertOutcome> {
    let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
    if rows.contains_key(&profile.canonical_id) {
      return Ok(UpsertOutcome::AlreadyPresent);
    }

    let mut stored = profile.clone();
    stored.embedding = None;
    rows.insert(
      profile.canonical_id.clone(),
      StoredProfile { profile: stored, embedding_model: None },
    );
    Ok(UpsertOutcome::Inserted)
  }

  async fn canonical_ids(&self) -> Result<Vec<String>> {
    let rows = self.rows.read().map_err(|_| Self::poisoned())?;
    Ok(rows.keys().cloned().collect())
  }

  async fn get(&self, canonical_id: &str) -> Result<Option<CandidateProfile>> {
    let rows = self.rows.read().map_err(|_| Self::poisoned())?;
    Ok(rows.get(canonical_id).map(|row| row.profile.clone()))
  }

  async fn set_embedding(&self, canonical_id: &str, embedding: &[f32], model: &str) -> Result<()> {
    let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
    let row = rows.get_mut(canonical_id).ok_or_else(|| {
      ScoutError::Storage(format!("No profile {canonical_id} to attach an embedding to"))
    })?;
    row.profile.embedding = Some(embedding.to_vec());
    row.embedding_model = Some(model.to_string());
    Ok(())
  }

  async fn embedded_profiles(&self, model: &str) -> Result<Vec<CandidateProfile>> {
    let rows = self.rows.read().map_err(|_| Self::poisoned())?;
    let profiles = rows
      .values()
      .filter(|row| row.profile.embedding.is_some() && row.embedding_model.as_deref() == Some(model))
      .map(|row| row.profile.clone())
      .collect();
    Ok(Self::sorted(profiles))
  }

  async fn missing_embeddings(&self, model: &str, limit: usize) -> Result<Vec<CandidateProfile>> {
    let rows = self.rows.read().map_err(|_| Self::poisoned())?;
    let profiles = rows
      .values()
      .filter(|row| row.profile.embedding.is_none() || row.embedding_model.as_deref() != Some(model))
      .map(|row| CandidateProfile { embedding: None, ..row.profile.clone() })
      .collect();
    Ok(Self::sorted(profiles).into_iter().take(limit).collect())
  }

  async fn stats(&self) -> Result<CorpusStats> {
    let rows = self.rows.read().map_err(|_| Self::poisoned())?;
    let mut stats = CorpusStats { profiles: rows.len(), ..CorpusStats::default() };
    for row in rows.values() {
      if let (Some(_), Some(model)) = (&row.profile.embedding, &row.embedding_model) {
        stats.embedded += 1;
        *stats.models.entry(model.clone()).or_insert(0) += 1;
      }
    }
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Attributes;

  #[tokio::test]
  async fn test_memory_store_matches_insert_or_ignore_contract() -> Result<()> {
    let store = MemoryCorpusStore::new();
    let first = CandidateProfile::new("https://x/in/a", Attributes::new());
    let again = CandidateProfile::new("HTTPS://x/in/a/", Attributes::new());

    assert_eq!(store.upsert(&first).await?, UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&again).await?, UpsertOutcome::AlreadyPresent);
    assert_eq!(store.canonical_ids().await?, vec!["https://x/in/a".to_string()]);
    Ok(())
  }

  #[tokio::test]
  async fn test_missing_embeddings_respects_limit_and_model() -> Result<()> {
    let store = MemoryCorpusStore::new();
    for id in ["a", "b", "c"] {
      store.upsert(&CandidateProfile::new(format!("https://x/in/{id}"), Attributes::new())).await?;
    }
    store.set_embedding("https://x/in/a", &[1.0, 0.0], "m1").await?;

    assert_eq!(store.missing_embeddings("m1", 10).await?.len(), 2);
    assert_eq!(store.missing_embeddings("m1", 1).await?.len(), 1);
    assert_eq!(store.missing_embeddings("m2", 10).await?.len(), 3);
    assert_eq!(store.embedded_profiles("m1").await?.len(), 1);
    assert_eq!(store.stats().await?.embedded, 1);
    Ok(())
  }
}
