//! Persisted corpus abstraction
//!
//! The corpus is a collection of `CandidateProfile` rows keyed by
//! `canonical_id`. Writes are insert-or-ignore: a second write for an existing
//! key is absorbed as `UpsertOutcome::AlreadyPresent`, which is how duplicate
//! extractions from concurrently racing runs are resolved. Different backends
//! (SQLite on disk, in-memory for tests) can be swapped behind the trait
//! without touching the orchestrator or the index.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, ScoutError};
use crate::models::CandidateProfile;

pub use memory::MemoryCorpusStore;
pub use sqlite::SqliteCorpusStore;

/// Result of an insert-or-ignore write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
  Inserted,
  /// The key already existed; the stored row was left untouched
  AlreadyPresent,
}

/// Corpus counters for status endpoints and the `stats` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CorpusStats {
  pub profiles: usize,
  pub embedded: usize,
  /// Embedded profile count per embedding model
  #[serde(default)]
  pub models: BTreeMap<String, usize>,
}

/// Storage interface for the candidate corpus
#[async_trait]
pub trait CorpusStore: Send + Sync {
  /// Insert a profile unless its `canonical_id` already exists.
  /// The profile's `embedding` field is ignored; use `set_embedding`.
  async fn upsert(&self, profile: &CandidateProfile) -> Result<UpsertOutcome>;

  /// Every canonical id in the corpus (bulk read used at process start)
  async fn canonical_ids(&self) -> Result<Vec<String>>;

  /// Fetch one profile
  async fn get(&self, canonical_id: &str) -> Result<Option<CandidateProfile>>;

  /// Attach or replace the embedding produced by `model`
  async fn set_embedding(&self, canonical_id: &str, embedding: &[f32], model: &str) -> Result<()>;

  /// Profiles embedded by `model`, ordered by `ingested_at` then id
  async fn embedded_profiles(&self, model: &str) -> Result<Vec<CandidateProfile>>;

  /// Profiles lacking an embedding from `model`, oldest first
  async fn missing_embeddings(&self, model: &str, limit: usize) -> Result<Vec<CandidateProfile>>;

  /// Corpus counters
  async fn stats(&self) -> Result<CorpusStats>;
}

/// Shared handle used by every component
pub type SharedCorpusStore = Arc<dyn CorpusStore>;

/// Encode a vector as little-endian f32 bytes
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
  embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Decode little-endian f32 bytes back into a vector
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
  if bytes.len() % 4 != 0 {
    return Err(ScoutError::Storage(format!(
      "Embedding blob length {} is not a multiple of 4",
      bytes.len()
    )));
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect(),
  )
}
