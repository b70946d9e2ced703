//! Corpus membership index
//!
//! An in-memory set of canonical ids already ingested. It is populated once
//! from the store at process start and then kept current by the orchestrator
//! as it commits profiles, so later targets of the same run see earlier
//! commits without touching the store again.

use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;
use crate::store::CorpusStore;

#[derive(Debug, Clone, Default)]
pub struct CorpusMembershipIndex {
  ids: HashSet<String>,
}

impl CorpusMembershipIndex {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bulk-populate from the persisted corpus. This is the only bulk read.
  pub async fn load_from_store(store: &dyn CorpusStore) -> Result<Self> {
    let mut index = Self::new();
    index.add_many(store.canonical_ids().await?);
    debug!(members = index.len(), "Loaded corpus membership index");
    Ok(index)
  }

  pub fn contains(&self, canonical_id: &str) -> bool {
    self.ids.contains(canonical_id)
  }

  /// Returns true when the id was not already a member
  pub fn add(&mut self, canonical_id: impl Into<String>) -> bool {
    self.ids.insert(canonical_id.into())
  }

  pub fn add_many<I, S>(&mut self, canonical_ids: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.ids.extend(canonical_ids.into_iter().map(Into::into));
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }
}
