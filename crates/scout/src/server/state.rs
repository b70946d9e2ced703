//! Shared handler state

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::retrieval::HybridRetriever;
use crate::store::SharedCorpusStore;

#[derive(Clone)]
pub struct AppState {
  pub store: SharedCorpusStore,
  /// Absent when no embedding client could be built
  pub retriever: Option<Arc<HybridRetriever>>,
  pub search: SearchConfig,
  pub data_dir: PathBuf,
}

impl AppState {
  pub fn new(store: SharedCorpusStore, retriever: Option<Arc<HybridRetriever>>, search: SearchConfig, data_dir: PathBuf) -> Self {
    Self { store, retriever, search, data_dir }
  }
}
