//! Wiring from configuration to live components

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::acquisition::{AcquisitionOrchestrator, OrchestratorSettings};
use crate::config::{self, ScoutConfig};
use crate::index::EmbeddingIndex;
use crate::rerank::Reranker;
use crate::retrieval::HybridRetriever;
use crate::store::{SharedCorpusStore, SqliteCorpusStore};
use crate::vendors::{api_key_from_env, AnthropicReranker, OpenAiEmbedder, ScraperClient, SharedEmbedder};

/// Opened corpus plus the configuration used to build vendor clients
pub struct Services {
  pub config: ScoutConfig,
  pub store: SharedCorpusStore,
  pub data_dir: PathBuf,
}

impl Services {
  /// Open the corpus under the data directory
  pub fn open(config: ScoutConfig) -> Result<Self> {
    let data_dir = config::data_dir()?;
    Self::open_at(config, &data_dir)
  }

  pub fn open_at(config: ScoutConfig, data_dir: &Path) -> Result<Self> {
    let db_path = config::corpus_db_path(data_dir);
    let store = SqliteCorpusStore::open(&db_path).with_context(|| format!("Failed to open corpus {}", db_path.display()))?;
    Ok(Self { config, store: Arc::new(store), data_dir: data_dir.to_path_buf() })
  }

  pub fn runs_log(&self) -> PathBuf {
    config::runs_log_path(&self.data_dir)
  }

  pub fn embedder(&self) -> Result<SharedEmbedder> {
    let settings = &self.config.embedding;
    let api_key = api_key_from_env(&settings.api_key_env)?;
    let dimensions = settings.request_dimensions.then_some(settings.dimension);
    let embedder = OpenAiEmbedder::new(
      &api_key,
      &settings.base_url,
      &settings.model,
      dimensions,
      settings.timeout(),
      settings.max_retries,
    )?;
    Ok(Arc::new(embedder))
  }

  pub fn embedding_index(&self) -> Result<Arc<EmbeddingIndex>> {
    let settings = &self.config.embedding;
    Ok(Arc::new(EmbeddingIndex::new(self.store.clone(), self.embedder()?, settings.dimension, settings.call_deadline())))
  }

  /// Reranker from config; a missing key degrades to embedding order
  pub fn reranker(&self, enabled: bool) -> Result<Reranker> {
    let settings = &self.config.rerank;
    if !(enabled && settings.enabled) {
      return Ok(Reranker::passthrough());
    }

    let api_key = match api_key_from_env(&settings.api_key_env) {
      Ok(key) => key,
      Err(err) => {
        warn!(error = %err, "Reranking disabled");
        return Ok(Reranker::passthrough());
      }
    };
    let provider =
      AnthropicReranker::new(&api_key, &settings.base_url, &settings.model, settings.max_tokens, settings.timeout())?;
    Ok(Reranker::new(Arc::new(provider), settings.timeout(), settings.summary_chars))
  }

  pub fn retriever(&self, rerank: bool) -> Result<HybridRetriever> {
    Ok(HybridRetriever::new(self.embedding_index()?, self.reranker(rerank)?))
  }

  pub fn orchestrator(&self, embed_on_commit: bool) -> Result<AcquisitionOrchestrator> {
    let acquisition = &self.config.acquisition;
    let scraper_settings = &self.config.scraper;
    let token = std::env::var(&scraper_settings.token_env).ok();
    let timeout = acquisition.discovery_timeout().max(acquisition.extraction_timeout());
    let scraper = Arc::new(ScraperClient::new(&scraper_settings.base_url, token.as_deref(), timeout)?);

    let settings = OrchestratorSettings {
      discovery_timeout: acquisition.discovery_timeout(),
      extraction_timeout: acquisition.extraction_timeout(),
    };
    let orchestrator = AcquisitionOrchestrator::new(scraper.clone(), scraper, self.store.clone(), settings);

    if !(embed_on_commit && acquisition.embed_on_commit) {
      return Ok(orchestrator);
    }
    match self.embedding_index() {
      Ok(index) => Ok(orchestrator.with_embed_on_commit(index)),
      Err(err) => {
        warn!(error = %err, "Embedding on commit disabled; run backfill later");
        Ok(orchestrator)
      }
    }
  }
}
