//! Configuration management for Scout
//!
//! Loads vendor endpoints, pricing, timeouts and search defaults from YAML.
//! Every field has a default so partial files load. API keys never live in
//! the file; the config only names the environment variables holding them.

use anyhow::{anyhow, Context};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ScoutError};
use crate::vendors::retry_backoff;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutConfig {
  #[serde(default)]
  pub acquisition: AcquisitionConfig,
  #[serde(default)]
  pub scraper: ScraperConfig,
  #[serde(default)]
  pub embedding: EmbeddingConfig,
  #[serde(default)]
  pub rerank: RerankConfig,
  #[serde(default)]
  pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
  /// Extraction price per thousand profiles
  #[serde(default = "default_per_thousand_rate")]
  pub per_thousand_rate: f64,
  #[serde(default = "default_discovery_timeout_secs")]
  pub discovery_timeout_secs: u64,
  #[serde(default = "default_extraction_timeout_secs")]
  pub extraction_timeout_secs: u64,
  /// Embed each profile as soon as it is committed
  #[serde(default = "default_true")]
  pub embed_on_commit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScraperConfig {
  #[serde(default = "default_scraper_url")]
  pub base_url: String,
  #[serde(default = "default_scraper_token_env")]
  pub token_env: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
  #[serde(default = "default_embedding_url")]
  pub base_url: String,
  #[serde(default = "default_embedding_model")]
  pub model: String,
  /// Dimension every stored and query vector must have
  #[serde(default = "default_dimension")]
  pub dimension: usize,
  /// Ask the provider to shorten vectors to `dimension`
  #[serde(default)]
  pub request_dimensions: bool,
  #[serde(default = "default_openai_key_env")]
  pub api_key_env: String,
  #[serde(default = "default_vendor_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_max_retries")]
  pub max_retries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_rerank_url")]
  pub base_url: String,
  #[serde(default = "default_rerank_model")]
  pub model: String,
  #[serde(default = "default_anthropic_key_env")]
  pub api_key_env: String,
  #[serde(default = "default_rerank_max_tokens")]
  pub max_tokens: usize,
  #[serde(default = "default_vendor_timeout_secs")]
  pub timeout_secs: u64,
  /// Per-candidate summary length sent to the model
  #[serde(default = "default_summary_chars")]
  pub summary_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
  #[serde(default = "default_top_k")]
  pub default_top_k: usize,
  #[serde(default = "default_fanout")]
  pub default_fanout: usize,
}

// Default value functions
fn default_per_thousand_rate() -> f64 {
  3.0
}
fn default_discovery_timeout_secs() -> u64 {
  60
}
fn default_extraction_timeout_secs() -> u64 {
  300
}
fn default_true() -> bool {
  true
}
fn default_scraper_url() -> String {
  "http://localhost:8700".to_string()
}
fn default_scraper_token_env() -> String {
  "SCOUT_SCRAPER_TOKEN".to_string()
}
fn default_embedding_url() -> String {
  "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
  "text-embedding-3-small".to_string()
}
fn default_dimension() -> usize {
  1536
}
fn default_openai_key_env() -> String {
  "OPENAI_API_KEY".to_string()
}
fn default_vendor_timeout_secs() -> u64 {
  30
}
fn default_max_retries() -> usize {
  3
}
fn default_rerank_url() -> String {
  "https://api.anthropic.com".to_string()
}
fn default_rerank_model() -> String {
  "claude-3-5-haiku-latest".to_string()
}
fn default_anthropic_key_env() -> String {
  "ANTHROPIC_API_KEY".to_string()
}
fn default_rerank_max_tokens() -> usize {
  4096
}
fn default_summary_chars() -> usize {
  400
}
fn default_top_k() -> usize {
  10
}
fn default_fanout() -> usize {
  50
}

impl Default for AcquisitionConfig {
  fn default() -> Self {
    Self {
      per_thousand_rate: default_per_thousand_rate(),
      discovery_timeout_secs: default_discovery_timeout_secs(),
      extraction_timeout_secs: default_extraction_timeout_secs(),
      embed_on_commit: true,
    }
  }
}

impl Default for ScraperConfig {
  fn default() -> Self {
    Self { base_url: default_scraper_url(), token_env: default_scraper_token_env() }
  }
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      base_url: default_embedding_url(),
      model: default_embedding_model(),
      dimension: default_dimension(),
      request_dimensions: false,
      api_key_env: default_openai_key_env(),
      timeout_secs: default_vendor_timeout_secs(),
      max_retries: default_max_retries(),
    }
  }
}

impl Default for RerankConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      base_url: default_rerank_url(),
      model: default_rerank_model(),
      api_key_env: default_anthropic_key_env(),
      max_tokens: default_rerank_max_tokens(),
      timeout_secs: default_vendor_timeout_secs(),
      summary_chars: default_summary_chars(),
    }
  }
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self { default_top_k: default_top_k(), default_fanout: default_fanout() }
  }
}

impl AcquisitionConfig {
  pub fn discovery_timeout(&self) -> Duration {
    Duration::from_secs(self.discovery_timeout_secs)
  }

  pub fn extraction_timeout(&self) -> Duration {
    Duration::from_secs(self.extraction_timeout_secs)
  }
}

impl EmbeddingConfig {
  /// Per-request HTTP timeout
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Deadline for one embedding call, covering every attempt and the backoff between them
  pub fn call_deadline(&self) -> Duration {
    let attempts = self.max_retries.max(1);
    let backoff: Duration = (0..attempts - 1).map(retry_backoff).sum();
    self.timeout() * attempts as u32 + backoff
  }
}

impl RerankConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Get the data directory (~/.scout), overridable with SCOUT_ROOT
pub fn data_dir() -> anyhow::Result<PathBuf> {
  if let Ok(custom_root) = std::env::var("SCOUT_ROOT") {
    return Ok(PathBuf::from(custom_root));
  }

  let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
  Ok(home.join(".scout"))
}

pub fn corpus_db_path(data_dir: &Path) -> PathBuf {
  data_dir.join("corpus.db")
}

/// JSONL log with one report per acquisition run
pub fn runs_log_path(data_dir: &Path) -> PathBuf {
  data_dir.join("runs.jsonl")
}

impl ScoutConfig {
  /// Load configuration from a YAML file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: ScoutConfig =
      serde_yaml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
  }

  /// Load the explicit file if given, else the first config found, else defaults
  pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
    let config = match explicit {
      Some(path) => Self::load_from_file(path)?,
      None => match Self::candidate_paths()?.into_iter().find(|path| path.exists()) {
        Some(path) => Self::load_from_file(path)?,
        None => ScoutConfig::default(),
      },
    };
    config.validate()?;
    Ok(config)
  }

  fn candidate_paths() -> anyhow::Result<Vec<PathBuf>> {
    Ok(vec![PathBuf::from("scout.yaml"), PathBuf::from(".scout/config.yaml"), data_dir()?.join("config.yaml")])
  }

  /// Reject settings the pipeline cannot run with
  pub fn validate(&self) -> Result<()> {
    let rate = self.acquisition.per_thousand_rate;
    if !rate.is_finite() || rate < 0.0 {
      return Err(ScoutError::InvalidConfig(format!("acquisition.per_thousand_rate {rate} must be non-negative")));
    }

    let timeouts = [
      ("acquisition.discovery_timeout_secs", self.acquisition.discovery_timeout_secs),
      ("acquisition.extraction_timeout_secs", self.acquisition.extraction_timeout_secs),
      ("embedding.timeout_secs", self.embedding.timeout_secs),
      ("rerank.timeout_secs", self.rerank.timeout_secs),
    ];
    if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
      return Err(ScoutError::InvalidConfig(format!("{name} must be at least 1 second")));
    }

    if self.embedding.dimension == 0 {
      return Err(ScoutError::InvalidConfig("embedding.dimension must be positive".to_string()));
    }
    if self.search.default_top_k == 0 {
      return Err(ScoutError::InvalidConfig("search.default_top_k must be positive".to_string()));
    }
    if self.search.default_fanout < self.search.default_top_k {
      return Err(ScoutError::InvalidConfig(format!(
        "search.default_fanout {} is smaller than search.default_top_k {}",
        self.search.default_fanout, self.search.default_top_k
      )));
    }
    Ok(())
  }
}
