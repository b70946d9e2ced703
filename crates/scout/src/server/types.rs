//! REST API types with schemars annotations for OpenAPI generation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attributes, RankingSource, SearchHit};
use crate::store::CorpusStats;

// Base Response Structure
// ======================

/// Envelope shared by every endpoint
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BaseResponse<T> {
  /// API versioning information
  pub versioning: VersionInfo,

  /// Transaction ID for logging correlation
  pub transaction_id: Uuid,

  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub errors: Vec<ApiError>,

  #[serde(flatten)]
  pub data: T,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionInfo {
  pub latest: String,
  pub requested: String,
  pub resolved: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Error key, unique to the error source
  pub key: String,

  /// Human readable error message
  pub message: String,

  #[serde(default)]
  pub context: serde_json::Value,
}

// Status Endpoints
// ================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionResponse {
  pub version: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  pub data_dir: String,
  /// False when no embedding client could be built
  pub search_available: bool,
  pub rerank_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CorpusStatsResponse {
  pub corpus: CorpusStats,
}

// Search Endpoint
// ===============

/// Request for POST /search
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
  pub query: String,
  /// Defaults to the configured top_k
  #[serde(default)]
  pub top_k: Option<usize>,
  /// Defaults to the configured fanout
  #[serde(default)]
  pub fanout: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchHitData {
  /// 1-based position in the ranking
  pub rank: usize,
  pub canonical_id: String,
  pub raw_identifier: String,
  pub display_name: String,
  pub relevance_score: f32,
  pub similarity: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rationale: Option<String>,
  pub attributes: Attributes,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
  pub query: String,
  pub top_k: usize,
  pub fanout: usize,
  pub ranking: RankingSource,
  pub results: Vec<SearchHitData>,
}

impl SearchHitData {
  pub fn from_hit(position: usize, hit: SearchHit) -> Self {
    Self {
      rank: position + 1,
      display_name: hit.profile.display_name().to_string(),
      canonical_id: hit.profile.canonical_id,
      raw_identifier: hit.profile.raw_identifier,
      relevance_score: hit.relevance_score,
      similarity: hit.similarity,
      rationale: hit.rationale,
      attributes: hit.profile.attributes,
    }
  }
}

impl<T> BaseResponse<T> {
  fn version_info() -> VersionInfo {
    let version = env!("CARGO_PKG_VERSION");
    VersionInfo { latest: version.to_string(), requested: version.to_string(), resolved: version.to_string() }
  }

  /// Create a successful response
  pub fn success(data: T, transaction_id: Uuid) -> Self {
    Self { versioning: Self::version_info(), transaction_id, errors: Vec::new(), data }
  }

  /// Create an error response
  pub fn error(errors: Vec<ApiError>, transaction_id: Uuid) -> BaseResponse<()> {
    BaseResponse { versioning: BaseResponse::<()>::version_info(), transaction_id, errors, data: () }
  }
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string(), context: serde_json::Value::Null }
  }
}
