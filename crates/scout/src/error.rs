//! Error taxonomy shared by the acquisition and retrieval components
//!
//! Vendor failures are contained by the component that made the call; only
//! invalid input and configuration problems propagate to callers. Running out
//! of budget is a `StopReason`, and duplicate writes are an `UpsertOutcome`,
//! so neither appears here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// External capability that failed or timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
  Discovery,
  Extraction,
  Embedding,
  Rerank,
}

impl std::fmt::Display for Capability {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Capability::Discovery => "discovery",
      Capability::Extraction => "extraction",
      Capability::Embedding => "embedding",
      Capability::Rerank => "rerank",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum ScoutError {
  #[error("{capability} vendor unavailable: {message}")]
  VendorUnavailable { capability: Capability, message: String },

  #[error("Embedding unavailable: {0}")]
  EmbeddingUnavailable(String),

  #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("Invalid query: {0}")]
  InvalidQuery(String),

  #[error("Invalid acquisition target: {0}")]
  InvalidTarget(String),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Storage failure: {0}")]
  Storage(String),
}

impl ScoutError {
  /// Wrap a vendor-side error for the given capability
  pub fn vendor(capability: Capability, err: impl std::fmt::Display) -> Self {
    ScoutError::VendorUnavailable { capability, message: err.to_string() }
  }

  /// Whether the error is a contained vendor failure rather than a caller mistake
  pub fn is_recoverable(&self) -> bool {
    matches!(self, ScoutError::VendorUnavailable { .. } | ScoutError::EmbeddingUnavailable(_))
  }
}

impl From<rusqlite::Error> for ScoutError {
  fn from(err: rusqlite::Error) -> Self {
    ScoutError::Storage(err.to_string())
  }
}

impl From<serde_json::Error> for ScoutError {
  fn from(err: serde_json::Error) -> Self {
    ScoutError::Storage(format!("Invalid stored JSON: {err}"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_vendor_error_message_names_capability() {
    let err = ScoutError::vendor(Capability::Extraction, "503 Service Unavailable");
    assert_eq!(err.to_string(), "extraction vendor unavailable: 503 Service Unavailable");
    assert!(err.is_recoverable());
  }

  #[test]
  fn test_caller_errors_are_not_recoverable() {
    assert!(!ScoutError::InvalidQuery("fanout 3 < top_k 5".into()).is_recoverable());
    assert!(!ScoutError::DimensionMismatch { expected: 4, actual: 3 }.is_recoverable());
  }
}
