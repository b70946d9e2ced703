//! Candidate profiles and the vendor payloads they are built from

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::identity;

/// Open mapping of extracted fields (name, title, location, experience, ...)
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A candidate stored in the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateProfile {
  /// Normalized identifier; unique key of the corpus
  pub canonical_id: String,

  /// Identifier as first observed, kept for audit only
  pub raw_identifier: String,

  /// Extracted fields; none of them is load-bearing
  #[serde(default)]
  pub attributes: Attributes,

  /// Vector from the active embedding model, absent until indexed
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub embedding: Option<Vec<f32>>,

  /// Set once when the profile is first committed
  pub ingested_at: DateTime<Utc>,
}

impl CandidateProfile {
  /// Build a fresh profile, deriving the canonical id and stamping `ingested_at`
  pub fn new(raw_identifier: impl Into<String>, attributes: Attributes) -> Self {
    Self::ingested(raw_identifier, attributes, Utc::now())
  }

  /// Build a profile with an explicit ingestion time
  pub fn ingested(
    raw_identifier: impl Into<String>,
    attributes: Attributes,
    ingested_at: DateTime<Utc>,
  ) -> Self {
    let raw_identifier = raw_identifier.into();
    Self {
      canonical_id: identity::normalize(&raw_identifier),
      raw_identifier,
      attributes,
      embedding: None,
      ingested_at,
    }
  }

  /// String value of an attribute, if present and textual
  pub fn attribute_str(&self, key: &str) -> Option<&str> {
    self.attributes.get(key).and_then(|value| value.as_str())
  }

  /// Best human label for the profile
  pub fn display_name(&self) -> &str {
    ["name", "full_name", "fullName"]
      .iter()
      .find_map(|key| self.attribute_str(key))
      .unwrap_or(&self.canonical_id)
  }
}

/// Cheap discovery result: at least an identifier, optionally some hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStub {
  #[serde(alias = "url", alias = "profile_url", alias = "profileUrl")]
  pub raw_identifier: String,

  #[serde(flatten)]
  pub hints: Attributes,
}

impl ProfileStub {
  pub fn new(raw_identifier: impl Into<String>) -> Self {
    Self { raw_identifier: raw_identifier.into(), hints: Attributes::new() }
  }

  pub fn canonical_id(&self) -> String {
    identity::normalize(&self.raw_identifier)
  }
}

/// Full attribute set returned by the extraction vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProfile {
  #[serde(alias = "url", alias = "profile_url", alias = "profileUrl")]
  pub raw_identifier: String,

  #[serde(flatten)]
  pub attributes: Attributes,
}

/// One extraction call's output; vendors may return fewer items than asked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBatch {
  #[serde(default)]
  pub profiles: Vec<ExtractedProfile>,

  /// Actual charge for the call when the vendor reports it
  #[serde(default, alias = "cost_usd")]
  pub reported_cost: Option<f64>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_new_profile_derives_canonical_id() {
    let profile = CandidateProfile::new("https://X/in/Jane/", Attributes::new());
    assert_eq!(profile.canonical_id, "https://x/in/jane");
    assert_eq!(profile.raw_identifier, "https://X/in/Jane/");
    assert!(profile.embedding.is_none());
  }

  #[test]
  fn test_display_name_falls_back_to_canonical_id() {
    let mut attributes = Attributes::new();
    let anonymous = CandidateProfile::new("https://x/in/anon", attributes.clone());
    assert_eq!(anonymous.display_name(), "https://x/in/anon");

    attributes.insert("fullName".into(), json!("Jane Doe"));
    let named = CandidateProfile::new("https://x/in/jane", attributes);
    assert_eq!(named.display_name(), "Jane Doe");
  }

  #[test]
  fn test_stub_accepts_vendor_url_field() {
    let stub: ProfileStub =
      serde_json::from_value(json!({"url": "https://x/in/c", "headline": "Engineer"})).unwrap();
    assert_eq!(stub.raw_identifier, "https://x/in/c");
    assert_eq!(stub.hints.get("headline"), Some(&json!("Engineer")));
  }

  #[test]
  fn test_extraction_batch_reads_cost_alias() {
    let batch: ExtractionBatch = serde_json::from_value(json!({
      "profiles": [{"profileUrl": "https://x/in/c", "name": "C"}],
      "cost_usd": 0.75
    }))
    .unwrap();
    assert_eq!(batch.profiles.len(), 1);
    assert_eq!(batch.reported_cost, Some(0.75));
  }
}
