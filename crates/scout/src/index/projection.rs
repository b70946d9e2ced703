//! Fixed textual projection of a profile
//!
//! The same projection must be used for every profile of an index generation,
//! otherwise stored vectors stop being comparable. Salient fields come first
//! in a fixed order, the rest follow in key order.

use serde_json::Value;

use crate::models::CandidateProfile;

/// Fields placed first, with the label used in the projection
const SALIENT_FIELDS: &[(&str, &str)] = &[
  ("name", "Name"),
  ("full_name", "Name"),
  ("headline", "Headline"),
  ("title", "Title"),
  ("location", "Location"),
  ("company", "Company"),
  ("current_company", "Company"),
  ("skills", "Skills"),
  ("experience", "Experience"),
  ("education", "Education"),
  ("summary", "Summary"),
  ("about", "About"),
];

fn value_text(value: &Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => {
      let trimmed = s.trim();
      (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
    Value::Array(items) => {
      let parts: Vec<String> = items.iter().filter_map(value_text).collect();
      (!parts.is_empty()).then(|| parts.join(", "))
    }
    Value::Object(_) => Some(value.to_string()),
    other => Some(other.to_string()),
  }
}

fn is_salient(key: &str) -> bool {
  SALIENT_FIELDS.iter().any(|(field, _)| *field == key)
}

/// Text embedded for a profile
pub fn profile_text(profile: &CandidateProfile) -> String {
  let mut lines = Vec::new();

  for (field, label) in SALIENT_FIELDS {
    if let Some(text) = profile.attributes.get(*field).and_then(value_text) {
      lines.push(format!("{label}: {text}"));
    }
  }

  for (key, value) in &profile.attributes {
    if is_salient(key) {
      continue;
    }
    if let Some(text) = value_text(value) {
      lines.push(format!("{key}: {text}"));
    }
  }

  if lines.is_empty() {
    // nothing extracted; the identifier is still better than an empty input
    return profile.canonical_id.clone();
  }
  lines.join("\n")
}

/// Single-line summary sent to the reranker, capped at `max_chars`
pub fn rerank_summary(profile: &CandidateProfile, max_chars: usize) -> String {
  let flattened = profile_text(profile).replace('\n', " | ");
  if flattened.chars().count() <= max_chars {
    return flattened;
  }
  let mut truncated: String = flattened.chars().take(max_chars).collect();
  truncated.push('…');
  truncated
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Attributes;
  use serde_json::json;

  fn profile(attributes: Value) -> CandidateProfile {
    let attributes: Attributes = serde_json::from_value(attributes).unwrap();
    CandidateProfile::new("https://x/in/jane", attributes)
  }

  #[test]
  fn test_salient_fields_lead_in_fixed_order() {
    let text = profile_text(&profile(json!({
      "zeta": "last",
      "location": "Berlin",
      "name": "Jane Doe",
      "skills": ["Rust", "Kafka"],
      "empty": null
    })));
    assert_eq!(text, "Name: Jane Doe\nLocation: Berlin\nSkills: Rust, Kafka\nzeta: last");
  }

  #[test]
  fn test_projection_is_stable_across_calls() {
    let p = profile(json!({"title": "Engineer", "years": 7, "remote": true}));
    assert_eq!(profile_text(&p), profile_text(&p));
    assert_eq!(profile_text(&p), "Title: Engineer\nremote: true\nyears: 7");
  }

  #[test]
  fn test_empty_profile_projects_to_identifier() {
    assert_eq!(profile_text(&profile(json!({}))), "https://x/in/jane");
  }

  #[test]
  fn test_rerank_summary_is_truncated() {
    let p = profile(json!({"name": "Jane Doe", "summary": "Builds distributed systems in Rust"}));
    assert_eq!(rerank_summary(&p, 400), "Name: Jane Doe | Summary: Builds distributed systems in Rust");
    assert_eq!(rerank_summary(&p, 8), "Name: Ja…");
  }
}
