//! Offline retrieval evaluation
//!
//! Replays labelled queries through a `HybridRetriever` and reports hit rate,
//! Recall@K and MRR. Any embedding or rerank backend can be measured by
//! building the retriever around it, which is how model swaps are compared.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::identity;
use crate::models::{RankingSource, SearchQuery};
use crate::retrieval::HybridRetriever;

/// One labelled query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
  pub query: String,
  /// Identifiers of profiles that should be returned
  #[serde(default)]
  pub relevant: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEntry {
  pub rank: usize,
  pub canonical_id: String,
  pub relevance_score: f32,
  pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
  pub query: String,
  pub relevant: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  pub hits: usize,
  /// Absent when the case has no labels
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recall: Option<f64>,
  /// 1-based rank of the first relevant result
  pub first_relevant_rank: Option<usize>,
  pub latency_ms: f64,
  pub reranked: bool,
  pub retrieved: Vec<RetrievedEntry>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
  pub total_cases: usize,
  pub hit_rate: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mean_recall: Option<f64>,
  pub mean_reciprocal_rank: f64,
  pub avg_latency_ms: f64,
  pub top_k: usize,
  pub fanout: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
  pub summary: EvalSummary,
  pub cases: Vec<CaseReport>,
}

/// Load cases from a JSONL file, skipping blank and `#` lines
pub fn load_cases(path: &Path) -> anyhow::Result<Vec<EvalCase>> {
  let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let mut cases = Vec::new();
  for (line_number, line) in content.lines().enumerate() {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }
    let case: EvalCase = serde_json::from_str(trimmed)
      .with_context(|| format!("invalid eval case on line {} of {}", line_number + 1, path.display()))?;
    cases.push(case);
  }
  Ok(cases)
}

/// Score one retrieved list against a case's labels
pub fn score_case(case: &EvalCase, retrieved_ids: &[String]) -> (usize, Option<f64>, Option<usize>) {
  let relevant: HashSet<String> = case.relevant.iter().map(|id| identity::normalize(id)).collect();
  let mut matched = HashSet::new();
  let mut first_rank = None;

  for (position, id) in retrieved_ids.iter().enumerate() {
    if relevant.contains(id) && matched.insert(id.as_str()) && first_rank.is_none() {
      first_rank = Some(position + 1);
    }
  }

  let hits = matched.len();
  let recall = (!relevant.is_empty()).then(|| hits as f64 / relevant.len() as f64);
  (hits, recall, first_rank)
}

/// Replay every case through `retriever`
pub async fn run_evaluation(retriever: &HybridRetriever, cases: Vec<EvalCase>, top_k: usize, fanout: usize) -> EvalReport {
  let mut reports = Vec::with_capacity(cases.len());

  for case in cases {
    let started = Instant::now();
    let outcome = retriever.search(&SearchQuery::new(case.query.clone(), fanout, top_k)).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let (result, error) = match outcome {
      Ok(result) => (Some(result), None),
      Err(err) => {
        warn!(query = %case.query, error = %err, "Eval case failed");
        (None, Some(err.to_string()))
      }
    };

    let retrieved_ids: Vec<String> = result
      .as_ref()
      .map(|r| r.hits.iter().map(|hit| hit.profile.canonical_id.clone()).collect())
      .unwrap_or_default();
    let (hits, recall, first_relevant_rank) = score_case(&case, &retrieved_ids);

    let relevant: HashSet<String> = case.relevant.iter().map(|id| identity::normalize(id)).collect();
    let retrieved = result
      .as_ref()
      .map(|r| {
        r.hits
          .iter()
          .enumerate()
          .map(|(position, hit)| RetrievedEntry {
            rank: position + 1,
            canonical_id: hit.profile.canonical_id.clone(),
            relevance_score: hit.relevance_score,
            hit: relevant.contains(&hit.profile.canonical_id),
          })
          .collect()
      })
      .unwrap_or_default();

    reports.push(CaseReport {
      query: case.query,
      relevant: case.relevant,
      notes: case.notes,
      hits,
      recall,
      first_relevant_rank,
      latency_ms,
      reranked: result.as_ref().is_some_and(|r| r.ranking == RankingSource::Reranked),
      retrieved,
      error,
    });
  }

  let summary = summarize(&reports, top_k, fanout);
  info!(
    cases = summary.total_cases,
    hit_rate = summary.hit_rate,
    mrr = summary.mean_reciprocal_rank,
    "Evaluation finished"
  );
  EvalReport { summary, cases: reports }
}

pub fn summarize(cases: &[CaseReport], top_k: usize, fanout: usize) -> EvalSummary {
  let total_cases = cases.len();
  let per_case = |value: f64| if total_cases == 0 { 0.0 } else { value / total_cases as f64 };

  let hits = cases.iter().filter(|c| c.first_relevant_rank.is_some()).count();
  let reciprocal_rank_sum: f64 = cases.iter().filter_map(|c| c.first_relevant_rank).map(|rank| 1.0 / rank as f64).sum();
  let latency_sum: f64 = cases.iter().map(|c| c.latency_ms).sum();
  let recalls: Vec<f64> = cases.iter().filter_map(|c| c.recall).collect();

  EvalSummary {
    total_cases,
    hit_rate: per_case(hits as f64),
    mean_recall: (!recalls.is_empty()).then(|| recalls.iter().sum::<f64>() / recalls.len() as f64),
    mean_reciprocal_rank: per_case(reciprocal_rank_sum),
    avg_latency_ms: per_case(latency_sum),
    top_k,
    fanout,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  fn case(relevant: &[&str]) -> EvalCase {
    EvalCase { query: "rust".into(), relevant: relevant.iter().map(|s| s.to_string()).collect(), notes: None }
  }

  fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_score_case_normalizes_labels() {
    let (hits, recall, first) = score_case(
      &case(&["https://X/in/B/", "https://x/in/z"]),
      &ids(&["https://x/in/a", "https://x/in/b", "https://x/in/c"]),
    );
    assert_eq!(hits, 1);
    assert_eq!(recall, Some(0.5));
    assert_eq!(first, Some(2));
  }

  #[test]
  fn test_unlabelled_case_has_no_recall() {
    let (hits, recall, first) = score_case(&case(&[]), &ids(&["https://x/in/a"]));
    assert_eq!((hits, recall, first), (0, None, None));
  }

  #[test]
  fn test_summary_metrics() {
    let report = |first: Option<usize>, recall: Option<f64>, latency_ms: f64| CaseReport {
      query: "q".into(),
      relevant: Vec::new(),
      notes: None,
      hits: usize::from(first.is_some()),
      recall,
      first_relevant_rank: first,
      latency_ms,
      reranked: true,
      retrieved: Vec::new(),
      error: None,
    };
    let summary = summarize(&[report(Some(1), Some(1.0), 10.0), report(Some(4), Some(0.5), 20.0), report(None, None, 30.0)], 5, 20);

    assert!((summary.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((summary.mean_reciprocal_rank - (1.0 + 0.25) / 3.0).abs() < 1e-9);
    assert_eq!(summary.mean_recall, Some(0.75));
    assert_eq!(summary.avg_latency_ms, 20.0);
    assert_eq!((summary.top_k, summary.fanout), (5, 20));
  }

  #[test]
  fn test_load_cases_skips_comments() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "# staffing queries")?;
    writeln!(file, r#"{{"query": "rust engineer berlin", "relevant": ["https://x/in/a"]}}"#)?;
    writeln!(file)?;
    writeln!(file, r#"{{"query": "designer", "notes": "no labels yet"}}"#)?;

    let cases = load_cases(file.path())?;
    assert_eq!(cases.len(), 2);
    assert!(cases[1].relevant.is_empty());
    assert_eq!(cases[1].notes.as_deref(), Some("no labels yet"));
    Ok(())
  }
}
