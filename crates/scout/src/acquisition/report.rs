//! Run reports
//!
//! A report is emitted when a run ends. Besides being printed it is appended
//! as one JSON line to the run log so past runs can be audited.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use super::run::{AcquisitionRun, StopReason};
use crate::models::TargetKind;

/// What happened to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
  Completed,
  /// Every discovered stub was already known
  NothingNew,
  DiscoveryFailed,
  ExtractionFailed,
  /// Extracted and charged, but a corpus write failed
  CommitFailed,
  /// The projection crossed the ceiling; nothing was extracted
  BudgetExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
  pub kind: TargetKind,
  pub value: String,
  pub outcome: TargetOutcome,
  pub discovered: usize,
  pub deduplicated: usize,
  pub extracted: usize,
  pub committed: usize,
  /// Writes absorbed by the store's uniqueness constraint
  pub duplicates_absorbed: usize,
  pub embedded: usize,
  pub embedding_failures: usize,
  pub projected_cost: f64,
  pub charged: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl TargetReport {
  pub fn new(kind: TargetKind, value: &str) -> Self {
    Self {
      kind,
      value: value.to_string(),
      outcome: TargetOutcome::Completed,
      discovered: 0,
      deduplicated: 0,
      extracted: 0,
      committed: 0,
      duplicates_absorbed: 0,
      embedded: 0,
      embedding_failures: 0,
      projected_cost: 0.0,
      charged: 0.0,
      error: None,
    }
  }

  pub fn label(&self) -> String {
    format!("{}:{}", self.kind, self.value)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id: Uuid,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub budget_ceiling: f64,
  pub per_thousand_rate: f64,
  pub spent: f64,
  pub stop_reason: StopReason,
  pub discovered_count: usize,
  pub deduplicated_count: usize,
  pub extracted_count: usize,
  pub committed_count: usize,
  pub targets: Vec<TargetReport>,
  /// Targets never reached because the run stopped early
  #[serde(default)]
  pub skipped_targets: Vec<String>,
}

impl RunReport {
  pub fn from_run(run: &AcquisitionRun, targets: Vec<TargetReport>, skipped_targets: Vec<String>) -> Self {
    Self {
      run_id: run.run_id,
      started_at: run.started_at,
      finished_at: Utc::now(),
      budget_ceiling: run.budget_ceiling,
      per_thousand_rate: run.per_thousand_rate,
      spent: run.spent,
      stop_reason: run.stop_reason(),
      discovered_count: run.discovered_count,
      deduplicated_count: run.deduplicated_count,
      extracted_count: run.extracted_count,
      committed_count: run.committed_count,
      targets,
      skipped_targets,
    }
  }

  /// Append this report as one JSON line, creating the file if needed
  pub fn append_to(&self, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("Failed to open run log {}", path.display()))?;
    let line = serde_json::to_string(self)?;
    writeln!(file, "{line}")?;
    Ok(())
  }

  /// Read every report from a run log
  pub fn read_all(path: &Path) -> anyhow::Result<Vec<RunReport>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(|line| serde_json::from_str(line).context("Invalid run log line"))
      .collect()
  }
}
