//! Per-invocation run state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, ScoutError};
use crate::models::AcquisitionTarget;

/// Position of a run in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  Init,
  Discover,
  Filter,
  Extract,
  Commit,
  Done,
  BudgetExceeded,
  /// A corpus write failed during COMMIT
  StorageFailed,
}

impl RunState {
  pub fn is_terminal(self) -> bool {
    matches!(self, RunState::Done | RunState::BudgetExceeded | RunState::StorageFailed)
  }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
  ExhaustedTargets,
  BudgetExceeded,
  StorageFailure,
}

impl std::fmt::Display for StopReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StopReason::ExhaustedTargets => f.write_str("exhausted_targets"),
      StopReason::BudgetExceeded => f.write_str("budget_exceeded"),
      StopReason::StorageFailure => f.write_str("storage_failure"),
    }
  }
}

/// Projected extraction charge for `count` items at a per-thousand rate
pub fn project_cost(count: usize, per_thousand_rate: f64) -> f64 {
  (count as f64 / 1000.0) * per_thousand_rate
}

/// Accounting for one acquisition invocation
///
/// Passed by `&mut` through every stage; nothing about a run lives in shared
/// state, so concurrent runs cannot corrupt each other's spend.
#[derive(Debug, Clone)]
pub struct AcquisitionRun {
  pub run_id: Uuid,
  pub targets: Vec<AcquisitionTarget>,
  pub budget_ceiling: f64,
  pub per_thousand_rate: f64,
  pub spent: f64,
  pub discovered_count: usize,
  pub deduplicated_count: usize,
  pub extracted_count: usize,
  pub committed_count: usize,
  pub started_at: DateTime<Utc>,
  state: RunState,
}

impl AcquisitionRun {
  /// Validate inputs and create a run in `Init`
  pub fn new(targets: Vec<AcquisitionTarget>, budget_ceiling: f64, per_thousand_rate: f64) -> Result<Self> {
    if !budget_ceiling.is_finite() || budget_ceiling < 0.0 {
      return Err(ScoutError::InvalidConfig(format!("budget ceiling {budget_ceiling} must be a non-negative amount")));
    }
    if !per_thousand_rate.is_finite() || per_thousand_rate < 0.0 {
      return Err(ScoutError::InvalidConfig(format!(
        "extraction rate {per_thousand_rate} must be a non-negative amount"
      )));
    }
    for target in &targets {
      target.validate()?;
    }

    Ok(Self {
      run_id: Uuid::new_v4(),
      targets,
      budget_ceiling,
      per_thousand_rate,
      spent: 0.0,
      discovered_count: 0,
      deduplicated_count: 0,
      extracted_count: 0,
      committed_count: 0,
      started_at: Utc::now(),
      state: RunState::Init,
    })
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  pub(crate) fn enter(&mut self, state: RunState) {
    debug!(run_id = %self.run_id, from = ?self.state, to = ?state, "Run state transition");
    self.state = state;
  }

  pub fn project_cost(&self, surviving: usize) -> f64 {
    project_cost(surviving, self.per_thousand_rate)
  }

  /// Whether spending `projected` more would cross the ceiling
  pub fn would_exceed(&self, projected: f64) -> bool {
    self.spent + projected > self.budget_ceiling
  }

  /// Add a charge; spend never decreases
  pub fn charge(&mut self, amount: f64) {
    if amount.is_finite() && amount > 0.0 {
      self.spent += amount;
    }
  }

  pub fn remaining(&self) -> f64 {
    (self.budget_ceiling - self.spent).max(0.0)
  }

  pub fn stop_reason(&self) -> StopReason {
    match self.state {
      RunState::BudgetExceeded => StopReason::BudgetExceeded,
      RunState::StorageFailed => StopReason::StorageFailure,
      _ => StopReason::ExhaustedTargets,
    }
  }
}
