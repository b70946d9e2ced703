//! Acquisition targets and target list files

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ScoutError};

/// What a target's `value` means to the discovery vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
  Location,
  Query,
  CompanyFilter,
}

impl std::fmt::Display for TargetKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      TargetKind::Location => "location",
      TargetKind::Query => "query",
      TargetKind::CompanyFilter => "company-filter",
    };
    f.write_str(name)
  }
}

/// One unit of acquisition work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionTarget {
  pub kind: TargetKind,
  pub value: String,
  /// Cap on discovered candidates for this target; must be positive
  pub max_items: u32,
}

impl AcquisitionTarget {
  pub fn new(kind: TargetKind, value: impl Into<String>, max_items: u32) -> Self {
    Self { kind, value: value.into(), max_items }
  }

  pub fn location(value: impl Into<String>, max_items: u32) -> Self {
    Self::new(TargetKind::Location, value, max_items)
  }

  pub fn query(value: impl Into<String>, max_items: u32) -> Self {
    Self::new(TargetKind::Query, value, max_items)
  }

  pub fn company(value: impl Into<String>, max_items: u32) -> Self {
    Self::new(TargetKind::CompanyFilter, value, max_items)
  }

  /// Short label used in logs and run reports
  pub fn label(&self) -> String {
    format!("{}:{}", self.kind, self.value)
  }

  pub fn validate(&self) -> Result<()> {
    if self.max_items == 0 {
      return Err(ScoutError::InvalidTarget(format!("{} has max_items = 0", self.label())));
    }
    if self.value.trim().is_empty() {
      return Err(ScoutError::InvalidTarget(format!("{} target has an empty value", self.kind)));
    }
    Ok(())
  }
}

/// Ordered target list as stored in a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetList {
  #[serde(default)]
  pub targets: Vec<AcquisitionTarget>,
}

impl TargetList {
  /// Load a target list from YAML; order in the file is processing order
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|e| anyhow::anyhow!("Failed to read target list {}: {}", path.display(), e))?;
    let list: TargetList = serde_yaml::from_str(&content)
      .map_err(|e| anyhow::anyhow!("Invalid target list {}: {}", path.display(), e))?;
    Ok(list)
  }
}
