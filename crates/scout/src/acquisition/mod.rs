//! Acquisition orchestrator
//!
//! Grows the corpus from an ordered target list under a hard spend ceiling.
//! Each target goes through DISCOVER, FILTER, a cost projection, EXTRACT and
//! COMMIT, strictly one target at a time so the projection always sees the
//! true running total. Vendor failures skip the target; a projection that
//! would cross the ceiling ends the run before any extraction call is made.
//! A failed corpus write also ends the run, after the extraction it belongs
//! to has been charged, and the report still describes everything done.

pub mod report;
pub mod run;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{Capability, Result};
use crate::identity;
use crate::index::EmbeddingIndex;
use crate::membership::CorpusMembershipIndex;
use crate::models::{AcquisitionTarget, CandidateProfile, ProfileStub};
use crate::store::{SharedCorpusStore, UpsertOutcome};
use crate::vendors::{with_timeout, SharedDiscovery, SharedExtraction};

pub use report::{RunReport, TargetOutcome, TargetReport};
pub use run::{project_cost, AcquisitionRun, RunState, StopReason};

/// Stubs that survived FILTER and how many were dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
  pub survivors: Vec<ProfileStub>,
  /// Already in the corpus, or repeated within the batch
  pub dropped: usize,
  /// Identifiers that normalize to nothing
  pub invalid: usize,
}

/// Drop stubs whose canonical id is already a member or repeats within the batch
pub fn filter_stubs(stubs: Vec<ProfileStub>, membership: &CorpusMembershipIndex) -> FilterOutcome {
  let mut outcome = FilterOutcome::default();
  let mut seen = HashSet::new();

  for stub in stubs {
    let canonical_id = stub.canonical_id();
    if canonical_id.is_empty() {
      outcome.invalid += 1;
    } else if membership.contains(&canonical_id) || !seen.insert(canonical_id) {
      outcome.dropped += 1;
    } else {
      outcome.survivors.push(stub);
    }
  }
  outcome
}

/// Timeouts and switches for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
  pub discovery_timeout: Duration,
  pub extraction_timeout: Duration,
}

impl Default for OrchestratorSettings {
  fn default() -> Self {
    Self { discovery_timeout: Duration::from_secs(60), extraction_timeout: Duration::from_secs(300) }
  }
}

pub struct AcquisitionOrchestrator {
  discovery: SharedDiscovery,
  extraction: SharedExtraction,
  store: SharedCorpusStore,
  embedding: Option<Arc<EmbeddingIndex>>,
  settings: OrchestratorSettings,
}

impl AcquisitionOrchestrator {
  pub fn new(
    discovery: SharedDiscovery,
    extraction: SharedExtraction,
    store: SharedCorpusStore,
    settings: OrchestratorSettings,
  ) -> Self {
    Self { discovery, extraction, store, embedding: None, settings }
  }

  /// Embed every newly committed profile right after it is persisted
  pub fn with_embed_on_commit(mut self, index: Arc<EmbeddingIndex>) -> Self {
    self.embedding = Some(index);
    self
  }

  /// Process every target of `run` in order and return its report
  ///
  /// A storage failure during COMMIT stops the run with
  /// `StopReason::StorageFailure` instead of discarding the report.
  ///
  /// `membership` outlives the run: commits are added to it as they happen,
  /// so later targets (and later runs sharing it) never re-extract them.
  pub async fn execute(&self, mut run: AcquisitionRun, membership: &mut CorpusMembershipIndex) -> Result<RunReport> {
    info!(
      run_id = %run.run_id,
      targets = run.targets.len(),
      budget_ceiling = run.budget_ceiling,
      rate = run.per_thousand_rate,
      "Starting acquisition run"
    );

    let targets = run.targets.clone();
    let mut reports = Vec::with_capacity(targets.len());
    let mut skipped = Vec::new();

    for (position, target) in targets.iter().enumerate() {
      let report = self.process_target(&mut run, target, membership).await?;
      reports.push(report);

      if run.state().is_terminal() {
        skipped = targets[position + 1..].iter().map(AcquisitionTarget::label).collect();
        break;
      }
    }

    if !run.state().is_terminal() {
      run.enter(RunState::Done);
    }

    let report = RunReport::from_run(&run, reports, skipped);
    info!(
      run_id = %report.run_id,
      stop_reason = %report.stop_reason,
      spent = report.spent,
      discovered = report.discovered_count,
      deduplicated = report.deduplicated_count,
      extracted = report.extracted_count,
      committed = report.committed_count,
      "Acquisition run finished"
    );
    Ok(report)
  }

  async fn process_target(
    &self,
    run: &mut AcquisitionRun,
    target: &AcquisitionTarget,
    membership: &mut CorpusMembershipIndex,
  ) -> Result<TargetReport> {
    let label = target.label();
    let mut report = TargetReport::new(target.kind, &target.value);

    // DISCOVER
    run.enter(RunState::Discover);
    let stubs = match with_timeout(Capability::Discovery, self.settings.discovery_timeout, self.discovery.discover(target)).await {
      Ok(mut stubs) => {
        stubs.truncate(target.max_items as usize);
        stubs
      }
      Err(err) => {
        warn!(target = %label, stage = "discover", error = %err, "Skipping target");
        report.outcome = TargetOutcome::DiscoveryFailed;
        report.error = Some(err.to_string());
        return Ok(report);
      }
    };
    report.discovered = stubs.len();
    run.discovered_count += stubs.len();

    // FILTER
    run.enter(RunState::Filter);
    let filtered = filter_stubs(stubs, membership);
    report.deduplicated = filtered.dropped;
    run.deduplicated_count += filtered.dropped;
    if filtered.invalid > 0 {
      debug!(target = %label, invalid = filtered.invalid, "Dropped stubs without an identifier");
    }
    if filtered.survivors.is_empty() {
      report.outcome = TargetOutcome::NothingNew;
      return Ok(report);
    }

    // projection, strictly before extraction
    let projected = run.project_cost(filtered.survivors.len());
    report.projected_cost = projected;
    if run.would_exceed(projected) {
      info!(
        target = %label,
        surviving = filtered.survivors.len(),
        projected,
        spent = run.spent,
        remaining = run.remaining(),
        "Budget ceiling reached, stopping run"
      );
      run.enter(RunState::BudgetExceeded);
      report.outcome = TargetOutcome::BudgetExceeded;
      return Ok(report);
    }

    // EXTRACT
    run.enter(RunState::Extract);
    let identifiers: Vec<String> = filtered.survivors.into_iter().map(|stub| stub.raw_identifier).collect();
    let batch = match with_timeout(
      Capability::Extraction,
      self.settings.extraction_timeout,
      self.extraction.extract(&identifiers),
    )
    .await
    {
      Ok(batch) => batch,
      Err(err) => {
        warn!(target = %label, stage = "extract", requested = identifiers.len(), error = %err, "Skipping target");
        report.outcome = TargetOutcome::ExtractionFailed;
        report.error = Some(err.to_string());
        return Ok(report);
      }
    };
    if batch.profiles.len() < identifiers.len() {
      debug!(target = %label, requested = identifiers.len(), returned = batch.profiles.len(), "Short extraction accepted");
    }
    report.extracted = batch.profiles.len();
    run.extracted_count += batch.profiles.len();

    // the vendor has been paid whatever happens to the commit
    let charge = match batch.reported_cost {
      Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
      _ => projected,
    };
    run.charge(charge);
    report.charged = charge;

    // COMMIT
    run.enter(RunState::Commit);
    for extracted in batch.profiles {
      let canonical_id = identity::normalize(&extracted.raw_identifier);
      if canonical_id.is_empty() || membership.contains(&canonical_id) {
        debug!(target = %label, canonical_id = %canonical_id, "Extracted profile already a member, not committed");
        continue;
      }

      let profile = CandidateProfile::new(extracted.raw_identifier, extracted.attributes);
      let outcome = match self.store.upsert(&profile).await {
        Ok(outcome) => outcome,
        Err(err) => {
          error!(
            target = %label,
            stage = "commit",
            canonical_id = %profile.canonical_id,
            committed = report.committed,
            error = %err,
            "Corpus write failed, stopping run"
          );
          run.enter(RunState::StorageFailed);
          report.outcome = TargetOutcome::CommitFailed;
          report.error = Some(err.to_string());
          return Ok(report);
        }
      };

      membership.add(profile.canonical_id.clone());
      match outcome {
        UpsertOutcome::Inserted => {
          report.committed += 1;
          run.committed_count += 1;
          self.embed_committed(&profile, &label, &mut report).await;
        }
        UpsertOutcome::AlreadyPresent => {
          debug!(target = %label, canonical_id = %profile.canonical_id, "Duplicate write absorbed by store");
          report.duplicates_absorbed += 1;
        }
      }
    }

    info!(
      target = %label,
      discovered = report.discovered,
      deduplicated = report.deduplicated,
      extracted = report.extracted,
      committed = report.committed,
      charged = charge,
      spent = run.spent,
      "Target complete"
    );
    Ok(report)
  }

  async fn embed_committed(&self, profile: &CandidateProfile, label: &str, report: &mut TargetReport) {
    let Some(index) = self.embedding.as_ref() else { return };
    match index.embed_and_store(profile).await {
      Ok(_) => report.embedded += 1,
      Err(err) => {
        warn!(target = %label, stage = "embed", canonical_id = %profile.canonical_id, error = %err, "Profile stored without embedding");
        report.embedding_failures += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ExtractedProfile, ExtractionBatch};
  use crate::store::{CorpusStore, MemoryCorpusStore};
  use crate::vendors::{MockDiscoveryProvider, MockExtractionProvider};

  fn stubs(ids: &[&str]) -> Vec<ProfileStub> {
    ids.iter().map(|id| ProfileStub::new(*id)).collect()
  }

  fn batch_for(ids: &[String]) -> ExtractionBatch {
    ExtractionBatch {
      profiles: ids
        .iter()
        .map(|id| ExtractedProfile { raw_identifier: id.clone(), attributes: Default::default() })
        .collect(),
      reported_cost: None,
    }
  }

  #[test]
  fn test_filter_drops_known_and_repeated_ids() {
    let mut membership = CorpusMembershipIndex::new();
    membership.add_many(["https://x/in/a", "https://x/in/b"]);

    let outcome = filter_stubs(stubs(&["https://x/in/A/", "https://x/in/c", "https://x/in/C", "  "]), &membership);
    let survivors: Vec<_> = outcome.survivors.iter().map(|s| s.raw_identifier.as_str()).collect();
    assert_eq!(survivors, vec!["https://x/in/c"]);
    assert_eq!(outcome.dropped, 2);
    assert_eq!(outcome.invalid, 1);
  }

  #[tokio::test]
  async fn test_budget_exceeded_before_extraction() -> Result<()> {
    let mut discovery = MockDiscoveryProvider::new();
    discovery
      .expect_discover()
      .returning(|_| Ok((0..4000).map(|i| ProfileStub::new(format!("https://x/in/p{i}"))).collect()));
    let mut extraction = MockExtractionProvider::new();
    extraction.expect_extract().times(0);

    let orchestrator = AcquisitionOrchestrator::new(
      Arc::new(discovery),
      Arc::new(extraction),
      Arc::new(MemoryCorpusStore::new()),
      OrchestratorSettings::default(),
    );
    let run = AcquisitionRun::new(
      vec![AcquisitionTarget::location("Berlin", 5000), AcquisitionTarget::query("rust", 10)],
      10.0,
      3.0,
    )?;

    let report = orchestrator.execute(run, &mut CorpusMembershipIndex::new()).await?;
    assert_eq!(report.stop_reason, StopReason::BudgetExceeded);
    assert_eq!(report.spent, 0.0);
    assert_eq!(report.targets[0].outcome, TargetOutcome::BudgetExceeded);
    assert!((report.targets[0].projected_cost - 12.0).abs() < 1e-9);
    assert_eq!(report.skipped_targets, vec!["query:rust".to_string()]);
    Ok(())
  }

  #[tokio::test]
  async fn test_discovery_failure_skips_only_that_target() -> Result<()> {
    let mut discovery = MockDiscoveryProvider::new();
    discovery.expect_discover().returning(|target| {
      if target.value == "broken" {
        Err(anyhow::anyhow!("503 from vendor"))
      } else {
        Ok(vec![ProfileStub::new("https://x/in/new")])
      }
    });
    let mut extraction = MockExtractionProvider::new();
    extraction.expect_extract().times(1).returning(|ids| Ok(batch_for(ids)));

    let store = Arc::new(MemoryCorpusStore::new());
    let orchestrator =
      AcquisitionOrchestrator::new(Arc::new(discovery), Arc::new(extraction), store.clone(), OrchestratorSettings::default());
    let run = AcquisitionRun::new(
      vec![AcquisitionTarget::query("broken", 10), AcquisitionTarget::query("rust", 10)],
      100.0,
      1.0,
    )?;

    let report = orchestrator.execute(run, &mut CorpusMembershipIndex::new()).await?;
    assert_eq!(report.stop_reason, StopReason::ExhaustedTargets);
    assert_eq!(report.targets[0].outcome, TargetOutcome::DiscoveryFailed);
    assert!(report.targets[0].error.as_deref().unwrap_or_default().contains("503"));
    assert_eq!(report.targets[1].outcome, TargetOutcome::Completed);
    assert_eq!(report.committed_count, 1);
    assert!(store.get("https://x/in/new").await?.is_some());
    Ok(())
  }

  #[tokio::test]
  async fn test_reported_cost_replaces_projection() -> Result<()> {
    let mut discovery = MockDiscoveryProvider::new();
    discovery.expect_discover().returning(|_| Ok(stubs(&["https://x/in/a", "https://x/in/b"])));
    let mut extraction = MockExtractionProvider::new();
    extraction.expect_extract().returning(|ids| {
      let mut batch = batch_for(&ids[..1]);
      batch.reported_cost = Some(0.25);
      Ok(batch)
    });

    let orchestrator = AcquisitionOrchestrator::new(
      Arc::new(discovery),
      Arc::new(extraction),
      Arc::new(MemoryCorpusStore::new()),
      OrchestratorSettings::default(),
    );
    let run = AcquisitionRun::new(vec![AcquisitionTarget::company("Acme", 10)], 5.0, 1000.0)?;

    let report = orchestrator.execute(run, &mut CorpusMembershipIndex::new()).await?;
    assert_eq!(report.spent, 0.25);
    assert_eq!(report.targets[0].extracted, 1);
    assert_eq!(report.targets[0].committed, 1);
    Ok(())
  }

  #[tokio::test]
  async fn test_commits_are_visible_to_later_targets() -> Result<()> {
    let mut discovery = MockDiscoveryProvider::new();
    discovery.expect_discover().returning(|_| Ok(stubs(&["https://x/in/shared/"])));
    let mut extraction = MockExtractionProvider::new();
    extraction.expect_extract().times(1).returning(|ids| Ok(batch_for(ids)));

    let orchestrator = AcquisitionOrchestrator::new(
      Arc::new(discovery),
      Arc::new(extraction),
      Arc::new(MemoryCorpusStore::new()),
      OrchestratorSettings::default(),
    );
    let run = AcquisitionRun::new(
      vec![AcquisitionTarget::location("Berlin", 10), AcquisitionTarget::location("Munich", 10)],
      10.0,
      1.0,
    )?;

    let mut membership = CorpusMembershipIndex::new();
    let report = orchestrator.execute(run, &mut membership).await?;
    assert_eq!(report.targets[1].outcome, TargetOutcome::NothingNew);
    assert_eq!(report.targets[1].deduplicated, 1);
    assert!(membership.contains("https://x/in/shared"));
    Ok(())
  }
}
