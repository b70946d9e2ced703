use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use super::display;
use crate::acquisition::{AcquisitionRun, RunReport, StopReason};
use crate::eval;
use crate::identity;
use crate::membership::CorpusMembershipIndex;
use crate::models::{SearchQuery, TargetList};
use crate::services::Services;

/// Print the canonical id of each identifier
pub fn normalize(identifiers: &[String]) -> Result<()> {
  for identifier in identifiers {
    println!("{}", identity::normalize(identifier));
  }
  Ok(())
}

/// Run the acquisition pipeline over a target file
pub async fn acquire(services: &Services, targets: &Path, budget: f64, rate: Option<f64>, embed: bool, json: bool) -> Result<()> {
  let list = TargetList::load_from_file(targets)?;
  if list.targets.is_empty() {
    println!("{} No targets in {}", "!".yellow(), targets.display());
    return Ok(());
  }

  let rate = rate.unwrap_or(services.config.acquisition.per_thousand_rate);
  let run = AcquisitionRun::new(list.targets, budget, rate)?;

  let mut membership = CorpusMembershipIndex::load_from_store(services.store.as_ref()).await?;
  let orchestrator = services.orchestrator(embed)?;
  let report = orchestrator.execute(run, &mut membership).await?;

  let log_path = services.runs_log();
  report.append_to(&log_path).with_context(|| format!("Failed to record run in {}", log_path.display()))?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    display::print_run_report(&report);
  }

  if report.stop_reason == StopReason::StorageFailure {
    anyhow::bail!("Run {} stopped on a corpus write failure; see {}", report.run_id, log_path.display());
  }
  Ok(())
}

/// Past run reports, most recent last
pub fn runs(services: &Services, last: usize, json: bool) -> Result<()> {
  let log_path = services.runs_log();
  if !log_path.exists() {
    println!("{} No runs recorded in {}", "!".yellow(), log_path.display());
    return Ok(());
  }

  let reports = RunReport::read_all(&log_path)?;
  let recent = &reports[reports.len().saturating_sub(last)..];
  if json {
    println!("{}", serde_json::to_string_pretty(recent)?);
  } else {
    display::print_run_history(recent);
  }
  Ok(())
}

/// Hybrid search from the command line
pub async fn search(
  services: &Services,
  terms: &[String],
  top_k: Option<usize>,
  fanout: Option<usize>,
  rerank: bool,
  json: bool,
) -> Result<()> {
  let text = terms.join(" ");
  let top_k = top_k.unwrap_or(services.config.search.default_top_k);
  let fanout = fanout.unwrap_or_else(|| services.config.search.default_fanout.max(top_k));
  let query = SearchQuery::new(text.clone(), fanout, top_k);
  query.validate()?;

  let retriever = services.retriever(rerank)?;
  let result = retriever.search(&query).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    display::print_search_result(&text, &result);
  }
  Ok(())
}

/// Embed stored profiles that have no vector for the active model
pub async fn backfill(services: &Services, limit: usize) -> Result<()> {
  let index = services.embedding_index()?;
  let report = index.backfill(limit).await?;
  display::print_backfill(&report);
  Ok(())
}

/// Replay labelled queries and report retrieval quality
pub async fn eval(
  services: &Services,
  cases: &Path,
  top_k: Option<usize>,
  fanout: Option<usize>,
  rerank: bool,
  report_json: Option<&Path>,
) -> Result<()> {
  let cases = eval::load_cases(cases)?;
  let top_k = top_k.unwrap_or(services.config.search.default_top_k);
  let fanout = fanout.unwrap_or_else(|| services.config.search.default_fanout.max(top_k));
  SearchQuery::new("eval", fanout, top_k).validate()?;

  let retriever = services.retriever(rerank)?;
  let report = eval::run_evaluation(&retriever, cases, top_k, fanout).await;
  display::print_eval_report(&report);

  if let Some(path) = report_json {
    std::fs::write(path, serde_json::to_string_pretty(&report)?)
      .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{} Wrote report to {}", "✓".green(), path.display());
  }
  Ok(())
}

/// Corpus counters
pub async fn stats(services: &Services, json: bool) -> Result<()> {
  let stats = services.store.stats().await?;
  if json {
    println!("{}", serde_json::to_string_pretty(&stats)?);
  } else {
    display::print_stats(&stats);
  }
  Ok(())
}
