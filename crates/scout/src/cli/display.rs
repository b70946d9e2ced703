//! Terminal rendering for command output

use colored::*;

use crate::acquisition::{RunReport, StopReason, TargetOutcome};
use crate::eval::EvalReport;
use crate::index::BackfillReport;
use crate::models::{RankingSource, SearchResult};
use crate::store::CorpusStats;

fn outcome_label(outcome: TargetOutcome) -> ColoredString {
  match outcome {
    TargetOutcome::Completed => "completed".green(),
    TargetOutcome::NothingNew => "nothing new".dimmed(),
    TargetOutcome::DiscoveryFailed => "discovery failed".red(),
    TargetOutcome::ExtractionFailed => "extraction failed".red(),
    TargetOutcome::CommitFailed => "commit failed".red(),
    TargetOutcome::BudgetExceeded => "budget exceeded".yellow(),
  }
}

pub fn print_run_report(report: &RunReport) {
  println!("{} Run {}", "▶".cyan(), report.run_id.to_string().dimmed());
  for target in &report.targets {
    println!(
      "  {} [{}] discovered {}, deduplicated {}, extracted {}, committed {}, charged {:.2}",
      target.label().bold(),
      outcome_label(target.outcome),
      target.discovered,
      target.deduplicated,
      target.extracted,
      target.committed,
      target.charged
    );
    if target.embedding_failures > 0 {
      println!("    {} {} profiles stored without embeddings", "!".yellow(), target.embedding_failures);
    }
    if let Some(error) = &target.error {
      println!("    {} {}", "✗".red(), error);
    }
  }
  for skipped in &report.skipped_targets {
    println!("  {} [{}]", skipped.dimmed(), "not reached".yellow());
  }

  let stop = match report.stop_reason {
    StopReason::ExhaustedTargets => "exhausted_targets".green(),
    StopReason::BudgetExceeded => "budget_exceeded".yellow(),
    StopReason::StorageFailure => "storage_failure".red(),
  };
  println!(
    "{} Spent {:.2} of {:.2}; {} committed; stop reason: {}",
    "✓".green(),
    report.spent,
    report.budget_ceiling,
    report.committed_count,
    stop
  );
}

pub fn print_run_history(reports: &[RunReport]) {
  for report in reports {
    println!(
      "{} {} spent {:.2} of {:.2}, committed {} of {} extracted, stop reason: {}",
      report.started_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
      report.run_id.to_string().cyan(),
      report.spent,
      report.budget_ceiling,
      report.committed_count,
      report.extracted_count,
      report.stop_reason
    );
  }
}

pub fn print_search_result(query: &str, result: &SearchResult) {
  if result.is_empty() {
    match result.ranking {
      RankingSource::Unavailable => println!("{} Query could not be embedded; try again later", "!".yellow()),
      _ => println!("No candidates found for: {}", query.yellow()),
    }
    return;
  }

  let ranking = match result.ranking {
    RankingSource::Reranked => "reranked".green(),
    RankingSource::EmbeddingOrder => "embedding order".yellow(),
    RankingSource::Unavailable => "unavailable".red(),
  };
  println!("{} results for {} ({})", result.len(), query.cyan(), ranking);

  for (position, hit) in result.hits.iter().enumerate() {
    println!(
      "{:>3}. {} {} {}",
      position + 1,
      hit.profile.display_name().bold(),
      hit.profile.canonical_id.dimmed(),
      format!("[{:.3}]", hit.relevance_score).blue()
    );
    if let Some(rationale) = &hit.rationale {
      println!("     {}", rationale.italic());
    }
  }
}

pub fn print_backfill(report: &BackfillReport) {
  println!(
    "{} Embedded {} of {} profiles ({} failed)",
    "✓".green(),
    report.embedded,
    report.attempted,
    report.failed
  );
}

pub fn print_eval_report(report: &EvalReport) {
  for case in &report.cases {
    let marker = if case.first_relevant_rank.is_some() { "✓".green() } else { "✗".red() };
    let rank = case.first_relevant_rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
    println!("{} {} (first hit: {}, {:.0}ms)", marker, case.query, rank, case.latency_ms);
  }

  let summary = &report.summary;
  println!("{}", "Summary".bold());
  println!("  cases: {}", summary.total_cases);
  println!("  top_k / fanout: {} / {}", summary.top_k, summary.fanout);
  println!("  hit rate: {:.3}", summary.hit_rate);
  match summary.mean_recall {
    Some(recall) => println!("  mean recall@{}: {:.3}", summary.top_k, recall),
    None => println!("  mean recall@{}: n/a", summary.top_k),
  }
  println!("  mean reciprocal rank: {:.3}", summary.mean_reciprocal_rank);
  println!("  avg latency: {:.1}ms", summary.avg_latency_ms);
}

pub fn print_stats(stats: &CorpusStats) {
  println!("{} {}", "Profiles:".bold(), stats.profiles);
  println!("{} {}", "Embedded:".bold(), stats.embedded);
  for (model, count) in &stats.models {
    println!("  {} {}", model.cyan(), count);
  }
}
