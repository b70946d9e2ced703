use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use scout::cli::commands;
use scout::config::ScoutConfig;
use scout::services::Services;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Scout - candidate acquisition and hybrid search\nGrows a deduplicated candidate corpus and ranks it for recruiting queries")]
#[command(version)]
struct Cli {
  /// Path to a YAML config file
  #[arg(long, global = true, env = "SCOUT_CONFIG")]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

/// Retrieval sizing shared by search and eval
#[derive(Args)]
struct RetrievalArgs {
  /// Number of results to return
  #[arg(short = 'k', long)]
  top_k: Option<usize>,
  /// Candidates retrieved before reranking (must be >= top_k)
  #[arg(short, long)]
  fanout: Option<usize>,
  /// Keep the embedding order instead of reranking
  #[arg(long)]
  no_rerank: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the canonical form of profile identifiers
  Normalize {
    #[arg(required = true)]
    identifiers: Vec<String>,
  },
  /// Discover, deduplicate and extract candidates for a target list
  Acquire {
    /// YAML file listing targets in processing order
    #[arg(short, long)]
    targets: PathBuf,
    /// Hard spend ceiling for this run
    #[arg(short, long)]
    budget: f64,
    /// Extraction price per thousand profiles (overrides config)
    #[arg(long)]
    rate: Option<f64>,
    /// Skip embedding committed profiles
    #[arg(long)]
    no_embed: bool,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
  },
  /// List recorded acquisition runs
  Runs {
    /// Show only the most recent N runs
    #[arg(short, long, default_value_t = 10)]
    last: usize,
    #[arg(long)]
    json: bool,
  },
  /// Search the corpus
  Search {
    #[command(flatten)]
    retrieval: RetrievalArgs,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// Search terms (space-separated)
    #[arg(required = true)]
    terms: Vec<String>,
  },
  /// Embed stored profiles that have no vector yet
  Backfill {
    #[arg(short, long, default_value_t = 500)]
    limit: usize,
  },
  /// Replay a JSONL file of labelled queries and report Recall@K and MRR
  Eval {
    cases: PathBuf,
    #[command(flatten)]
    retrieval: RetrievalArgs,
    /// Also write the full report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,
  },
  /// Show corpus counts
  Stats {
    #[arg(long)]
    json: bool,
  },
}

fn init_logging(verbose: bool) {
  let default = if verbose { "scout=debug,info" } else { "scout=info,warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Commands::Normalize { identifiers } = &cli.command {
    return commands::normalize(identifiers);
  }

  let config = ScoutConfig::load(cli.config.as_deref())?;
  let services = Services::open(config)?;

  match cli.command {
    Commands::Normalize { .. } => {}
    Commands::Acquire { targets, budget, rate, no_embed, json } => {
      commands::acquire(&services, &targets, budget, rate, !no_embed, json).await?;
    }
    Commands::Runs { last, json } => {
      commands::runs(&services, last, json)?;
    }
    Commands::Search { retrieval, json, terms } => {
      commands::search(&services, &terms, retrieval.top_k, retrieval.fanout, !retrieval.no_rerank, json).await?;
    }
    Commands::Backfill { limit } => {
      commands::backfill(&services, limit).await?;
    }
    Commands::Eval { cases, retrieval, report_json } => {
      commands::eval(
        &services,
        &cases,
        retrieval.top_k,
        retrieval.fanout,
        !retrieval.no_rerank,
        report_json.as_deref(),
      )
      .await?;
    }
    Commands::Stats { json } => {
      commands::stats(&services, json).await?;
    }
  }

  Ok(())
}
