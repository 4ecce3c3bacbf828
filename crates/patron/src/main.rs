use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use patron::commands;
use patron::config::Settings;
use patron::ranker::Aggregation;

#[derive(Parser)]
#[command(name = "patron")]
#[command(about = "Patron - donor and event affinity matching\nRank fundraising events against your donor base")]
#[command(version)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Embed every donor and persist the vector index
  Index {
    /// Donor table (CSV)
    #[arg(long, env = "PATRON_DONOR_CSV")]
    donor_csv: PathBuf,
    /// Directory to write the index into
    #[arg(long, env = "PATRON_INDEX_DIR")]
    out_dir: Option<PathBuf>,
    /// Embedding model repository id
    #[arg(long, env = "PATRON_MODEL")]
    model: Option<String>,
  },
  /// Rank events by similarity to the donor base
  Rank {
    /// Events as a JSON array or CSV file
    #[arg(long, env = "PATRON_EVENTS")]
    events: PathBuf,
    /// Directory holding the donor index
    #[arg(long, env = "PATRON_INDEX_DIR")]
    index_dir: Option<PathBuf>,
    /// Number of events to print
    #[arg(long)]
    top_k: Option<usize>,
    /// How per-donor similarities become one score
    #[arg(long, value_enum, default_value_t = Aggregation::Mean)]
    metric: Aggregation,
    /// Expected embedding model (the index's own model is always used)
    #[arg(long, env = "PATRON_MODEL")]
    model: Option<String>,
  },
  /// Pick donors for one event by matching cause tags
  Match {
    /// Events as a JSON array or CSV file
    #[arg(long, env = "PATRON_EVENTS")]
    events: PathBuf,
    /// Identifier of the event to match
    #[arg(long)]
    event_id: String,
    /// Donor table (CSV)
    #[arg(long, env = "PATRON_DONOR_CSV")]
    donor_csv: PathBuf,
    /// Number of donors to print
    #[arg(long)]
    top_k: Option<usize>,
    /// Seed for the random top-up, for reproducible output
    #[arg(long)]
    seed: Option<u64>,
  },
  /// Find the donors closest to a free-text query
  Search {
    /// Query text
    #[arg(long)]
    query: String,
    /// Directory holding the donor index
    #[arg(long, env = "PATRON_INDEX_DIR")]
    index_dir: Option<PathBuf>,
    /// Donor table used to describe hits; identifiers are printed without it
    #[arg(long, env = "PATRON_DONOR_CSV")]
    donor_csv: Option<PathBuf>,
    /// Number of donors to print
    #[arg(long)]
    top_k: Option<usize>,
    /// Expected embedding model (the index's own model is always used)
    #[arg(long, env = "PATRON_MODEL")]
    model: Option<String>,
  },
}

async fn handle(command: Command, settings: Settings) -> Result<()> {
  match command {
    Command::Index { donor_csv, out_dir, model } => {
      let out_dir = out_dir.unwrap_or_else(|| settings.index_dir.clone());
      let model = model.unwrap_or_else(|| settings.model.clone());
      commands::build_index(&donor_csv, &out_dir, &model, &settings).await
    }
    Command::Rank { events, index_dir, top_k, metric, model } => {
      let index_dir = index_dir.unwrap_or_else(|| settings.index_dir.clone());
      let model = model.unwrap_or_else(|| settings.model.clone());
      let top_k = top_k.unwrap_or(settings.top_k);
      commands::rank(&events, &index_dir, top_k, metric, &model, &settings).await
    }
    Command::Match { events, event_id, donor_csv, top_k, seed } => {
      commands::match_donors(&events, &event_id, &donor_csv, top_k.unwrap_or(settings.top_k), seed)
    }
    Command::Search { query, index_dir, donor_csv, top_k, model } => {
      let index_dir = index_dir.unwrap_or_else(|| settings.index_dir.clone());
      let model = model.unwrap_or_else(|| settings.model.clone());
      let top_k = top_k.unwrap_or(settings.top_k);
      commands::search(&query, &index_dir, donor_csv.as_deref(), top_k, &model).await
    }
  }
}

fn init_logging(verbose: bool) {
  // RUST_LOG takes precedence over --verbose
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if verbose { "patron=debug" } else { "patron=warn" }));

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let settings = Settings::load()?;
  handle(cli.command, settings).await
}
