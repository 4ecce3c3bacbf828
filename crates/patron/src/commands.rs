use anyhow::{Context, Result};
use colored::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::config::Settings;
use crate::display::{self, Section};
use crate::donor::{load_donors, Donor};
use crate::embedding_model::{load_model, EmbeddingModel};
use crate::encoder::TextEncoder;
use crate::error::PatronError;
use crate::event::{load_events, Event};
use crate::index::DonorIndex;
use crate::matcher::match_event;
use crate::ranker::{rank_events, Aggregation, RankOptions};

/// Reject a zero `top_k` before doing any work
pub fn require_top_k(top_k: usize) -> Result<usize> {
  if top_k == 0 {
    return Err(PatronError::InvalidArgument("--top-k must be at least 1".to_string()).into());
  }
  Ok(top_k)
}

/// Embed every donor in `donor_csv` and persist the index under `out_dir`
pub async fn build_index(donor_csv: &Path, out_dir: &Path, model_id: &str, settings: &Settings) -> Result<()> {
  tracing::info!("loading donors from {}", donor_csv.display());
  let donors = load_donors(donor_csv).with_context(|| format!("Failed to read donors from {}", donor_csv.display()))?;

  let model = load_model(model_id).await.context("Failed to load embedding model")?;
  let mut encoder = TextEncoder::new(model, settings.batch_size.donors);
  let index = build_and_save(&donors, &mut encoder, out_dir)?;

  println!(
    "{} Indexed {} donors ({} dims) into {}",
    "✓".green(),
    index.len().to_string().cyan(),
    index.dim(),
    out_dir.display().to_string().yellow()
  );
  Ok(())
}

/// Build an index with an already-loaded model and write it to `out_dir`
pub fn build_and_save<M: EmbeddingModel>(
  donors: &[Donor],
  encoder: &mut TextEncoder<M>,
  out_dir: &Path,
) -> Result<DonorIndex> {
  let index = DonorIndex::build(donors, encoder).context("Failed to embed donors")?;
  index.save(out_dir).with_context(|| format!("Failed to write index to {}", out_dir.display()))?;
  Ok(index)
}

/// Rank events by similarity to the indexed donor base
pub async fn rank(
  events_path: &Path,
  index_dir: &Path,
  top_k: usize,
  aggregation: Aggregation,
  configured_model: &str,
  settings: &Settings,
) -> Result<()> {
  let top_k = require_top_k(top_k)?;
  let index = open_index(index_dir)?;
  let events =
    load_events(events_path).with_context(|| format!("Failed to read events from {}", events_path.display()))?;

  let model = load_model(indexed_model(&index, configured_model)).await.context("Failed to load embedding model")?;
  let mut encoder = TextEncoder::new(model, settings.batch_size.events);

  let options = RankOptions { top_k, aggregation, count_threshold: settings.count_threshold };
  rank_with(&index, &mut encoder, &events, &options)?.print();
  Ok(())
}

/// Rank `events` with an already-loaded model and format the result
pub fn rank_with<M: EmbeddingModel>(
  index: &DonorIndex,
  encoder: &mut TextEncoder<M>,
  events: &[Event],
  options: &RankOptions,
) -> Result<Section> {
  let ranked = rank_events(index, encoder, events, options).context("Failed to rank events")?;

  Ok(Section {
    header: display::rank_header(options.top_k, options.aggregation),
    lines: ranked.iter().map(|r| display::ranked_event_line(r, options.aggregation)).collect(),
  })
}

/// Find the donors nearest to a free-text query
pub async fn search(
  query: &str,
  index_dir: &Path,
  donor_csv: Option<&Path>,
  top_k: usize,
  configured_model: &str,
) -> Result<()> {
  let top_k = require_top_k(top_k)?;
  let index = open_index(index_dir)?;
  let donors = match donor_csv {
    Some(path) => load_donors(path).with_context(|| format!("Failed to read donors from {}", path.display()))?,
    None => Vec::new(),
  };

  let model = load_model(indexed_model(&index, configured_model)).await.context("Failed to load embedding model")?;
  let mut encoder = TextEncoder::new(model, 1);
  search_with(&index, &mut encoder, query, &donors, top_k)?.print();
  Ok(())
}

/// Search the index for `query` with an already-loaded model. Hits are
/// described from `donors` when the table has a row for them.
pub fn search_with<M: EmbeddingModel>(
  index: &DonorIndex,
  encoder: &mut TextEncoder<M>,
  query: &str,
  donors: &[Donor],
  top_k: usize,
) -> Result<Section> {
  let query_vector = encoder.encode_one(query).context("Failed to embed query")?;
  let hits = index.search(&query_vector, top_k).context("Failed to search donor index")?;

  Ok(Section {
    header: display::search_header(top_k, query),
    lines: hits.iter().map(|hit| display::search_hit_line(hit, donors.get(hit.donor_id as usize))).collect(),
  })
}

/// Pick donors for one event by cause tag, topping up at random
pub fn match_donors(events_path: &Path, event_id: &str, donor_csv: &Path, top_k: usize, seed: Option<u64>) -> Result<()> {
  let top_k = require_top_k(top_k)?;
  let events =
    load_events(events_path).with_context(|| format!("Failed to read events from {}", events_path.display()))?;
  let donors = load_donors(donor_csv).with_context(|| format!("Failed to read donors from {}", donor_csv.display()))?;

  let mut rng = match seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_os_rng(),
  };

  let (event, picked) = match_event(&events, event_id, &donors, top_k, &mut rng)?;

  Section {
    header: display::match_header(top_k, event),
    lines: picked.iter().map(|d| display::matched_donor_line(d)).collect(),
  }
  .print();
  Ok(())
}

fn open_index(index_dir: &Path) -> Result<DonorIndex> {
  DonorIndex::load(index_dir).with_context(|| {
    format!("Failed to load donor index from {} (run `patron index` first)", index_dir.display())
  })
}

/// Queries must be embedded with the model that built the index
fn indexed_model<'a>(index: &'a DonorIndex, configured_model: &str) -> &'a str {
  if index.model_id() != configured_model {
    tracing::warn!(
      "index was built with `{}`, ignoring configured model `{}`",
      index.model_id(),
      configured_model
    );
  }
  index.model_id()
}
