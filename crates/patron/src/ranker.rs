//! Rank events by how strongly the donor base resembles them.
//!
//! Every event is embedded and searched against the entire donor index. The
//! resulting per-donor similarities are reduced to one score by an
//! [`Aggregation`] policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::embedding_model::EmbeddingModel;
use crate::encoder::TextEncoder;
use crate::error::Result;
use crate::event::Event;
use crate::index::DonorIndex;

pub const DEFAULT_COUNT_THRESHOLD: f32 = 0.5;

/// How the similarities between one event and all donors become a single score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
  /// Arithmetic mean of every donor's similarity
  #[default]
  Mean,
  /// Sum of every donor's similarity. Grows with the size of the donor base.
  Sum,
  /// Number of donors whose similarity is strictly above the threshold
  Count,
}

impl Aggregation {
  /// Reduce `scores` to one value. An empty slice yields `0.0` for every mode.
  pub fn aggregate(self, scores: &[f32], threshold: f32) -> f64 {
    match self {
      Aggregation::Mean if scores.is_empty() => 0.0,
      Aggregation::Mean => sum(scores) / scores.len() as f64,
      Aggregation::Sum => sum(scores),
      Aggregation::Count => scores.iter().filter(|&&s| s > threshold).count() as f64,
    }
  }
}

impl fmt::Display for Aggregation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Aggregation::Mean => "mean",
      Aggregation::Sum => "sum",
      Aggregation::Count => "count",
    };
    f.write_str(name)
  }
}

fn sum(scores: &[f32]) -> f64 {
  scores.iter().map(|&s| f64::from(s)).sum()
}

/// An event with its aggregated donor-similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEvent {
  pub event: Event,
  pub score: f64,
}

/// Ranking parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
  pub top_k: usize,
  pub aggregation: Aggregation,
  pub count_threshold: f32,
}

impl Default for RankOptions {
  fn default() -> Self {
    Self { top_k: 5, aggregation: Aggregation::Mean, count_threshold: DEFAULT_COUNT_THRESHOLD }
  }
}

/// Score every event against the whole index and return the best `top_k`.
///
/// Scores are sorted descending; events with equal scores keep their input
/// order. Asking for more events than exist returns all of them.
pub fn rank_events<M: EmbeddingModel>(
  index: &DonorIndex,
  encoder: &mut TextEncoder<M>,
  events: &[Event],
  options: &RankOptions,
) -> Result<Vec<RankedEvent>> {
  if events.is_empty() || options.top_k == 0 {
    return Ok(Vec::new());
  }

  let texts: Vec<String> = events.iter().map(Event::embedding_text).collect();
  let queries = encoder.encode(&texts)?;

  let mut ranked = Vec::with_capacity(events.len());
  for (event, query) in events.iter().zip(queries.iter()) {
    let hits = index.search(query, index.len())?;
    let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
    let score = options.aggregation.aggregate(&scores, options.count_threshold);

    tracing::debug!("event `{}` scored {:.4} ({})", event.title, score, options.aggregation);
    ranked.push(RankedEvent { event: event.clone(), score });
  }

  ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
  ranked.truncate(options.top_k);
  Ok(ranked)
}
