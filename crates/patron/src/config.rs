//! Settings file support
//!
//! Settings are read from the first of:
//!
//! 1. the file named by `PATRON_CONFIG`
//! 2. `./patron.yaml`
//! 3. `$HOME/.config/patron/config.yaml`
//!
//! Missing fields fall back to built-in defaults. Command-line flags and their
//! environment variables take precedence over anything read here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embedding_model::DEFAULT_MODEL;
use crate::error::{PatronError, Result};
use crate::ranker::DEFAULT_COUNT_THRESHOLD;

pub const CONFIG_ENV: &str = "PATRON_CONFIG";
const LOCAL_CONFIG: &str = "patron.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  /// Embedding model repository id
  #[serde(default = "default_model")]
  pub model: String,
  /// Directory holding the persisted donor index
  #[serde(default = "default_index_dir")]
  pub index_dir: PathBuf,
  #[serde(default)]
  pub batch_size: BatchSizes,
  /// Similarity a donor must exceed to be counted by the `count` metric
  #[serde(default = "default_count_threshold")]
  pub count_threshold: f32,
  /// Results printed when `--top-k` is not given
  #[serde(default = "default_top_k")]
  pub top_k: usize,
}

/// Texts sent to the embedding model per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSizes {
  #[serde(default = "default_donor_batch")]
  pub donors: usize,
  #[serde(default = "default_event_batch")]
  pub events: usize,
}

fn default_model() -> String {
  DEFAULT_MODEL.to_string()
}
fn default_index_dir() -> PathBuf {
  PathBuf::from("models")
}
fn default_count_threshold() -> f32 {
  DEFAULT_COUNT_THRESHOLD
}
fn default_top_k() -> usize {
  5
}
fn default_donor_batch() -> usize {
  64
}
fn default_event_batch() -> usize {
  32
}

impl Default for BatchSizes {
  fn default() -> Self {
    Self { donors: default_donor_batch(), events: default_event_batch() }
  }
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      model: default_model(),
      index_dir: default_index_dir(),
      batch_size: BatchSizes::default(),
      count_threshold: default_count_threshold(),
      top_k: default_top_k(),
    }
  }
}

impl Settings {
  /// Load settings from a YAML file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_yaml::from_str(&content)
      .map_err(|e| PatronError::InvalidSettings { path: path.to_path_buf(), reason: e.to_string() })?;
    settings.validate(path)?;
    Ok(settings)
  }

  /// Load settings from the usual locations, or defaults when none exist
  pub fn load() -> Result<Self> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
      tracing::debug!("loading settings from ${} = {}", CONFIG_ENV, path);
      return Self::load_from_file(path);
    }

    for path in Self::search_paths() {
      if path.is_file() {
        tracing::debug!("loading settings from {}", path.display());
        return Self::load_from_file(path);
      }
    }

    Ok(Self::default())
  }

  fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(home) = dirs::home_dir() {
      paths.push(home.join(".config").join("patron").join("config.yaml"));
    }
    paths
  }

  fn validate(&self, path: &Path) -> Result<()> {
    let invalid = |reason: &str| PatronError::InvalidSettings { path: path.to_path_buf(), reason: reason.to_string() };

    if self.top_k == 0 {
      return Err(invalid("top_k must be at least 1"));
    }
    if self.batch_size.donors == 0 || self.batch_size.events == 0 {
      return Err(invalid("batch sizes must be at least 1"));
    }
    if self.model.trim().is_empty() {
      return Err(invalid("model must not be empty"));
    }
    Ok(())
  }
}
