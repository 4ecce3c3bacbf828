use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatronError>;

#[derive(Error, Debug)]
pub enum PatronError {
  #[error("Event id {id} not found")]
  EventNotFound { id: String },

  #[error("Malformed record in {source_name} (row {row}): {reason}")]
  MalformedRecord { source_name: String, row: usize, reason: String },

  #[error("Embedding model unavailable: {0}")]
  ModelUnavailable(String),

  #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  #[error("Index is out of sync: {ids} identifiers for {vectors} vectors")]
  IndexMismatch { ids: usize, vectors: usize },

  #[error("Corrupt index at {path}: {reason}")]
  CorruptIndex { path: PathBuf, reason: String },

  #[error("Invalid settings file {path}: {reason}")]
  InvalidSettings { path: PathBuf, reason: String },

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

impl PatronError {
  pub fn event_not_found(id: impl Into<String>) -> Self {
    Self::EventNotFound { id: id.into() }
  }

  pub fn malformed(source_name: impl Into<String>, row: usize, reason: impl Into<String>) -> Self {
    Self::MalformedRecord { source_name: source_name.into(), row, reason: reason.into() }
  }

  pub fn corrupt_index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::CorruptIndex { path: path.into(), reason: reason.into() }
  }

  pub fn model_unavailable(reason: impl std::fmt::Display) -> Self {
    Self::ModelUnavailable(reason.to_string())
  }
}
