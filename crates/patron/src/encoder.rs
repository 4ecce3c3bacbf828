use crate::embedding_model::EmbeddingModel;
use crate::error::{PatronError, Result};
use crate::similarity;

/// Turns texts into unit-length vectors, batching calls to the model
pub struct TextEncoder<M: EmbeddingModel> {
  model: M,
  batch_size: usize,
}

impl<M: EmbeddingModel> TextEncoder<M> {
  pub fn new(model: M, batch_size: usize) -> Self {
    Self { model, batch_size: batch_size.max(1) }
  }

  pub fn model_id(&self) -> &str {
    self.model.model_id()
  }

  pub fn into_model(self) -> M {
    self.model
  }

  /// Embed `texts` in input order. Every returned vector is L2-normalized and
  /// all of them share one dimension.
  pub fn encode(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    let batches = texts.len().div_ceil(self.batch_size);

    for (n, chunk) in texts.chunks(self.batch_size).enumerate() {
      tracing::debug!("embedding batch {}/{} ({} texts)", n + 1, batches, chunk.len());

      let batch = self.model.compute_embeddings(chunk).map_err(PatronError::model_unavailable)?;
      if batch.len() != chunk.len() {
        return Err(PatronError::model_unavailable(format!(
          "model returned {} vectors for {} texts",
          batch.len(),
          chunk.len()
        )));
      }

      for mut vector in batch {
        if let Some(first) = vectors.first() {
          if first.len() != vector.len() {
            return Err(PatronError::DimensionMismatch { expected: first.len(), actual: vector.len() });
          }
        } else if vector.is_empty() {
          return Err(PatronError::model_unavailable("model returned an empty vector"));
        }
        if vector.iter().any(|v| !v.is_finite()) {
          return Err(PatronError::model_unavailable("model returned a non-finite embedding value"));
        }
        similarity::normalize_l2(&mut vector);
        vectors.push(vector);
      }
    }

    Ok(vectors)
  }

  /// Embed a single text
  pub fn encode_one(&mut self, text: &str) -> Result<Vec<f32>> {
    let mut vectors = self.encode(&[text.to_string()])?;
    vectors.pop().ok_or_else(|| PatronError::model_unavailable("model returned no vector"))
  }
}
