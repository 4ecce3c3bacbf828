use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::error::PatronError;

#[cfg(feature = "neural")]
use ndarray::{Array2, ArrayView3, Axis};
#[cfg(feature = "neural")]
use ort::{
  session::{builder::GraphOptimizationLevel, Session},
  value::Value,
};

pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[cfg(feature = "neural")]
const TOKENIZER_FILE: &str = "tokenizer.json";
#[cfg(feature = "neural")]
const MODEL_FILE: &str = "onnx/model.onnx";
const MAX_TEXT_CHARS: usize = 8192;

/// Anything that can turn a batch of texts into one vector per text, in order
pub trait EmbeddingModel {
  /// Identifier recorded alongside vectors produced by this model
  fn model_id(&self) -> &str;

  fn compute_embeddings(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Box<M> {
  fn model_id(&self) -> &str {
    (**self).model_id()
  }

  fn compute_embeddings(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    (**self).compute_embeddings(texts)
  }
}

/// Load the embedding model named by `model_id` (a Hugging Face repository id)
pub async fn load_model(model_id: &str) -> crate::error::Result<Box<dyn EmbeddingModel>> {
  #[cfg(feature = "neural")]
  {
    let model = OnnxEmbeddingModel::load(model_id).await.map_err(PatronError::model_unavailable)?;
    Ok(Box::new(model))
  }

  #[cfg(not(feature = "neural"))]
  {
    Err(PatronError::model_unavailable(format!(
      "cannot load `{model_id}`: neural features not enabled"
    )))
  }
}

/// Deterministic offline model. Each word is hashed into one of `dimensions`
/// buckets, so texts sharing vocabulary end up close together.
pub struct StubEmbeddingModel {
  pub dimensions: usize,
  pub fail_on_texts: Vec<String>,
  pub fixed_responses: HashMap<String, Vec<f32>>,
  pub calls: usize,
}

impl StubEmbeddingModel {
  pub fn new(dimensions: usize) -> Self {
    Self { dimensions, fail_on_texts: vec![], fixed_responses: HashMap::new(), calls: 0 }
  }

  /// Return `vector` whenever `text` is embedded
  pub fn with_response(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
    self.fixed_responses.insert(text.into(), vector);
    self
  }

  fn bag_of_words(&self, text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; self.dimensions];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
      let bucket = fnv1a(&word.to_lowercase()) as usize % self.dimensions;
      vector[bucket] += 1.0;
    }
    vector
  }
}

impl Default for StubEmbeddingModel {
  fn default() -> Self {
    Self::new(16)
  }
}

impl EmbeddingModel for StubEmbeddingModel {
  fn model_id(&self) -> &str {
    "stub/bag-of-words"
  }

  fn compute_embeddings(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    self.calls += 1;
    validate_inputs(texts)?;

    for text in texts {
      if self.fail_on_texts.contains(text) {
        return Err(anyhow!("Stub failure for text: {}", text));
      }
    }

    Ok(
      texts
        .iter()
        .map(|text| self.fixed_responses.get(text).cloned().unwrap_or_else(|| self.bag_of_words(text)))
        .collect(),
    )
  }
}

fn fnv1a(word: &str) -> u64 {
  word.bytes().fold(0xcbf29ce484222325, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3))
}

fn validate_inputs(texts: &[String]) -> Result<()> {
  for text in texts {
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
      return Err(anyhow!("Text too long: {} characters (max {})", chars, MAX_TEXT_CHARS));
    }
  }

  Ok(())
}

/// Sentence-transformer exported to ONNX, fetched from the Hugging Face hub
#[cfg(feature = "neural")]
pub struct OnnxEmbeddingModel {
  model_id: String,
  session: Session,
  tokenizer: tokenizers::Tokenizer,
  wants_token_type_ids: bool,
}

#[cfg(feature = "neural")]
impl EmbeddingModel for OnnxEmbeddingModel {
  fn model_id(&self) -> &str {
    &self.model_id
  }

  fn compute_embeddings(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
      return Ok(vec![]);
    }
    validate_inputs(texts)?;

    let encodings = self.tokenize(texts)?;
    let batch = batch_tokens(&encodings);
    let inputs = self.prepare(&batch)?;

    let outputs = self.session.run(inputs)?;
    let output = outputs
      .get("last_hidden_state")
      .or_else(|| outputs.get("token_embeddings"))
      .ok_or_else(|| {
        anyhow!("No output tensor found - available outputs: {:?}", outputs.keys().collect::<Vec<_>>())
      })?;

    let (shape, data) = output.try_extract_tensor::<f32>()?;
    mean_pool(&shape[..], data, &batch.mask, batch.length)
  }
}

#[cfg(feature = "neural")]
impl OnnxEmbeddingModel {
  pub async fn load(model_id: &str) -> Result<Self> {
    tracing::info!("loading embedding model `{}`", model_id);

    let api = hf_hub::api::tokio::Api::new().map_err(|e| anyhow!("HF API initialization failed: {}", e))?;
    let repo = api.model(model_id.to_string());

    let tokenizer_file =
      repo.get(TOKENIZER_FILE).await.map_err(|e| anyhow!("Failed to download tokenizer: {}", e))?;
    let model_file =
      repo.get(MODEL_FILE).await.map_err(|e| anyhow!("Failed to download ONNX model: {}", e))?;

    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_file)
      .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level1)?
      .commit_from_file(&model_file)
      .map_err(|e| anyhow!("Failed to load ONNX model: {}", e))?;

    let wants_token_type_ids = session.inputs.iter().any(|input| input.name == "token_type_ids");
    tracing::debug!("model inputs: {:?}", session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>());

    Ok(Self { model_id: model_id.to_string(), session, tokenizer, wants_token_type_ids })
  }

  fn tokenize(&self, texts: &[String]) -> Result<Vec<tokenizers::Encoding>> {
    let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    self.tokenizer.encode_batch(text_refs, true).map_err(|e| anyhow!("Failed to encode texts: {}", e))
  }

  fn prepare(&self, batch: &TokenBatch) -> Result<HashMap<String, Value>> {
    let shape = (batch.size, batch.length);
    let mut inputs = HashMap::new();
    inputs.insert("input_ids".to_string(), to_tensor(shape, batch.ids.clone())?);
    inputs.insert("attention_mask".to_string(), to_tensor(shape, batch.mask.clone())?);
    if self.wants_token_type_ids {
      inputs.insert("token_type_ids".to_string(), to_tensor(shape, vec![0; batch.ids.len()])?);
    }
    Ok(inputs)
  }
}

#[cfg(feature = "neural")]
fn to_tensor(shape: (usize, usize), values: Vec<i64>) -> Result<Value> {
  let array: Array2<i64> = Array2::from_shape_vec(shape, values)?;
  let tensor: Value = Value::from_array(array)?.into();
  Ok(tensor)
}

/// Token ids and attention mask padded to the longest sequence in the batch
#[cfg_attr(not(feature = "neural"), allow(dead_code))]
struct TokenBatch {
  ids: Vec<i64>,
  mask: Vec<i64>,
  size: usize,
  length: usize,
}

#[cfg(feature = "neural")]
fn batch_tokens(encodings: &[tokenizers::Encoding]) -> TokenBatch {
  let sequences: Vec<(Vec<i64>, Vec<i64>)> = encodings
    .iter()
    .map(|e| {
      let ids = e.get_ids().iter().map(|&id| i64::from(id)).collect();
      let mask = e.get_attention_mask().iter().map(|&m| i64::from(m)).collect();
      (ids, mask)
    })
    .collect();
  pad_sequences(&sequences)
}

#[cfg_attr(not(feature = "neural"), allow(dead_code))]
fn pad_sequences(sequences: &[(Vec<i64>, Vec<i64>)]) -> TokenBatch {
  let size = sequences.len();
  let length = sequences.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);

  let mut ids = Vec::with_capacity(size * length);
  let mut mask = Vec::with_capacity(size * length);

  for (seq_ids, seq_mask) in sequences {
    for i in 0..length {
      // PAD token with no attention past the end of the sequence
      ids.push(seq_ids.get(i).copied().unwrap_or(0));
      mask.push(seq_mask.get(i).copied().unwrap_or(0));
    }
  }

  TokenBatch { ids, mask, size, length }
}

/// Average token embeddings over the positions the attention mask keeps
#[cfg(feature = "neural")]
fn mean_pool(shape: &[i64], data: &[f32], mask: &[i64], length: usize) -> Result<Vec<Vec<f32>>> {
  if shape.len() != 3 {
    return Err(anyhow!("Expected [batch, sequence, hidden] output, got shape {:?}", shape));
  }
  let (batch, seq_len, hidden) = (shape[0] as usize, shape[1] as usize, shape[2] as usize);
  if seq_len != length {
    return Err(anyhow!("Model returned {} positions for {} input tokens", seq_len, length));
  }

  let hidden_states = ArrayView3::from_shape((batch, seq_len, hidden), data)?;
  let mut pooled = Vec::with_capacity(batch);

  for (row, states) in hidden_states.axis_iter(Axis(0)).enumerate() {
    let row_mask = &mask[row * length..(row + 1) * length];
    let mut sum = vec![0.0f32; hidden];
    let mut kept = 0usize;

    for (token, token_state) in states.axis_iter(Axis(0)).enumerate() {
      if row_mask[token] == 0 {
        continue;
      }
      kept += 1;
      for (acc, &value) in sum.iter_mut().zip(token_state.iter()) {
        *acc += value;
      }
    }

    let denom = kept.max(1) as f32;
    pooled.push(sum.into_iter().map(|v| v / denom).collect());
  }

  Ok(pooled)
}
