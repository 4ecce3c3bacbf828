//! Exact inner-product index over donor vectors.
//!
//! Vectors are stored row-major in one flat buffer. `ids[i]` names the donor
//! whose vector occupies row `i`; the two are only ever written together.
//!
//! On disk an index is a directory holding two files:
//!
//! - `donor_vectors.bin`: magic + version, dimension, row count, model id, then
//!   the rows as little-endian `f32`.
//! - `donor_ids.json`: the identifier array, in row order.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::donor::Donor;
use crate::embedding_model::EmbeddingModel;
use crate::encoder::TextEncoder;
use crate::error::{PatronError, Result};
use crate::similarity;

pub const VECTORS_FILE: &str = "donor_vectors.bin";
pub const IDS_FILE: &str = "donor_ids.json";

const MAGIC: &[u8; 8] = b"PTRNVEC1";

/// One search result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
  /// Row in the index
  pub position: usize,
  /// Donor identifier stored for that row
  pub donor_id: u64,
  /// Cosine similarity to the query
  pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonorIndex {
  model_id: String,
  dim: usize,
  ids: Vec<u64>,
  vectors: Vec<f32>,
}

impl DonorIndex {
  pub fn new(model_id: impl Into<String>, dim: usize) -> Self {
    Self { model_id: model_id.into(), dim, ids: Vec::new(), vectors: Vec::new() }
  }

  /// Embed every donor in table order and index the results
  pub fn build<M: EmbeddingModel>(donors: &[Donor], encoder: &mut TextEncoder<M>) -> Result<Self> {
    tracing::info!("converting {} donors to text", donors.len());
    let texts: Vec<String> = donors.iter().map(Donor::embedding_text).collect();

    tracing::info!("encoding with model `{}`", encoder.model_id());
    let vectors = encoder.encode(&texts)?;

    let dim = vectors.first().map_or(0, Vec::len);
    let mut index = Self::new(encoder.model_id(), dim);
    for (donor, vector) in donors.iter().zip(vectors.iter()) {
      index.add(donor.id, vector)?;
    }

    Ok(index)
  }

  fn add(&mut self, id: u64, vector: &[f32]) -> Result<()> {
    if vector.len() != self.dim {
      return Err(PatronError::DimensionMismatch { expected: self.dim, actual: vector.len() });
    }
    self.ids.push(id);
    self.vectors.extend_from_slice(vector);
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn dim(&self) -> usize {
    self.dim
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn ids(&self) -> &[u64] {
    &self.ids
  }

  /// Number of rows in the vector store, independent of the identifier array
  pub fn vector_count(&self) -> usize {
    self.vectors.len().checked_div(self.dim).unwrap_or(0)
  }

  pub fn vector(&self, position: usize) -> Option<&[f32]> {
    if position >= self.len() {
      return None;
    }
    let start = position * self.dim;
    Some(&self.vectors[start..start + self.dim])
  }

  /// Return the `k` most similar rows, best first. Equal scores keep row order.
  pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
    if self.is_empty() || k == 0 {
      return Ok(Vec::new());
    }
    if query.len() != self.dim {
      return Err(PatronError::DimensionMismatch { expected: self.dim, actual: query.len() });
    }

    let mut hits: Vec<Hit> = self
      .vectors
      .chunks_exact(self.dim)
      .zip(self.ids.iter())
      .enumerate()
      .map(|(position, (row, &donor_id))| Hit { position, donor_id, score: similarity::dot(query, row) })
      .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    Ok(hits)
  }

  /// Persist both files under `dir`, creating it if needed
  pub fn save(&self, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    let vectors_path = dir.join(VECTORS_FILE);
    atomic_write(&vectors_path, |w| {
      w.write_all(MAGIC)?;
      w.write_all(&(self.dim as u32).to_le_bytes())?;
      w.write_all(&(self.len() as u64).to_le_bytes())?;
      w.write_all(&(self.model_id.len() as u32).to_le_bytes())?;
      w.write_all(self.model_id.as_bytes())?;
      for value in &self.vectors {
        w.write_all(&value.to_le_bytes())?;
      }
      Ok(())
    })?;

    let ids_path = dir.join(IDS_FILE);
    atomic_write(&ids_path, |w| {
      serde_json::to_writer(&mut *w, &self.ids).map_err(std::io::Error::from)?;
      Ok(())
    })?;

    tracing::info!("saved index -> {}", vectors_path.display());
    tracing::info!("saved id map -> {}", ids_path.display());
    Ok(())
  }

  /// Load an index previously written by [`DonorIndex::save`]
  pub fn load(dir: &Path) -> Result<Self> {
    let vectors_path = dir.join(VECTORS_FILE);
    let bytes = fs::read(&vectors_path)?;
    let (model_id, dim, rows, vectors) = decode_vectors(&bytes, &vectors_path)?;

    let ids_path = dir.join(IDS_FILE);
    let ids: Vec<u64> = serde_json::from_slice(&fs::read(&ids_path)?)?;

    if ids.len() != rows {
      return Err(PatronError::IndexMismatch { ids: ids.len(), vectors: rows });
    }

    tracing::debug!("loaded index of {} donors ({} dims, model `{}`)", rows, dim, model_id);
    Ok(Self { model_id, dim, ids, vectors })
  }
}

fn atomic_write<F>(path: &Path, write: F) -> Result<()>
where
  F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
  let tmp: PathBuf = path.with_extension("tmp");
  {
    let mut writer = BufWriter::new(File::create(&tmp)?);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
  }
  fs::rename(tmp, path)?;
  Ok(())
}

struct Cursor<'a> {
  bytes: &'a [u8],
  offset: usize,
  path: &'a Path,
}

impl<'a> Cursor<'a> {
  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    let end = self.offset.checked_add(n).filter(|&end| end <= self.bytes.len());
    let end = end.ok_or_else(|| PatronError::corrupt_index(self.path, "unexpected end of file"))?;
    let slice = &self.bytes[self.offset..end];
    self.offset = end;
    Ok(slice)
  }

  fn u32(&mut self) -> Result<u32> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(self.take(4)?);
    Ok(u32::from_le_bytes(buf))
  }

  fn u64(&mut self) -> Result<u64> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(self.take(8)?);
    Ok(u64::from_le_bytes(buf))
  }
}

fn decode_vectors(bytes: &[u8], path: &Path) -> Result<(String, usize, usize, Vec<f32>)> {
  let mut cursor = Cursor { bytes, offset: 0, path };

  if cursor.take(MAGIC.len())? != MAGIC {
    return Err(PatronError::corrupt_index(path, "not a donor vector file"));
  }
  let dim = cursor.u32()? as usize;
  let count = cursor.u64()? as usize;
  if dim == 0 && count > 0 {
    return Err(PatronError::corrupt_index(path, "zero-dimensional rows"));
  }
  let model_len = cursor.u32()? as usize;
  let model_id = String::from_utf8(cursor.take(model_len)?.to_vec())
    .map_err(|_| PatronError::corrupt_index(path, "model id is not UTF-8"))?;

  let expected = count
    .checked_mul(dim)
    .and_then(|n| n.checked_mul(4))
    .ok_or_else(|| PatronError::corrupt_index(path, "row count overflows"))?;
  let body = cursor.take(expected)?;
  if cursor.offset != bytes.len() {
    return Err(PatronError::corrupt_index(path, "trailing bytes after vector data"));
  }

  let vectors = body
    .chunks_exact(4)
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect();

  Ok((model_id, dim, count, vectors))
}
