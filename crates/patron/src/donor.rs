use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{PatronError, Result};

/// A donor loaded from the source table.
///
/// `id` is the 0-based position of the row in the table. It is assigned while
/// reading and never changes afterwards, so the index can refer to donors
/// positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
  pub id: u64,
  pub name: String,
  pub age: u32,
  pub state: String,
  pub religion: String,
  pub primary_cause: String,
  pub channel: String,
  pub lifetime_donation_usd: f64,
  pub avg_gift_usd: f64,
  pub major_gift_score: f64,
}

/// One CSV row as it appears on disk. Both column spellings used by the donor
/// generators are accepted and resolved in [`Donor::from_row`].
#[derive(Debug, Deserialize)]
struct DonorRow {
  full_name: Option<String>,
  name: Option<String>,
  age: Option<u32>,
  #[serde(default)]
  state: String,
  #[serde(default)]
  religion: String,
  primary_cause: Option<String>,
  communication_pref: Option<String>,
  preferred_channel: Option<String>,
  lifetime_donation_usd: Option<f64>,
  average_gift_usd: Option<f64>,
  avg_gift_usd: Option<f64>,
  major_gift_score: Option<f64>,
}

impl Donor {
  fn from_row(id: u64, row: DonorRow, source_name: &str) -> Result<Self> {
    let line = id as usize + 1;
    let name = row
      .full_name
      .or(row.name)
      .filter(|n| !n.trim().is_empty())
      .ok_or_else(|| PatronError::malformed(source_name, line, "missing donor name"))?;
    let age =
      row.age.ok_or_else(|| PatronError::malformed(source_name, line, "missing donor age"))?;
    let primary_cause = row
      .primary_cause
      .ok_or_else(|| PatronError::malformed(source_name, line, "missing primary_cause"))?;

    Ok(Self {
      id,
      name,
      age,
      state: row.state,
      religion: row.religion,
      primary_cause,
      channel: row.communication_pref.or(row.preferred_channel).unwrap_or_default(),
      lifetime_donation_usd: row.lifetime_donation_usd.unwrap_or(0.0),
      avg_gift_usd: row.average_gift_usd.or(row.avg_gift_usd).unwrap_or(0.0),
      major_gift_score: row.major_gift_score.unwrap_or(0.0),
    })
  }

  /// Get the text that should be embedded for this donor
  pub fn embedding_text(&self) -> String {
    format!(
      "{}, age {}, {} donor from {}. Primary cause: {}. Lifetime donated ${} with average gift ${}. Major gift score {}/100.",
      self.name,
      self.age,
      self.religion,
      self.state,
      self.primary_cause,
      self.lifetime_donation_usd,
      self.avg_gift_usd,
      self.major_gift_score
    )
  }

  /// One-line summary used when printing search hits
  pub fn summary(&self) -> String {
    format!(
      "{} (age {}, {}) | Cause: {} | Lifetime: ${} | Channel: {}",
      self.name, self.age, self.state, self.primary_cause, self.lifetime_donation_usd, self.channel
    )
  }
}

/// Load donors from a CSV file, assigning identifiers in row order
pub fn load_donors(path: &Path) -> Result<Vec<Donor>> {
  let file = File::open(path)?;
  read_donors(file, &path.display().to_string())
}

/// Read donors from any CSV source. `source_name` only appears in error messages.
pub fn read_donors<R: Read>(reader: R, source_name: &str) -> Result<Vec<Donor>> {
  let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

  let mut donors = Vec::new();
  for (idx, result) in rdr.deserialize::<DonorRow>().enumerate() {
    let row = result.map_err(|e| PatronError::malformed(source_name, idx + 1, e.to_string()))?;
    donors.push(Donor::from_row(idx as u64, row, source_name)?);
  }

  tracing::debug!("loaded {} donors from {}", donors.len(), source_name);
  Ok(donors)
}
