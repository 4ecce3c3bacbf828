//! Fundraising events and the adapter that normalizes their input schemas.
//!
//! Events arrive either from hand-authored JSON, from generator output, or from
//! spreadsheet exports. The spellings differ (`title` vs `Event_Name`, `cause` vs
//! `Cause_Focus`, ...). Everything is normalized into [`Event`] here so nothing
//! downstream needs to know which variant it was given.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{PatronError, Result};

const ID_KEYS: &[&str] = &["event_id", "Event_ID", "id"];
const TITLE_KEYS: &[&str] = &["title", "Event_Name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "Description"];
const CAUSE_KEYS: &[&str] = &["cause", "Cause_Focus"];
const GOAL_KEYS: &[&str] = &["goal_amount", "Goal_Amount"];
const DATE_KEYS: &[&str] = &["date_start", "Event_Date"];

/// Historical attendance and revenue for one past edition of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastEdition {
  pub year: i32,
  #[serde(default)]
  pub attendees: u64,
  #[serde(default)]
  pub total_raised: f64,
}

/// Canonical event record
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub id: Option<String>,
  pub title: String,
  pub description: String,
  pub cause: String,
  pub goal_amount: Option<f64>,
  pub date: String,
  pub prev_years: Vec<PastEdition>,
}

impl Event {
  /// Create an event with just the fields the matchers care about
  pub fn new(id: impl Into<String>, title: impl Into<String>, cause: impl Into<String>) -> Self {
    Self {
      id: Some(id.into()),
      title: title.into(),
      description: String::new(),
      cause: cause.into(),
      goal_amount: None,
      date: String::new(),
      prev_years: Vec::new(),
    }
  }

  /// Build a canonical event from a loosely-typed record
  pub fn from_fields(fields: &Map<String, Value>, source_name: &str, row: usize) -> Result<Self> {
    let malformed = |reason: String| PatronError::malformed(source_name, row, reason);

    let title = text_field(fields, TITLE_KEYS)
      .map_err(|key| malformed(format!("`{key}` must be a string")))?
      .filter(|t| !t.is_empty())
      .ok_or_else(|| malformed("missing event title (`title` or `Event_Name`)".to_string()))?;

    let id = text_field(fields, ID_KEYS).map_err(|key| malformed(format!("`{key}` must be a string")))?;
    let description = text_field(fields, DESCRIPTION_KEYS)
      .map_err(|key| malformed(format!("`{key}` must be a string")))?
      .unwrap_or_default();
    let cause = text_field(fields, CAUSE_KEYS)
      .map_err(|key| malformed(format!("`{key}` must be a string")))?
      .unwrap_or_default();
    let date = text_field(fields, DATE_KEYS)
      .map_err(|key| malformed(format!("`{key}` must be a string")))?
      .unwrap_or_default();
    let goal_amount = number_field(fields, GOAL_KEYS)
      .map_err(|key| malformed(format!("`{key}` must be a number")))?;

    let prev_years = match fields.get("prev_years") {
      None | Some(Value::Null) => Vec::new(),
      Some(value) => Vec::<PastEdition>::deserialize(value)
        .map_err(|e| malformed(format!("invalid `prev_years`: {e}")))?,
    };

    Ok(Self { id, title, description, cause, goal_amount, date, prev_years })
  }

  /// Get the text that should be embedded for this event
  pub fn embedding_text(&self) -> String {
    let goal = self.goal_amount.map(|g| g.to_string()).unwrap_or_else(|| "N/A".to_string());
    format!("{} | Cause: {} | Goal: HK${} | Date: {}", self.title, self.cause, goal, self.date)
  }

  /// Identifier for display, empty when the source had none
  pub fn id_or_empty(&self) -> &str {
    self.id.as_deref().unwrap_or("")
  }
}

/// First present key wins. `Err(key)` when that key holds a non-scalar value.
fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> std::result::Result<Option<String>, String> {
  for key in keys {
    match fields.get(*key) {
      None | Some(Value::Null) => continue,
      Some(Value::String(s)) => return Ok(Some(s.trim().to_string())),
      Some(Value::Number(n)) => return Ok(Some(n.to_string())),
      Some(_) => return Err((*key).to_string()),
    }
  }
  Ok(None)
}

fn number_field(fields: &Map<String, Value>, keys: &[&str]) -> std::result::Result<Option<f64>, String> {
  for key in keys {
    match fields.get(*key) {
      None | Some(Value::Null) => continue,
      Some(Value::Number(n)) => return Ok(n.as_f64()),
      Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
      Some(Value::String(s)) => {
        return s.trim().parse::<f64>().map(Some).map_err(|_| (*key).to_string());
      }
      Some(_) => return Err((*key).to_string()),
    }
  }
  Ok(None)
}

/// Load events from a `.csv` file or a JSON array, chosen by extension
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
  let source_name = path.display().to_string();
  let file = File::open(path)?;
  let is_csv = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("csv"));

  let events = if is_csv {
    read_events_csv(file, &source_name)?
  } else {
    read_events_json(BufReader::new(file), &source_name)?
  };

  tracing::debug!("loaded {} events from {}", events.len(), source_name);
  Ok(events)
}

/// Parse a JSON array of event objects
pub fn read_events_json<R: Read>(reader: R, source_name: &str) -> Result<Vec<Event>> {
  let value: Value = serde_json::from_reader(reader)?;
  let Value::Array(items) = value else {
    return Err(PatronError::malformed(source_name, 0, "expected a JSON array of events"));
  };

  items
    .iter()
    .enumerate()
    .map(|(idx, item)| match item {
      Value::Object(fields) => Event::from_fields(fields, source_name, idx + 1),
      _ => Err(PatronError::malformed(source_name, idx + 1, "event must be a JSON object")),
    })
    .collect()
}

/// Parse events from CSV. Every column is read as text and typed by the adapter.
pub fn read_events_csv<R: Read>(reader: R, source_name: &str) -> Result<Vec<Event>> {
  let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
  let headers = rdr.headers()?.clone();

  let mut events = Vec::new();
  for (idx, record) in rdr.records().enumerate() {
    let record = record.map_err(|e| PatronError::malformed(source_name, idx + 1, e.to_string()))?;
    let fields: Map<String, Value> = headers
      .iter()
      .zip(record.iter())
      .filter(|(_, v)| !v.is_empty())
      .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
      .collect();
    events.push(Event::from_fields(&fields, source_name, idx + 1)?);
  }

  Ok(events)
}

/// Find the event with the given identifier
pub fn find_event<'a>(events: &'a [Event], event_id: &str) -> Result<&'a Event> {
  events
    .iter()
    .find(|e| e.id.as_deref() == Some(event_id))
    .ok_or_else(|| PatronError::event_not_found(event_id))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn object(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      _ => panic!("expected object"),
    }
  }

  #[test]
  fn test_generator_schema() {
    let fields = object(json!({
      "event_id": "e-1",
      "title": "Harbour Charity Run",
      "description": "5k along the waterfront",
      "cause": "Healthcare",
      "goal_amount": 250000,
      "date_start": "2025-03-01T08:00:00",
      "prev_years": [{"year": 2024, "attendees": 800, "total_raised": 180000}]
    }));

    let event = Event::from_fields(&fields, "inline", 1).unwrap();
    assert_eq!(event.id.as_deref(), Some("e-1"));
    assert_eq!(event.cause, "Healthcare");
    assert_eq!(event.goal_amount, Some(250000.0));
    assert_eq!(event.prev_years.len(), 1);
    assert_eq!(event.prev_years[0].attendees, 800);
  }

  #[test]
  fn test_spreadsheet_schema_maps_to_same_fields() {
    let fields = object(json!({
      "Event_Name": "Spring Gala",
      "Cause_Focus": "Education",
      "Goal_Amount": "500000",
      "Event_Date": "2025-04-12"
    }));

    let event = Event::from_fields(&fields, "inline", 1).unwrap();
    assert_eq!(event.title, "Spring Gala");
    assert_eq!(event.cause, "Education");
    assert_eq!(event.goal_amount, Some(500000.0));
    assert_eq!(event.embedding_text(), "Spring Gala | Cause: Education | Goal: HK$500000 | Date: 2025-04-12");
  }

  #[test]
  fn test_missing_goal_renders_not_available() {
    let event = Event::new("e-2", "Book Drive", "Education");
    assert_eq!(event.embedding_text(), "Book Drive | Cause: Education | Goal: HK$N/A | Date: ");
  }

  #[test]
  fn test_missing_title_is_malformed() {
    let fields = object(json!({"cause": "Education"}));
    let err = Event::from_fields(&fields, "events.json", 4).unwrap_err();
    assert!(matches!(err, PatronError::MalformedRecord { row: 4, .. }));
  }

  #[test]
  fn test_wrong_typed_title_is_malformed() {
    let fields = object(json!({"title": ["not", "a", "string"]}));
    assert!(Event::from_fields(&fields, "events.json", 1).is_err());
  }

  #[test]
  fn test_non_numeric_goal_is_malformed() {
    let fields = object(json!({"title": "Gala", "goal_amount": "lots"}));
    assert!(Event::from_fields(&fields, "events.json", 1).is_err());
  }

  #[test]
  fn test_json_must_be_array() {
    let err = read_events_json(r#"{"title": "x"}"#.as_bytes(), "events.json").unwrap_err();
    assert!(matches!(err, PatronError::MalformedRecord { .. }));
  }

  #[test]
  fn test_csv_events() {
    let csv = "Event_Name,Cause_Focus,Goal_Amount,Event_Date\nGala,Education,1000,2025-01-01\nRun,Health,,\n";
    let events = read_events_csv(csv.as_bytes(), "events.csv").unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].goal_amount, Some(1000.0));
    assert_eq!(events[1].goal_amount, None);
    assert_eq!(events[1].cause, "Health");
  }

  #[test]
  fn test_find_event() {
    let events = vec![Event::new("a", "A", "Education"), Event::new("b", "B", "Health")];
    assert_eq!(find_event(&events, "b").unwrap().title, "B");
    assert!(matches!(find_event(&events, "zzz"), Err(PatronError::EventNotFound { .. })));
  }
}
