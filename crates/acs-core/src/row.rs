//! Cells, merged rows and the geography-keyed row set.
//!
//! Each batch request returns a table whose first row holds field names.
//! Batches for the same year and scope describe the same geographies, so rows
//! are merged on their [`GeographyKey`] by field union rather than appended.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::geography::{GeographyKey, present_levels};

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A raw value from a data response, or a computed value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
  #[default]
  Null,
  Number(f64),
  Text(String),
}

impl CellValue {
  /// Numeric view used by the derived-column engine.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      Self::Text(s) => s.trim().parse().ok(),
      Self::Null => None,
    }
  }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

impl fmt::Display for CellValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => Ok(()),
      Self::Number(n) => write!(f, "{n}"),
      Self::Text(s) => f.write_str(s),
    }
  }
}

impl From<serde_json::Value> for CellValue {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => Self::Null,
      serde_json::Value::String(s) => Self::Text(s),
      serde_json::Value::Number(n) => {
        n.as_f64().map_or_else(|| Self::Text(n.to_string()), Self::Number)
      }
      other => Self::Text(other.to_string()),
    }
  }
}

impl From<&str> for CellValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<f64> for CellValue {
  fn from(n: f64) -> Self { Self::Number(n) }
}

// ─── Row ─────────────────────────────────────────────────────────────────────

/// One statistical unit: field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedRow {
  fields: HashMap<String, CellValue>,
}

impl MergedRow {
  pub fn get(&self, field: &str) -> Option<&CellValue> { self.fields.get(field) }

  /// Insert or overwrite a field.
  pub fn set(&mut self, field: impl Into<String>, value: CellValue) {
    self.fields.insert(field.into(), value);
  }

  pub fn len(&self) -> usize { self.fields.len() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// Text of `field`, empty when absent.
  pub fn display(&self, field: &str) -> String {
    self.get(field).map(ToString::to_string).unwrap_or_default()
  }

  fn union(&mut self, other: MergedRow) { self.fields.extend(other.fields); }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for MergedRow {
  fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
    Self { fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
  }
}

// ─── Row set ─────────────────────────────────────────────────────────────────

/// Rows for one year and scope, indexed by geography key.
///
/// Header names are kept in first-seen order; rows are kept in the order their
/// key first appeared.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
  headers: Vec<String>,
  rows:    Vec<MergedRow>,
  index:   HashMap<GeographyKey, usize>,
}

impl RowSet {
  pub fn new() -> Self { Self::default() }

  pub fn headers(&self) -> &[String] { &self.headers }

  pub fn has_header(&self, name: &str) -> bool {
    self.headers.iter().any(|h| h == name)
  }

  /// Register a header name; returns `false` if it was already present.
  pub fn register_header(&mut self, name: &str) -> bool {
    if self.has_header(name) {
      return false;
    }
    self.headers.push(name.to_owned());
    true
  }

  pub fn rows(&self) -> &[MergedRow] { &self.rows }

  pub fn rows_mut(&mut self) -> &mut [MergedRow] { &mut self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn get(&self, key: &GeographyKey) -> Option<&MergedRow> {
    self.index.get(key).map(|&i| &self.rows[i])
  }

  /// Merge one parsed response into the set.
  ///
  /// The key for each row is built from whichever geography levels appear in
  /// `headers`. A row whose key is already present is updated in place (new
  /// values win); any other row is appended. Returns the number of new rows.
  pub fn merge_response(
    &mut self,
    headers: &[String],
    rows: Vec<Vec<CellValue>>,
  ) -> usize {
    for h in headers {
      self.register_header(h);
    }

    let key_columns: Vec<usize> = present_levels(headers)
      .into_iter()
      .filter_map(|level| headers.iter().position(|h| h == level.api_name()))
      .collect();

    let mut inserted = 0;
    for cells in rows {
      let key = GeographyKey(
        key_columns
          .iter()
          .map(|&i| cells.get(i).map(ToString::to_string).unwrap_or_default())
          .collect(),
      );
      let record: MergedRow = headers.iter().cloned().zip(cells).collect();

      match self.index.get(&key) {
        Some(&i) => self.rows[i].union(record),
        None => {
          self.index.insert(key, self.rows.len());
          self.rows.push(record);
          inserted += 1;
        }
      }
    }
    inserted
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn row(cells: &[&str]) -> Vec<CellValue> {
    cells.iter().map(|&c| CellValue::from(c)).collect()
  }

  #[test]
  fn disjoint_batches_merge_into_one_row() {
    let mut set = RowSet::new();

    let first = set.merge_response(
      &headers(&["NAME", "B01001_001E", "state", "county"]),
      vec![row(&["Chatham County, Georgia", "295291", "13", "051"])],
    );
    let second = set.merge_response(
      &headers(&["NAME", "B19013_001E", "state", "county"]),
      vec![row(&["Chatham County, Georgia", "66039", "13", "051"])],
    );

    assert_eq!((first, second), (1, 0));
    assert_eq!(set.len(), 1);

    let key = GeographyKey(vec!["13".into(), "051".into()]);
    let merged = set.get(&key).unwrap();
    assert_eq!(merged.display("B01001_001E"), "295291");
    assert_eq!(merged.display("B19013_001E"), "66039");
    assert_eq!(merged.len(), 5);
    assert_eq!(
      set.headers(),
      ["NAME", "B01001_001E", "state", "county", "B19013_001E"]
    );
  }

  #[test]
  fn distinct_keys_stay_distinct() {
    let mut set = RowSet::new();
    let hs = headers(&["NAME", "B01001_001E", "state", "county", "tract"]);
    set.merge_response(
      &hs,
      vec![
        row(&["Tract 1", "10", "13", "051", "000100"]),
        row(&["Tract 2", "20", "13", "051", "000200"]),
      ],
    );
    set.merge_response(
      &headers(&["NAME", "B01001_002E", "state", "county", "tract"]),
      vec![
        row(&["Tract 2", "7", "13", "051", "000200"]),
        row(&["Tract 1", "4", "13", "051", "000100"]),
      ],
    );

    assert_eq!(set.len(), 2);
    assert_eq!(set.rows()[0].display("B01001_002E"), "4");
    assert_eq!(set.rows()[1].display("B01001_002E"), "7");
  }

  #[test]
  fn later_batch_wins_on_conflict() {
    let mut set = RowSet::new();
    let hs = headers(&["NAME", "state", "county"]);
    set.merge_response(&hs, vec![row(&["Old", "13", "051"])]);
    set.merge_response(&hs, vec![row(&["New", "13", "051"])]);
    assert_eq!(set.len(), 1);
    assert_eq!(set.rows()[0].display("NAME"), "New");
  }

  #[test]
  fn json_cells_convert() {
    assert_eq!(CellValue::from(serde_json::json!(null)), CellValue::Null);
    assert_eq!(CellValue::from(serde_json::json!("12")).as_f64(), Some(12.0));
    assert_eq!(CellValue::from(serde_json::json!(3.5)), CellValue::Number(3.5));
    assert_eq!(CellValue::Number(3.0).to_string(), "3");
    assert_eq!(CellValue::Text("n/a".into()).as_f64(), None);
  }
}
