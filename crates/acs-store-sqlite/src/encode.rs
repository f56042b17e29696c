//! Encoding and decoding helpers between catalog types and SQLite rows.
//!
//! Timestamps are stored as RFC 3339 strings. The free-form `attributes` and
//! `values` payloads are stored as compact JSON.

use acs_core::{
  store::{RefreshRecord, SearchHit, VariableSummary},
  variable::{VariableDefinition, table_id},
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// `%text%` with `\`, `%` and `_` escaped; use with `ESCAPE '\'`.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

pub fn decode_count(n: i64) -> Result<usize> {
  usize::try_from(n).map_err(|_| Error::Corrupt(format!("negative count {n}")))
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `variables` row as plain column values.
pub struct RawVariable {
  pub year:            u16,
  pub id:              String,
  pub label:           String,
  pub concept:         String,
  pub group:           String,
  pub predicate_type:  String,
  pub limit:           String,
  pub attributes_json: String,
  pub values_json:     String,
}

/// Column list matching [`RawVariable::from_row`].
pub const VARIABLE_COLUMNS: &str = "year, id, label, concept, group_id, \
                                    predicate_type, limit_value, \
                                    attributes_json, values_json";

impl RawVariable {
  pub fn encode(def: VariableDefinition) -> Result<Self> {
    Ok(Self {
      attributes_json: serde_json::to_string(&def.attributes)?,
      values_json:     serde_json::to_string(&def.values)?,
      year:            def.year,
      id:              def.id,
      label:           def.label,
      concept:         def.concept,
      group:           def.group,
      predicate_type:  def.predicate_type,
      limit:           def.limit,
    })
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      year:            row.get(0)?,
      id:              row.get(1)?,
      label:           row.get(2)?,
      concept:         row.get(3)?,
      group:           row.get(4)?,
      predicate_type:  row.get(5)?,
      limit:           row.get(6)?,
      attributes_json: row.get(7)?,
      values_json:     row.get(8)?,
    })
  }

  pub fn into_definition(self) -> Result<VariableDefinition> {
    Ok(VariableDefinition {
      attributes:     serde_json::from_str(&self.attributes_json)?,
      values:         serde_json::from_str(&self.values_json)?,
      year:           self.year,
      id:             self.id,
      label:          self.label,
      concept:        self.concept,
      group:          self.group,
      predicate_type: self.predicate_type,
      limit:          self.limit,
    })
  }
}

/// The columns a search returns.
pub struct RawHit {
  pub id:      String,
  pub label:   String,
  pub concept: String,
  pub group:   String,
  pub year:    u16,
}

pub const HIT_COLUMNS: &str = "id, label, concept, group_id, year";

impl RawHit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:      row.get(0)?,
      label:   row.get(1)?,
      concept: row.get(2)?,
      group:   row.get(3)?,
      year:    row.get(4)?,
    })
  }

  pub fn into_hit(self) -> SearchHit {
    SearchHit {
      table_id: table_id(&self.id).to_owned(),
      id:       self.id,
      label:    self.label,
      concept:  self.concept,
      group:    self.group,
      year:     self.year,
    }
  }

  pub fn into_summary(self) -> VariableSummary {
    VariableSummary { id: self.id, label: self.label, concept: self.concept }
  }
}

pub struct RawRefresh {
  pub year:           u16,
  pub refreshed_at:   String,
  pub variable_count: i64,
}

impl RawRefresh {
  pub fn into_record(self) -> Result<RefreshRecord> {
    Ok(RefreshRecord {
      year:           self.year,
      refreshed_at:   decode_dt(&self.refreshed_at)?,
      variable_count: decode_count(self.variable_count)?,
    })
  }
}
