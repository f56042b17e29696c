//! Several years in one table with a leading year column.
//!
//! Years need not share columns: the header is the union of every year's
//! fields in the usual column order, and each year's rows are re-projected
//! onto it with empty cells where a year lacks a field.

use std::collections::HashMap;

use crate::{Result, label::order_columns, render::RenderedTable, render::write_csv};

pub const YEAR_COLUMN: &str = "year";

/// Union header and re-projected rows, `year` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedTable {
  pub header: Vec<String>,
  pub rows:   Vec<Vec<String>>,
}

impl CombinedTable {
  /// Combine `tables` in the order given.
  pub fn new(tables: &[RenderedTable]) -> Self {
    let all_fields: Vec<&str> =
      tables.iter().flat_map(|t| t.fields().iter().map(String::as_str)).collect();
    let fields = order_columns(&all_fields);

    // Label each field from the latest year that has it.
    let mut labels: HashMap<&str, &str> = HashMap::new();
    for table in tables.iter().rev() {
      for (field, label) in table.fields().iter().zip(table.labels()) {
        labels.entry(field.as_str()).or_insert(label.as_str());
      }
    }

    let header = std::iter::once(YEAR_COLUMN.to_owned())
      .chain(fields.iter().map(|f| {
        labels.get(f.as_str()).copied().unwrap_or(f.as_str()).to_owned()
      }))
      .collect();

    let mut rows = Vec::new();
    for table in tables {
      let position: HashMap<&str, usize> = table
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();
      for row in table.rows() {
        let mut out = Vec::with_capacity(fields.len() + 1);
        out.push(table.year().to_string());
        out.extend(fields.iter().map(|f| {
          position
            .get(f.as_str())
            .and_then(|&i| row.get(i))
            .cloned()
            .unwrap_or_default()
        }));
        rows.push(out);
      }
    }

    Self { header, rows }
  }

  pub fn to_csv(&self) -> Result<Vec<u8>> { write_csv(&self.header, &self.rows) }
}

#[cfg(test)]
mod tests {
  use acs_core::{
    row::{CellValue, RowSet},
    variable::VariableCatalog,
  };

  use super::*;

  fn table(year: u16, fields: &[&str], values: &[&[&str]]) -> RenderedTable {
    let headers: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
    let mut set = RowSet::new();
    set.merge_response(
      &headers,
      values
        .iter()
        .map(|row| row.iter().map(|&v| CellValue::from(v)).collect())
        .collect(),
    );
    RenderedTable::from_rows(year, &set, &VariableCatalog::new(year))
  }

  #[test]
  fn union_header_fills_missing_cells() {
    let t2022 = table(
      2022,
      &["NAME", "B01001_001E", "state", "county"],
      &[&["Chatham", "290000", "13", "051"]],
    );
    let t2023 = table(
      2023,
      &["NAME", "B01001_001E", "B01001_002E", "state", "county"],
      &[&["Chatham", "295291", "143000", "13", "051"]],
    );

    let combined = CombinedTable::new(&[t2022, t2023]);
    assert_eq!(
      combined.header,
      ["year", "state", "county", "NAME", "B01001_001E", "B01001_002E"]
    );
    assert_eq!(combined.rows, [
      ["2022", "13", "051", "Chatham", "290000", ""],
      ["2023", "13", "051", "Chatham", "295291", "143000"],
    ]);
  }

  #[test]
  fn row_count_is_years_times_rows() {
    let rows: &[&[&str]] = &[&["A", "1", "13", "000100"], &["B", "2", "13", "000200"]];
    let fields = &["NAME", "X_001E", "state", "tract"];
    let combined = CombinedTable::new(&[
      table(2021, fields, rows),
      table(2022, fields, rows),
      table(2023, fields, rows),
    ]);
    assert_eq!(combined.rows.len(), 6);
    assert!(combined.rows.iter().all(|r| r.len() == combined.header.len()));

    let csv = String::from_utf8(combined.to_csv().unwrap()).unwrap();
    assert!(csv.starts_with("year,state,tract,NAME,X_001E\n2021,13,000100,A,1\n"));
  }
}
