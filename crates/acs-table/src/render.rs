//! One year's merged rows as a labeled table, and CSV encoding.

use acs_core::{row::RowSet, variable::VariableCatalog};

use crate::{
  Result,
  label::{column_label, order_columns},
};

/// A year's rows projected onto ordered columns, every cell as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
  year:   u16,
  fields: Vec<String>,
  labels: Vec<String>,
  rows:   Vec<Vec<String>>,
}

impl RenderedTable {
  /// Order the columns of `rows` and label them from `catalog`.
  /// Absent cells render empty.
  pub fn from_rows(year: u16, rows: &RowSet, catalog: &VariableCatalog) -> Self {
    let fields = order_columns(rows.headers());
    let labels = fields.iter().map(|f| column_label(f, catalog)).collect();
    let rows = rows
      .rows()
      .iter()
      .map(|row| fields.iter().map(|f| row.display(f)).collect())
      .collect();
    Self { year, fields, labels, rows }
  }

  pub fn year(&self) -> u16 { self.year }

  /// Internal field names in column order.
  pub fn fields(&self) -> &[String] { &self.fields }

  /// Display labels, parallel to [`fields`](Self::fields).
  pub fn labels(&self) -> &[String] { &self.labels }

  pub fn rows(&self) -> &[Vec<String>] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Header of display labels, then one record per row.
  pub fn to_csv(&self) -> Result<Vec<u8>> { write_csv(&self.labels, &self.rows) }
}

/// Encode `header` and `rows` as UTF-8 CSV.
pub(crate) fn write_csv(header: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  writer.write_record(header)?;
  for row in rows {
    writer.write_record(row)?;
  }
  writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
  use acs_core::row::CellValue;

  use super::*;

  fn rows() -> RowSet {
    let headers: Vec<String> = ["NAME", "B19013_001E", "state", "county"]
      .into_iter()
      .map(String::from)
      .collect();
    let mut set = RowSet::new();
    set.merge_response(
      &headers,
      vec![vec![
        CellValue::from("Chatham County, Georgia"),
        CellValue::from("66039"),
        CellValue::from("13"),
        CellValue::from("051"),
      ]],
    );
    set.rows_mut()[0].set("share", CellValue::Number(0.5));
    set.register_header("share");
    set
  }

  #[test]
  fn renders_ordered_columns_with_quoting() {
    let table = RenderedTable::from_rows(2023, &rows(), &VariableCatalog::new(2023));
    assert_eq!(table.fields(), ["state", "county", "NAME", "B19013_001E", "share"]);

    let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
    assert_eq!(
      csv,
      "state,county,NAME,B19013_001E,share\n\
       13,051,\"Chatham County, Georgia\",66039,0.5\n"
    );
  }
}
