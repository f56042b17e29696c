//! Column ordering and human-readable column labels.

use acs_core::{
  geography::{GeoLevel, NAME_FIELD},
  variable::{LABEL_DELIMITER, VariableCatalog},
};

/// Replaces each run of the label hierarchy delimiter.
pub const LABEL_SEPARATOR: &str = " → ";

/// `Estimate!!Total:!!Male:` → `Estimate → Total: → Male`.
pub fn normalize_label(raw: &str) -> String {
  let joined = raw
    .split(LABEL_DELIMITER)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(LABEL_SEPARATOR);
  let trimmed = joined.trim();
  trimmed.strip_suffix(':').unwrap_or(trimmed).trim_end().to_owned()
}

/// Display label for `field`: the normalized catalog label followed by the
/// id for known variables, the field name itself otherwise.
pub fn column_label(field: &str, catalog: &VariableCatalog) -> String {
  match catalog.label(field).map(normalize_label) {
    Some(label) if !label.is_empty() => format!("{label} ({field})"),
    _ => field.to_owned(),
  }
}

/// Geography levels in canonical order, then `NAME`, then everything else
/// sorted.
pub fn order_columns<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
  let has = |name: &str| fields.iter().any(|f| f.as_ref() == name);

  let mut ordered: Vec<String> = GeoLevel::ALL
    .into_iter()
    .map(GeoLevel::api_name)
    .filter(|name| has(name))
    .map(str::to_owned)
    .collect();
  if has(NAME_FIELD) {
    ordered.push(NAME_FIELD.to_owned());
  }

  let mut rest: Vec<String> = fields
    .iter()
    .map(AsRef::as_ref)
    .filter(|f| *f != NAME_FIELD && GeoLevel::from_api_name(f).is_none())
    .map(str::to_owned)
    .collect();
  rest.sort();
  rest.dedup();

  ordered.extend(rest);
  ordered
}
