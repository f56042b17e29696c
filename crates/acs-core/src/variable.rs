//! Variable definitions and the per-year catalog.
//!
//! A variable id has the shape `<TABLE>_<LINE><SUFFIX>`, e.g. `B01001_002E`.
//! The suffix tells an estimate (`E`) from its margin of error (`M`). A
//! catalog holds every definition published for one survey year and is
//! read-only once built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Separates the table id from the line number inside a variable id.
pub const SEPARATOR: char = '_';

/// Separates the hierarchy segments of a variable label.
pub const LABEL_DELIMITER: &str = "!!";

// ─── Kind ────────────────────────────────────────────────────────────────────

/// What a variable measures, derived from the id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
  Estimate,
  MarginOfError,
  Other,
}

impl VariableKind {
  pub fn of(id: &str) -> Self {
    if id.ends_with('E') {
      Self::Estimate
    } else if id.ends_with('M') {
      Self::MarginOfError
    } else {
      Self::Other
    }
  }
}

// ─── Definition ──────────────────────────────────────────────────────────────

/// One variable as published in a year's metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
  pub id:             String,
  /// Hierarchical label, segments joined by [`LABEL_DELIMITER`].
  pub label:          String,
  /// Table-level description.
  pub concept:        String,
  /// Table id the variable belongs to; empty for pseudo-variables.
  pub group:          String,
  pub year:           u16,
  pub predicate_type: String,
  pub limit:          String,
  /// Free-form attribute payload exactly as the API supplied it.
  pub attributes:     serde_json::Value,
  /// Enumerated value domain, `Null` when the variable has none.
  pub values:         serde_json::Value,
}

impl VariableDefinition {
  pub fn kind(&self) -> VariableKind { VariableKind::of(&self.id) }

  pub fn table_id(&self) -> &str { table_id(&self.id) }
}

/// The substring of `id` before the first [`SEPARATOR`], or all of it.
pub fn table_id(id: &str) -> &str {
  id.split(SEPARATOR).next().unwrap_or(id)
}

// ─── Wire shape ──────────────────────────────────────────────────────────────

/// The `variables.json` / `groups/<T>.json` document.
#[derive(Debug, Deserialize)]
struct MetadataDocument {
  #[serde(default)]
  variables: BTreeMap<String, RawVariable>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVariable {
  #[serde(default)]
  label:          Option<serde_json::Value>,
  #[serde(default)]
  concept:        Option<String>,
  #[serde(default)]
  group:          Option<String>,
  #[serde(default)]
  predicate_type: Option<String>,
  #[serde(default)]
  limit:          Option<serde_json::Value>,
  #[serde(default)]
  attributes:     Option<serde_json::Value>,
  #[serde(default)]
  values:         Option<serde_json::Value>,
}

fn scalar_to_string(value: Option<serde_json::Value>) -> String {
  match value {
    None | Some(serde_json::Value::Null) => String::new(),
    Some(serde_json::Value::String(s)) => s,
    Some(other) => other.to_string(),
  }
}

impl RawVariable {
  fn into_definition(self, id: String, year: u16) -> VariableDefinition {
    VariableDefinition {
      id,
      label: scalar_to_string(self.label),
      concept: self.concept.unwrap_or_default(),
      group: self.group.filter(|g| g != "N/A").unwrap_or_default(),
      year,
      predicate_type: self.predicate_type.unwrap_or_default(),
      limit: scalar_to_string(self.limit),
      attributes: self.attributes.unwrap_or(serde_json::Value::Null),
      values: self.values.unwrap_or(serde_json::Value::Null),
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Every known variable for one survey year, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCatalog {
  year:      u16,
  variables: BTreeMap<String, VariableDefinition>,
}

impl VariableCatalog {
  pub fn new(year: u16) -> Self {
    Self { year, variables: BTreeMap::new() }
  }

  /// Build a catalog from definitions; later duplicates replace earlier ones.
  pub fn from_definitions(
    year: u16,
    definitions: impl IntoIterator<Item = VariableDefinition>,
  ) -> Self {
    let mut catalog = Self::new(year);
    for def in definitions {
      catalog.insert(def);
    }
    catalog
  }

  /// Parse a metadata document (`{"variables": {...}}`) for `year`.
  pub fn from_api_json(year: u16, document: &str) -> Result<Self> {
    let doc: MetadataDocument = serde_json::from_str(document)?;
    if doc.variables.is_empty() {
      return Err(Error::MalformedMetadata(format!(
        "no variables in metadata document for {year}"
      )));
    }
    Ok(Self::from_definitions(
      year,
      doc
        .variables
        .into_iter()
        .map(|(id, raw)| raw.into_definition(id, year)),
    ))
  }

  pub fn year(&self) -> u16 { self.year }

  pub fn len(&self) -> usize { self.variables.len() }

  pub fn is_empty(&self) -> bool { self.variables.is_empty() }

  pub fn insert(&mut self, mut def: VariableDefinition) {
    def.year = self.year;
    self.variables.insert(def.id.clone(), def);
  }

  pub fn get(&self, id: &str) -> Option<&VariableDefinition> {
    self.variables.get(id)
  }

  pub fn contains(&self, id: &str) -> bool { self.variables.contains_key(id) }

  /// Raw label for `id`, if the variable is known.
  pub fn label(&self, id: &str) -> Option<&str> {
    self.get(id).map(|d| d.label.as_str())
  }

  /// All ids in lexicographic order.
  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.variables.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &VariableDefinition> {
    self.variables.values()
  }

  /// Ids starting with `prefix`, in lexicographic order.
  pub fn ids_with_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Iterator<Item = &'a str> + 'a {
    self
      .variables
      .range(prefix.to_owned()..)
      .map(|(id, _)| id.as_str())
      .take_while(move |id| id.starts_with(prefix))
  }

  pub fn into_definitions(self) -> impl Iterator<Item = VariableDefinition> {
    self.variables.into_values()
  }
}
