//! Token resolution: free-form table/variable tokens to concrete variable ids.
//!
//! | Token        | Resolves to                                   |
//! |--------------|-----------------------------------------------|
//! | `B01001`     | `B01001_001E` (+ `B01001_001M`)               |
//! | `B01001_003` | `B01001_003E` (+ `B01001_003M`)               |
//! | `B01001_*`   | every `B01001_…E` (+ every `B01001_…M`)       |
//!
//! Ids that do not exist in the catalog are dropped silently. The result is
//! deduplicated and sorted so that batching downstream is deterministic.

use std::collections::BTreeSet;

use crate::{
  Error, Result,
  variable::{SEPARATOR, VariableCatalog},
};

const WILDCARD: char = '*';
const TOTAL_LINE: &str = "001";

/// Split user input on whitespace and commas.
pub fn split_tokens(input: &str) -> Vec<String> {
  input
    .split(|c: char| c.is_whitespace() || c == ',')
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
    .collect()
}

/// Resolve `tokens` against `catalog`.
pub fn resolve_tokens<I, T>(
  catalog: &VariableCatalog,
  tokens: I,
  include_moe: bool,
) -> Vec<String>
where
  I: IntoIterator<Item = T>,
  T: AsRef<str>,
{
  let mut resolved = BTreeSet::new();

  for raw in tokens {
    let token = raw.as_ref().trim().to_uppercase();
    if token.is_empty() {
      continue;
    }

    if let Some(base) = token.strip_suffix(WILDCARD) {
      let table = base.trim_end_matches(SEPARATOR);
      if table.is_empty() {
        continue;
      }
      let prefix = format!("{table}{SEPARATOR}");
      resolved.extend(
        catalog
          .ids_with_prefix(&prefix)
          .filter(|id| id.ends_with('E') || (include_moe && id.ends_with('M')))
          .map(str::to_owned),
      );
    } else if token.contains(SEPARATOR) {
      push_stem(catalog, &token, include_moe, &mut resolved);
    } else {
      let stem = format!("{token}{SEPARATOR}{TOTAL_LINE}");
      push_stem(catalog, &stem, include_moe, &mut resolved);
    }
  }

  resolved.into_iter().collect()
}

/// Like [`resolve_tokens`], but an empty result is an error for the
/// catalog's year.
pub fn resolve_for_year<I, T>(
  catalog: &VariableCatalog,
  tokens: I,
  include_moe: bool,
) -> Result<Vec<String>>
where
  I: IntoIterator<Item = T>,
  T: AsRef<str>,
{
  let resolved = resolve_tokens(catalog, tokens, include_moe);
  if resolved.is_empty() {
    return Err(Error::NoVariables { year: catalog.year() });
  }
  Ok(resolved)
}

fn push_stem(
  catalog: &VariableCatalog,
  stem: &str,
  include_moe: bool,
  out: &mut BTreeSet<String>,
) {
  let estimate = format!("{stem}E");
  if catalog.contains(&estimate) {
    out.insert(estimate);
  }
  if include_moe {
    let moe = format!("{stem}M");
    if catalog.contains(&moe) {
      out.insert(moe);
    }
  }
}
