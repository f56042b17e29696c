//! Derived (calculated) columns over a merged row set.
//!
//! A spec combines two existing columns with one binary operator and stores
//! the result under a new name on every row. Specs that reference a column
//! the row set does not have are skipped whole; they never fail the pipeline.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result, row::{CellValue, RowSet}};

// ─── Operator ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
  Divide,
  Multiply,
  Add,
  Subtract,
}

impl Operator {
  /// Apply the operator. Division by zero yields zero.
  pub fn apply(self, left: f64, right: f64) -> f64 {
    match self {
      Self::Divide if right == 0.0 => 0.0,
      Self::Divide => left / right,
      Self::Multiply => left * right,
      Self::Add => left + right,
      Self::Subtract => left - right,
    }
  }

  pub fn symbol(self) -> char {
    match self {
      Self::Divide => '÷',
      Self::Multiply => '×',
      Self::Add => '+',
      Self::Subtract => '−',
    }
  }

  /// Accepts both the typographic and the ASCII spelling.
  pub fn from_symbol(c: char) -> Option<Self> {
    match c {
      '÷' | '/' => Some(Self::Divide),
      '×' | '*' => Some(Self::Multiply),
      '+' => Some(Self::Add),
      '−' | '-' => Some(Self::Subtract),
      _ => None,
    }
  }
}

// ─── Spec ────────────────────────────────────────────────────────────────────

/// `name = numerator <op> denominator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedColumnSpec {
  pub numerator:   String,
  pub denominator: String,
  pub operator:    Operator,
  pub name:        String,
}

impl DerivedColumnSpec {
  pub fn new(
    name: impl Into<String>,
    numerator: impl Into<String>,
    operator: Operator,
    denominator: impl Into<String>,
  ) -> Self {
    Self {
      numerator: numerator.into(),
      denominator: denominator.into(),
      operator,
      name: name.into(),
    }
  }
}

impl fmt::Display for DerivedColumnSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}={}{}{}",
      self.name,
      self.numerator,
      self.operator.symbol(),
      self.denominator
    )
  }
}

impl FromStr for DerivedColumnSpec {
  type Err = Error;

  /// Parses `NAME=LEFT<op>RIGHT`, e.g. `pct_male=B01001_002E/B01001_001E`.
  fn from_str(input: &str) -> Result<Self> {
    let invalid = |reason| Error::InvalidDerivedSpec { input: input.to_owned(), reason };

    let (name, expr) = input.split_once('=').ok_or_else(|| invalid("missing '='"))?;
    let name = name.trim();
    if name.is_empty() {
      return Err(invalid("empty column name"));
    }

    let (at, operator) = expr
      .char_indices()
      .skip(1)
      .find_map(|(i, c)| Operator::from_symbol(c).map(|op| (i, op)))
      .ok_or_else(|| invalid("missing operator"))?;
    let left = expr[..at].trim();
    let right = expr[at + operator_len(&expr[at..])..].trim();
    if left.is_empty() || right.is_empty() {
      return Err(invalid("missing operand"));
    }

    Ok(Self::new(name, left, operator, right))
  }
}

fn operator_len(rest: &str) -> usize {
  rest.chars().next().map_or(0, char::len_utf8)
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// A spec that could not be applied, with the operands that were missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSpec {
  pub name:    String,
  pub missing: Vec<String>,
}

/// What [`apply_derived`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeriveReport {
  pub applied: Vec<String>,
  pub skipped: Vec<SkippedSpec>,
}

/// Exact header match, falling back to a case-insensitive one so that
/// `b01001_001e` finds `B01001_001E`.
fn find_header(rows: &RowSet, name: &str) -> Option<String> {
  let headers = rows.headers();
  headers
    .iter()
    .find(|h| h.as_str() == name)
    .or_else(|| headers.iter().find(|h| h.eq_ignore_ascii_case(name)))
    .cloned()
}

fn operand(value: Option<&CellValue>) -> f64 {
  value.and_then(CellValue::as_f64).unwrap_or(0.0)
}

/// Append one column per applicable spec to every row of `rows`.
///
/// Specs are applied in order, so a later spec may use an earlier spec's
/// output. Re-using a name recomputes the column without duplicating the
/// header.
pub fn apply_derived(rows: &mut RowSet, specs: &[DerivedColumnSpec]) -> DeriveReport {
  let mut report = DeriveReport::default();

  for spec in specs {
    let (Some(numerator), Some(denominator)) = (
      find_header(rows, &spec.numerator),
      find_header(rows, &spec.denominator),
    ) else {
      let missing: Vec<String> = [&spec.numerator, &spec.denominator]
        .into_iter()
        .filter(|name| find_header(rows, name).is_none())
        .cloned()
        .collect();
      warn!(column = %spec.name, ?missing, "skipping derived column with unknown operands");
      report.skipped.push(SkippedSpec { name: spec.name.clone(), missing });
      continue;
    };

    for row in rows.rows_mut() {
      let value = spec.operator.apply(
        operand(row.get(&numerator)),
        operand(row.get(&denominator)),
      );
      row.set(spec.name.clone(), CellValue::Number(value));
    }
    rows.register_header(&spec.name);
    report.applied.push(spec.name.clone());
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row_set() -> RowSet {
    let headers: Vec<String> = ["NAME", "B01001_001E", "B01001_002E", "state", "county"]
      .into_iter()
      .map(String::from)
      .collect();
    let mut set = RowSet::new();
    set.merge_response(
      &headers,
      vec![
        ["Chatham", "200", "90", "13", "051"].map(CellValue::from).to_vec(),
        ["Bryan", "0", "12", "13", "029"].map(CellValue::from).to_vec(),
        vec![
          CellValue::from("Liberty"),
          CellValue::Null,
          CellValue::from("n/a"),
          CellValue::from("13"),
          CellValue::from("179"),
        ],
      ],
    );
    set
  }

  #[test]
  fn parses_ascii_and_typographic_operators() {
    let spec: DerivedColumnSpec = "share = b01001_002e / B01001_001E".parse().unwrap();
    assert_eq!(
      spec,
      DerivedColumnSpec::new("share", "b01001_002e", Operator::Divide, "B01001_001E")
    );

    let spec: DerivedColumnSpec = "gap=B01001_001E−B01001_002E".parse().unwrap();
    assert_eq!(spec.operator, Operator::Subtract);
    assert_eq!(spec.denominator, "B01001_002E");
    assert_eq!(spec.to_string(), "gap=B01001_001E−B01001_002E");

    let spec: DerivedColumnSpec = "x2=B01001_001E×B01001_001E".parse().unwrap();
    assert_eq!(spec.operator, Operator::Multiply);
  }

  #[test]
  fn rejects_malformed_specs() {
    for input in ["B01001_001E/B01001_002E", "=A/B", "n=AB", "n=/B", "n=A/"] {
      assert!(input.parse::<DerivedColumnSpec>().is_err(), "{input}");
    }
  }

  #[test]
  fn divides_with_zero_guard_and_coercion() {
    let mut rows = row_set();
    let report = apply_derived(
      &mut rows,
      &[DerivedColumnSpec::new("share", "B01001_002E", Operator::Divide, "B01001_001E")],
    );

    assert_eq!(report.applied, ["share"]);
    assert!(report.skipped.is_empty());
    assert!(rows.has_header("share"));

    let values: Vec<_> = rows.rows().iter().map(|r| r.get("share").cloned()).collect();
    assert_eq!(
      values,
      [
        Some(CellValue::Number(0.45)),
        // 12 / 0
        Some(CellValue::Number(0.0)),
        // unparseable / absent coerce to zero
        Some(CellValue::Number(0.0)),
      ]
    );
  }

  #[test]
  fn unknown_operand_is_skipped_without_header() {
    let mut rows = row_set();
    let report = apply_derived(
      &mut rows,
      &[DerivedColumnSpec::new("bad", "B99999_001E", Operator::Add, "B01001_001E")],
    );

    assert!(report.applied.is_empty());
    assert_eq!(report.skipped[0].missing, ["B99999_001E"]);
    assert!(!rows.has_header("bad"));
    assert!(rows.rows().iter().all(|r| r.get("bad").is_none()));
  }

  #[test]
  fn repeated_name_recomputes_once_in_header() {
    let mut rows = row_set();
    apply_derived(
      &mut rows,
      &[
        DerivedColumnSpec::new("calc", "B01001_001E", Operator::Add, "B01001_002E"),
        DerivedColumnSpec::new("calc", "B01001_001E", Operator::Subtract, "B01001_002E"),
      ],
    );

    assert_eq!(rows.headers().iter().filter(|h| *h == "calc").count(), 1);
    assert_eq!(rows.rows()[0].get("calc"), Some(&CellValue::Number(110.0)));
  }

  #[test]
  fn operands_match_case_insensitively() {
    let mut rows = row_set();
    let spec: DerivedColumnSpec = "share=b01001_002e/b01001_001e".parse().unwrap();
    let report = apply_derived(&mut rows, &[spec]);
    assert_eq!(report.applied, ["share"]);
    assert_eq!(rows.rows()[0].get("share"), Some(&CellValue::Number(0.45)));
  }

  #[test]
  fn later_spec_can_use_earlier_output() {
    let mut rows = row_set();
    let report = apply_derived(
      &mut rows,
      &[
        DerivedColumnSpec::new("sum", "B01001_001E", Operator::Add, "B01001_002E"),
        DerivedColumnSpec::new("scaled", "sum", Operator::Multiply, "B01001_001E"),
      ],
    );
    assert_eq!(report.applied, ["sum", "scaled"]);
    assert_eq!(rows.rows()[0].get("scaled"), Some(&CellValue::Number(58000.0)));
  }
}
