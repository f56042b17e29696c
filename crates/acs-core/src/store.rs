//! The `CatalogStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `acs-store-sqlite`).
//! The pipeline and the CLI depend on this abstraction, not on any concrete
//! backend.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::variable::{VariableCatalog, VariableDefinition};

/// Result count when a query does not set one.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

// ─── Query and result types ──────────────────────────────────────────────────

/// Parameters for [`CatalogStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
  /// Free text matched against label, concept, id and table.
  pub text:  String,
  /// Restrict to one survey year.
  pub year:  Option<u16>,
  pub limit: Option<usize>,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into(), ..Self::default() }
  }

  pub fn effective_limit(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
  pub id:       String,
  pub label:    String,
  pub concept:  String,
  pub group:    String,
  pub year:     u16,
  pub table_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableSummary {
  pub id:      String,
  pub label:   String,
  pub concept: String,
}

/// One completed metadata refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshRecord {
  pub year:           u16,
  pub refreshed_at:   DateTime<Utc>,
  pub variable_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
  pub total:      usize,
  pub by_year:    BTreeMap<u16, usize>,
  /// Largest tables by variable count, at most ten.
  pub top_groups: Vec<(String, usize)>,
  /// Most recent refresh first.
  pub refreshes:  Vec<RefreshRecord>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the persisted variable catalog.
///
/// Only [`upsert_year`] writes, inserting or replacing one year's definitions.
/// Definitions of different years never overwrite each other.
///
/// [`upsert_year`]: CatalogStore::upsert_year
pub trait CatalogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or replace every definition in `catalog` and record a refresh.
  /// Returns the number of rows written.
  fn upsert_year(
    &self,
    catalog: VariableCatalog,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// The stored catalog for `year`, or `None` if it was never refreshed.
  fn load_catalog(
    &self,
    year: u16,
  ) -> impl Future<Output = Result<Option<VariableCatalog>, Self::Error>> + Send + '_;

  /// Ranked free-text search. An empty query returns nothing.
  fn search<'a>(
    &'a self,
    query: &'a SearchQuery,
  ) -> impl Future<Output = Result<Vec<SearchHit>, Self::Error>> + Send + 'a;

  /// One variable; the latest stored year when `year` is `None`.
  fn get_variable<'a>(
    &'a self,
    id: &'a str,
    year: Option<u16>,
  ) -> impl Future<Output = Result<Option<VariableDefinition>, Self::Error>> + Send + 'a;

  /// Every variable of `group` in `year`, ordered by id.
  fn variables_by_group<'a>(
    &'a self,
    group: &'a str,
    year: u16,
  ) -> impl Future<Output = Result<Vec<VariableSummary>, Self::Error>> + Send + 'a;

  fn stats(&self) -> impl Future<Output = Result<CatalogStats, Self::Error>> + Send + '_;
}
