//! The `DataSource` trait: the remote survey API as seen by the pipeline.
//!
//! Implemented by `acs-client` over HTTP and by in-memory fakes in tests.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{geography::GeographyScope, row::CellValue, variable::VariableCatalog};

/// One entry of a year's table list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
  /// Table id, e.g. `B01001`.
  pub name:        String,
  pub description: String,
}

/// Read-only access to the survey API for one dataset.
pub trait DataSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every variable published for `year`.
  fn variables(
    &self,
    year: u16,
  ) -> impl Future<Output = Result<VariableCatalog, Self::Error>> + Send + '_;

  /// The variables of one table for `year`.
  fn group<'a>(
    &'a self,
    year: u16,
    table: &'a str,
  ) -> impl Future<Output = Result<VariableCatalog, Self::Error>> + Send + 'a;

  /// The tables published for `year`.
  fn groups(
    &self,
    year: u16,
  ) -> impl Future<Output = Result<Vec<GroupSummary>, Self::Error>> + Send + '_;

  /// Request `fields` for every geography in `scope`.
  ///
  /// The first returned row holds the field names; the API appends the
  /// geography columns itself.
  fn rows<'a>(
    &'a self,
    year: u16,
    fields: &'a [String],
    scope: &'a GeographyScope,
  ) -> impl Future<Output = Result<Vec<Vec<CellValue>>, Self::Error>> + Send + 'a;
}
