//! Error types for the download pipeline.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A requested year that produced no table, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedYear {
  pub year:   u16,
  pub reason: String,
}

impl fmt::Display for FailedYear {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.year, self.reason)
  }
}

fn list(failures: &[FailedYear]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] acs_core::Error),

  #[error("table error: {0}")]
  Table(#[from] acs_table::Error),

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("no year produced data ({})", list(.0))]
  AllYearsFailed(Vec<FailedYear>),

  #[error("data source error: {0}")]
  Source(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("catalog store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn source_err(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }

  pub(crate) fn store_err(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
