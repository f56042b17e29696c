//! Error types for the tabular codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("archive error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("no tables to package")]
  NothingToPackage,

  #[error("unknown output format {0:?} (expected \"zip\" or \"combined\")")]
  UnknownFormat(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
