//! Error types for `acs-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no variables found for the requested tables in {year}")]
  NoVariables { year: u16 },

  #[error("unknown county: {0:?}")]
  UnknownCounty(String),

  #[error("unknown geography granularity: {0:?}")]
  UnknownGranularity(String),

  #[error("invalid derived column {input:?}: {reason}")]
  InvalidDerivedSpec { input: String, reason: &'static str },

  #[error("malformed metadata document: {0}")]
  MalformedMetadata(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
