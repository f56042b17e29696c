//! Error type for `acs-client`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] acs_core::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("GET {url} → {status}")]
  Status { url: String, status: reqwest::StatusCode },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("empty response from {0}")]
  EmptyResponse(String),

  /// Every configured key has used its daily allowance.
  #[error("daily request limit of {limit} reached for all {keys} key(s)")]
  RateLimited { limit: u32, keys: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
