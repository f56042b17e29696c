//! Per-key daily request accounting with key rotation.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::{Error, Result};

/// Requests the API allows per key per day.
pub const DEFAULT_DAILY_LIMIT: u32 = 500;

#[derive(Debug, Default)]
struct Usage {
  /// Index into `keys` of the key in use.
  current: usize,
  /// Requests made with the current key.
  used:    u32,
  /// Requests made with any key.
  total:   u64,
}

/// Hands out API keys, moving to the next key once one reaches its ceiling.
///
/// Constructed once per invocation and shared by reference (or `Arc`) with
/// every client that talks to the API. A limiter with no keys still counts
/// requests against a single ceiling and hands out `None`.
#[derive(Debug)]
pub struct RateLimiter {
  keys:        Vec<String>,
  daily_limit: u32,
  usage:       Mutex<Usage>,
}

impl RateLimiter {
  /// Blank keys are ignored. A zero limit is raised to one.
  pub fn new(keys: impl IntoIterator<Item = String>, daily_limit: u32) -> Self {
    let keys = keys
      .into_iter()
      .map(|k| k.trim().to_owned())
      .filter(|k| !k.is_empty())
      .collect();
    Self { keys, daily_limit: daily_limit.max(1), usage: Mutex::default() }
  }

  pub fn keyless(daily_limit: u32) -> Self { Self::new(Vec::new(), daily_limit) }

  fn usage(&self) -> MutexGuard<'_, Usage> {
    self.usage.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Account for one request and return the key to send with it.
  pub fn acquire(&self) -> Result<Option<String>> {
    let mut usage = self.usage();

    if usage.used >= self.daily_limit {
      if usage.current + 1 < self.keys.len() {
        usage.current += 1;
        usage.used = 0;
        info!(key_index = usage.current, "daily limit reached, rotating API key");
      } else {
        warn!(limit = self.daily_limit, "daily request limit exhausted");
        return Err(Error::RateLimited {
          limit: self.daily_limit,
          keys:  self.keys.len().max(1),
        });
      }
    }

    usage.used += 1;
    usage.total += 1;
    Ok(self.keys.get(usage.current).cloned())
  }

  pub fn requests_made(&self) -> u64 { self.usage().total }

  pub fn current_key_index(&self) -> usize { self.usage().current }

  pub fn key_count(&self) -> usize { self.keys.len() }

  pub fn daily_limit(&self) -> u32 { self.daily_limit }
}

impl Default for RateLimiter {
  fn default() -> Self { Self::keyless(DEFAULT_DAILY_LIMIT) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rotates_to_next_key_at_ceiling() {
    let limiter = RateLimiter::new(["a".to_owned(), "b".to_owned()], 2);

    let keys: Vec<_> = (0..4).map(|_| limiter.acquire().unwrap()).collect();
    assert_eq!(
      keys,
      [Some("a".into()), Some("a".into()), Some("b".into()), Some("b".into())]
    );
    assert_eq!(limiter.current_key_index(), 1);

    let err = limiter.acquire().unwrap_err();
    assert!(matches!(err, Error::RateLimited { limit: 2, keys: 2 }));
    assert_eq!(limiter.requests_made(), 4);
  }

  #[test]
  fn keyless_limiter_counts_and_exhausts() {
    let limiter = RateLimiter::keyless(3);
    for _ in 0..3 {
      assert_eq!(limiter.acquire().unwrap(), None);
    }
    assert!(limiter.acquire().is_err());
    assert_eq!(limiter.requests_made(), 3);
  }

  #[test]
  fn blank_keys_are_ignored() {
    let limiter = RateLimiter::new(["  ".to_owned(), " k1 ".to_owned()], 0);
    assert_eq!(limiter.key_count(), 1);
    assert_eq!(limiter.daily_limit(), 1);
    assert_eq!(limiter.acquire().unwrap().as_deref(), Some("k1"));
  }
}
