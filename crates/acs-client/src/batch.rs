//! Batched retrieval of many variables for one year and scope.
//!
//! The API caps the number of fields per request, so a resolved variable list
//! is split into fixed-size batches. Each request asks for `NAME` plus one
//! batch; the answers describe the same geographies and are merged into one
//! [`RowSet`] on their geography key. Requests are issued one at a time with
//! a pause in between.

use std::{iter, time::Duration};

use acs_core::{
  geography::{GeographyScope, NAME_FIELD},
  row::RowSet,
  source::DataSource,
};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 45;

/// `NAME` plus a batch must stay within the API's 50-field ceiling.
pub const MAX_BATCH_SIZE: usize = 49;

pub const DEFAULT_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
  pub size:  usize,
  /// Delay between consecutive requests.
  pub pause: Duration,
}

impl BatchConfig {
  /// `size` is clamped to `1..=MAX_BATCH_SIZE`.
  pub fn new(size: usize, pause: Duration) -> Self {
    Self { size: size.clamp(1, MAX_BATCH_SIZE), pause }
  }
}

impl Default for BatchConfig {
  fn default() -> Self { Self::new(DEFAULT_BATCH_SIZE, DEFAULT_PAUSE) }
}

/// Split `variables` into consecutive batches of at most `size` ids.
pub fn partition(variables: &[String], size: usize) -> impl Iterator<Item = &[String]> {
  variables.chunks(size.clamp(1, MAX_BATCH_SIZE))
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// A batch whose request or response failed; its variables are absent from
/// the merged rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBatch {
  pub index:     usize,
  pub variables: Vec<String>,
  pub reason:    String,
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
  pub rows:    RowSet,
  pub batches: usize,
  pub failed:  Vec<FailedBatch>,
}

impl FetchOutcome {
  /// Number of requested variables lost to failed batches.
  pub fn missing_variables(&self) -> usize {
    self.failed.iter().map(|b| b.variables.len()).sum()
  }

  pub fn all_failed(&self) -> bool {
    self.batches > 0 && self.failed.len() == self.batches
  }
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

pub struct BatchFetcher<'s, S> {
  source: &'s S,
  config: BatchConfig,
}

impl<'s, S: DataSource> BatchFetcher<'s, S> {
  pub fn new(source: &'s S, config: BatchConfig) -> Self { Self { source, config } }

  /// Fetch every variable in `variables` for `year` and `scope`.
  ///
  /// A failed batch is logged and recorded in the outcome; the remaining
  /// batches still run.
  pub async fn fetch(
    &self,
    year: u16,
    variables: &[String],
    scope: &GeographyScope,
  ) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();

    for (index, batch) in partition(variables, self.config.size).enumerate() {
      if index > 0 && !self.config.pause.is_zero() {
        tokio::time::sleep(self.config.pause).await;
      }
      outcome.batches += 1;

      let fields: Vec<String> = iter::once(NAME_FIELD.to_owned())
        .chain(batch.iter().filter(|v| v.as_str() != NAME_FIELD).cloned())
        .collect();

      let reason = match self.source.rows(year, &fields, scope).await {
        Ok(mut table) if !table.is_empty() => {
          let headers: Vec<String> =
            table.remove(0).iter().map(ToString::to_string).collect();
          let rows = table.len();
          let inserted = outcome.rows.merge_response(&headers, table);
          debug!(year, batch = index, rows, inserted, "batch merged");
          continue;
        }
        Ok(_) => "response held no header row".to_owned(),
        Err(e) => e.to_string(),
      };

      warn!(year, batch = index, variables = batch.len(), %reason, "batch failed, skipping");
      outcome.failed.push(FailedBatch { index, variables: batch.to_vec(), reason });
    }

    info!(
      year,
      batches = outcome.batches,
      failed = outcome.failed.len(),
      rows = outcome.rows.len(),
      "fetch complete"
    );
    outcome
  }
}
