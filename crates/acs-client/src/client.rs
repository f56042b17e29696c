//! Async HTTP client for the Census ACS 5-year API.

use std::{sync::Arc, time::Duration};

use acs_core::{
  geography::GeographyScope,
  row::CellValue,
  source::{DataSource, GroupSummary},
  variable::VariableCatalog,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result, rate::RateLimiter};

pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";
pub const DEFAULT_DATASET: &str = "acs/acs5";

/// Connection settings for the survey API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url:         String,
  /// Dataset path below the year, e.g. `acs/acs5`.
  pub dataset:          String,
  pub metadata_timeout: Duration,
  pub data_timeout:     Duration,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url:         DEFAULT_BASE_URL.to_owned(),
      dataset:          DEFAULT_DATASET.to_owned(),
      metadata_timeout: Duration::from_secs(60),
      data_timeout:     Duration::from_secs(120),
    }
  }
}

/// The `groups.json` document.
#[derive(Debug, Deserialize)]
struct GroupsDocument {
  #[serde(default)]
  groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
  name:        String,
  #[serde(default)]
  description: String,
}

/// HTTP client for one survey dataset.
///
/// Cheap to clone: the inner [`reqwest::Client`] and the limiter are shared.
#[derive(Clone)]
pub struct CensusClient {
  client:  Client,
  config:  ClientConfig,
  limiter: Arc<RateLimiter>,
}

impl CensusClient {
  pub fn new(config: ClientConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("acs-downloader/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, config, limiter })
  }

  pub fn limiter(&self) -> &RateLimiter { &self.limiter }

  fn url(&self, year: u16, path: &str) -> String {
    format!(
      "{}/{year}/{}{path}",
      self.config.base_url.trim_end_matches('/'),
      self.config.dataset.trim_matches('/'),
    )
  }

  /// Issue one GET through the limiter and return the body.
  async fn get(
    &self,
    url: String,
    query: &[(&str, String)],
    timeout: Duration,
  ) -> Result<String> {
    let key = self.limiter.acquire()?;

    let mut req = self.client.get(&url).timeout(timeout).query(query);
    if let Some(key) = key {
      req = req.query(&[("key", key)]);
    }

    debug!(%url, requests = self.limiter.requests_made(), "GET");
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Status { url, status });
    }

    let body = resp.text().await?;
    if body.trim().is_empty() {
      return Err(Error::EmptyResponse(url));
    }
    Ok(body)
  }
}

impl DataSource for CensusClient {
  type Error = Error;

  /// `GET {base}/{year}/{dataset}/variables.json`
  async fn variables(&self, year: u16) -> Result<VariableCatalog> {
    let body = self
      .get(self.url(year, "/variables.json"), &[], self.config.metadata_timeout)
      .await?;
    Ok(VariableCatalog::from_api_json(year, &body)?)
  }

  /// `GET {base}/{year}/{dataset}/groups/{table}.json`
  async fn group(&self, year: u16, table: &str) -> Result<VariableCatalog> {
    let path = format!("/groups/{}.json", table.trim().to_uppercase());
    let body = self
      .get(self.url(year, &path), &[], self.config.metadata_timeout)
      .await?;
    Ok(VariableCatalog::from_api_json(year, &body)?)
  }

  /// `GET {base}/{year}/{dataset}/groups.json`
  async fn groups(&self, year: u16) -> Result<Vec<GroupSummary>> {
    let body = self
      .get(self.url(year, "/groups.json"), &[], self.config.metadata_timeout)
      .await?;
    let doc: GroupsDocument = serde_json::from_str(&body)?;
    Ok(
      doc
        .groups
        .into_iter()
        .map(|g| GroupSummary { name: g.name, description: g.description })
        .collect(),
    )
  }

  /// `GET {base}/{year}/{dataset}?get=..&for=..&in=..`
  async fn rows(
    &self,
    year: u16,
    fields: &[String],
    scope: &GeographyScope,
  ) -> Result<Vec<Vec<CellValue>>> {
    let query = [
      ("get", fields.join(",")),
      ("for", scope.for_clause()),
      ("in", scope.in_clause()),
    ];
    let body = self
      .get(self.url(year, ""), &query, self.config.data_timeout)
      .await?;
    parse_table(&body)
  }
}

/// Parse a data response: a JSON array of arrays, headers first.
pub fn parse_table(body: &str) -> Result<Vec<Vec<CellValue>>> {
  let table: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;
  Ok(
    table
      .into_iter()
      .map(|row| row.into_iter().map(CellValue::from).collect())
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base_url: &str) -> CensusClient {
    CensusClient::new(
      ClientConfig { base_url: base_url.into(), ..ClientConfig::default() },
      Arc::new(RateLimiter::keyless(10)),
    )
    .unwrap()
  }

  #[test]
  fn urls_join_base_year_and_dataset() {
    let c = client("https://api.census.gov/data/");
    assert_eq!(
      c.url(2023, "/variables.json"),
      "https://api.census.gov/data/2023/acs/acs5/variables.json"
    );
    assert_eq!(c.url(2021, ""), "https://api.census.gov/data/2021/acs/acs5");
  }

  #[test]
  fn data_table_keeps_cells_as_received() {
    let rows = parse_table(
      r#"[["NAME","B01001_001E","state","county"],
          ["Chatham County, Georgia","295291","13","051"],
          ["Somewhere",null,"13","999"]]"#,
    )
    .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], CellValue::from("B01001_001E"));
    assert_eq!(rows[1][1].as_f64(), Some(295291.0));
    assert!(rows[2][1].is_null());
  }

  #[test]
  fn non_json_body_is_an_error() {
    let err = parse_table("<html>Invalid Key</html>").unwrap_err();
    assert!(matches!(err, Error::Json(_)));
  }

  #[tokio::test]
  async fn exhausted_limiter_fails_before_any_request() {
    let limiter = Arc::new(RateLimiter::keyless(1));
    limiter.acquire().unwrap();
    // Unroutable base: the limiter must refuse before a connection is tried.
    let c = CensusClient::new(
      ClientConfig { base_url: "http://127.0.0.1:9".into(), ..ClientConfig::default() },
      limiter,
    )
    .unwrap();
    let err = c.variables(2023).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { .. }));
  }
}
