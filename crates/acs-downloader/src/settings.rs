//! Runtime configuration: an optional TOML file layered with `ACS_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use acs_client::{BatchConfig, ClientConfig, RateLimiter, batch, client, rate};
use acs_core::{
  geography::{County, CountyRegistry},
  years::DEFAULT_YEAR,
};
use serde::Deserialize;

use crate::Result;

/// Environment variable prefix, e.g. `ACS_API_KEYS=k1,k2`.
pub const ENV_PREFIX: &str = "ACS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub base_url:              String,
  pub dataset:               String,
  pub store_path:            PathBuf,
  pub downloads_dir:         PathBuf,
  pub api_keys:              Vec<String>,
  pub daily_request_limit:   u32,
  pub batch_size:            usize,
  pub batch_pause_ms:        u64,
  pub metadata_timeout_secs: u64,
  pub data_timeout_secs:     u64,
  pub state_fips:            String,
  pub default_county:        String,
  pub counties:              Vec<County>,
  pub default_year:          u16,
}

impl Default for AppConfig {
  fn default() -> Self {
    let registry = CountyRegistry::coastal_georgia();
    let client = ClientConfig::default();
    Self {
      base_url:              client.base_url,
      dataset:               client.dataset,
      store_path:            PathBuf::from("acs_variables.db"),
      downloads_dir:         PathBuf::from("csv-downloads"),
      api_keys:              Vec::new(),
      daily_request_limit:   rate::DEFAULT_DAILY_LIMIT,
      batch_size:            batch::DEFAULT_BATCH_SIZE,
      batch_pause_ms:        batch::DEFAULT_PAUSE.as_millis() as u64,
      metadata_timeout_secs: client.metadata_timeout.as_secs(),
      data_timeout_secs:     client.data_timeout.as_secs(),
      state_fips:            registry.state_fips().to_owned(),
      default_county:        registry.default_county().name.clone(),
      counties:              registry.counties().to_vec(),
      default_year:          DEFAULT_YEAR,
    }
  }
}

impl AppConfig {
  /// Read `path` (if it exists) and then the environment.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("api_keys"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn registry(&self) -> Result<CountyRegistry> {
    Ok(CountyRegistry::new(
      self.state_fips.clone(),
      self.counties.clone(),
      &self.default_county,
    )?)
  }

  pub fn client_config(&self) -> ClientConfig {
    ClientConfig {
      base_url:         self.base_url.clone(),
      dataset:          self.dataset.clone(),
      metadata_timeout: Duration::from_secs(self.metadata_timeout_secs),
      data_timeout:     Duration::from_secs(self.data_timeout_secs),
    }
  }

  pub fn batch_config(&self) -> BatchConfig {
    BatchConfig::new(self.batch_size, Duration::from_millis(self.batch_pause_ms))
  }

  /// Limiter over the configured keys plus any `extra_keys` (e.g. from flags),
  /// extra keys first.
  pub fn rate_limiter(&self, extra_keys: &[String]) -> RateLimiter {
    RateLimiter::new(
      extra_keys.iter().chain(&self.api_keys).cloned(),
      self.daily_request_limit,
    )
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn downloads_dir(&self) -> PathBuf { expand_tilde(&self.downloads_dir) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.default_year, 2023);
    assert_eq!(cfg.batch_size, 45);
    assert_eq!(cfg.batch_pause_ms, 200);
    assert_eq!(cfg.daily_request_limit, 500);
    assert_eq!(cfg.registry().unwrap().default_county().fips, "051");
  }

  #[test]
  fn file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      r#"
api_keys = ["k1", "k2"]
batch_size = 80
default_county = "Bryan"
downloads_dir = "out"
"#
    )
    .unwrap();

    let cfg = AppConfig::load(file.path()).unwrap();
    assert_eq!(cfg.api_keys, ["k1", "k2"]);
    // Clamped to what the API accepts next to NAME.
    assert_eq!(cfg.batch_config().size, 49);
    assert_eq!(cfg.registry().unwrap().default_county().name, "Bryan");
    assert_eq!(cfg.downloads_dir(), PathBuf::from("out"));

    let limiter = cfg.rate_limiter(&["flag".to_owned()]);
    assert_eq!(limiter.key_count(), 3);
    assert_eq!(limiter.acquire().unwrap().as_deref(), Some("flag"));
  }

  #[test]
  fn unknown_default_county_is_rejected() {
    let cfg = AppConfig { default_county: "Fulton".into(), ..AppConfig::default() };
    assert!(cfg.registry().is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/acs.db")),
      PathBuf::from(home).join("acs.db")
    );
    assert_eq!(expand_tilde(Path::new("/tmp/acs.db")), PathBuf::from("/tmp/acs.db"));
  }
}
