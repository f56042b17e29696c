//! The download pipeline: catalog → resolve → batch fetch → derive → render
//! → package.
//!
//! Years are processed one after another and batches within a year one after
//! another. A year whose catalog cannot be obtained, or whose tokens resolve
//! to nothing, is reported in [`DownloadOutcome::failed_years`] while the
//! remaining years still produce tables.

use std::{
  collections::{BTreeSet, HashMap},
  path::{Path, PathBuf},
  sync::{Arc, Mutex, PoisonError},
};

use acs_client::{BatchConfig, BatchFetcher, FailedBatch};
use acs_core::{
  derive::{DeriveReport, DerivedColumnSpec, apply_derived},
  geography::{CountyRegistry, Granularity},
  resolve::resolve_for_year,
  source::DataSource,
  store::CatalogStore,
  variable::VariableCatalog,
};
use acs_table::{FileNames, PackageFormat, RenderedTable, TabularArtifact, package};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Error, FailedYear, Result};

// ─── Request and outcome ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
  /// Table or variable tokens as typed, e.g. `["B01001", "B19013_001"]`.
  pub tables:      Vec<String>,
  pub years:       Vec<u16>,
  /// County name; the registry default when `None`.
  pub county:      Option<String>,
  pub granularity: Granularity,
  pub include_moe: bool,
  /// Packaging when more than one year succeeds.
  pub format:      PackageFormat,
  pub derived:     Vec<DerivedColumnSpec>,
}

/// What happened for one year that produced a table.
#[derive(Debug, Clone, Serialize)]
pub struct YearReport {
  pub year:              u16,
  pub variables:         usize,
  pub rows:              usize,
  pub failed_batches:    Vec<FailedBatch>,
  pub missing_variables: usize,
  pub derived:           DeriveReport,
  /// Where the year's CSV was written, if writing succeeded.
  pub persisted:         Option<PathBuf>,
}

#[derive(Debug)]
pub struct DownloadOutcome {
  pub artifact:     TabularArtifact,
  pub reports:      Vec<YearReport>,
  pub failed_years: Vec<FailedYear>,
  /// Where the final artifact was written, if it differs from a year's CSV
  /// and writing succeeded.
  pub persisted:    Option<PathBuf>,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<S, C> {
  source:        S,
  store:         C,
  registry:      CountyRegistry,
  batch:         BatchConfig,
  downloads_dir: Option<PathBuf>,
  /// Catalogs already obtained during this invocation.
  catalogs:      Mutex<HashMap<u16, Arc<VariableCatalog>>>,
}

impl<S: DataSource, C: CatalogStore> Pipeline<S, C> {
  pub fn new(source: S, store: C, registry: CountyRegistry, batch: BatchConfig) -> Self {
    Self {
      source,
      store,
      registry,
      batch,
      downloads_dir: None,
      catalogs: Mutex::default(),
    }
  }

  /// Write every rendered file under `dir` as well as returning it.
  pub fn with_downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.downloads_dir = Some(dir.into());
    self
  }

  pub fn source(&self) -> &S { &self.source }

  pub fn store(&self) -> &C { &self.store }

  pub fn registry(&self) -> &CountyRegistry { &self.registry }

  fn cached(&self, year: u16) -> Option<Arc<VariableCatalog>> {
    self
      .catalogs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&year)
      .cloned()
  }

  fn remember(&self, catalog: VariableCatalog) -> Arc<VariableCatalog> {
    let catalog = Arc::new(catalog);
    self
      .catalogs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(catalog.year(), Arc::clone(&catalog));
    catalog
  }

  // ── Catalogs ──────────────────────────────────────────────────────────────

  /// The catalog for `year`: from this invocation's cache, else the store,
  /// else the remote API.
  pub async fn catalog(&self, year: u16) -> Result<Arc<VariableCatalog>> {
    if let Some(catalog) = self.cached(year) {
      return Ok(catalog);
    }

    match self.store.load_catalog(year).await {
      Ok(Some(catalog)) => {
        debug!(year, variables = catalog.len(), "catalog loaded from store");
        return Ok(self.remember(catalog));
      }
      Ok(None) => {}
      Err(e) => warn!(year, error = %e, "catalog store unreadable, fetching remotely"),
    }

    info!(year, "fetching variable metadata");
    let catalog = self.source.variables(year).await.map_err(Error::source_err)?;
    Ok(self.remember(catalog))
  }

  /// Fetch `year`'s metadata remotely and replace the stored copy.
  pub async fn refresh(&self, year: u16) -> Result<usize> {
    info!(year, "refreshing variable metadata");
    let catalog = self.source.variables(year).await.map_err(Error::source_err)?;
    let written = self
      .store
      .upsert_year(catalog.clone())
      .await
      .map_err(Error::store_err)?;
    self.remember(catalog);
    info!(year, variables = written, "catalog stored");
    Ok(written)
  }

  /// Resolve `tokens` against `year`'s catalog without fetching any data.
  pub async fn resolve(
    &self,
    tokens: &[String],
    year: u16,
    include_moe: bool,
  ) -> Result<Vec<String>> {
    let catalog = self.catalog(year).await?;
    Ok(resolve_for_year(&catalog, tokens, include_moe)?)
  }

  // ── Download ──────────────────────────────────────────────────────────────

  pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
    let scope = self.registry.scope(request.county.as_deref(), request.granularity)?;
    let names = FileNames::for_scope(&scope);
    let years: BTreeSet<u16> = request.years.iter().copied().collect();

    let mut failed_years = Vec::new();
    let mut resolved = Vec::new();
    for &year in &years {
      let result = async {
        let catalog = self.catalog(year).await?;
        let variables = resolve_for_year(&catalog, &request.tables, request.include_moe)?;
        Ok::<_, Error>((catalog, variables))
      }
      .await;

      match result {
        Ok((catalog, variables)) => {
          info!(year, variables = variables.len(), "tokens resolved");
          resolved.push((year, catalog, variables));
        }
        Err(e) => {
          warn!(year, error = %e, "year skipped");
          failed_years.push(FailedYear { year, reason: e.to_string() });
        }
      }
    }

    let fetcher = BatchFetcher::new(&self.source, self.batch);
    let mut tables = Vec::new();
    let mut reports = Vec::new();
    for (year, catalog, variables) in resolved {
      let mut outcome = fetcher.fetch(year, &variables, &scope).await;
      if outcome.rows.is_empty() {
        let reason = match outcome.failed.first() {
          Some(batch) if outcome.all_failed() => {
            format!("every data request failed ({})", batch.reason)
          }
          _ => "no rows returned".to_owned(),
        };
        warn!(year, %reason, "year skipped");
        failed_years.push(FailedYear { year, reason });
        continue;
      }

      let derived = apply_derived(&mut outcome.rows, &request.derived);
      let table = RenderedTable::from_rows(year, &outcome.rows, &catalog);
      let persisted = self.persist_csv(&names.year_csv(year), &table);

      reports.push(YearReport {
        year,
        variables: variables.len(),
        rows: table.len(),
        missing_variables: outcome.missing_variables(),
        failed_batches: outcome.failed,
        derived,
        persisted,
      });
      tables.push(table);
    }

    if tables.is_empty() {
      failed_years.sort_by_key(|f| f.year);
      return Err(Error::AllYearsFailed(failed_years));
    }

    let artifact = package(&tables, &names, request.format)?;
    let persisted = match tables.len() {
      1 => None,
      _ => self.persist(&artifact),
    };
    failed_years.sort_by_key(|f| f.year);

    info!(
      file = %artifact.file_name,
      years = tables.len(),
      failed = failed_years.len(),
      "download assembled"
    );
    Ok(DownloadOutcome { artifact, reports, failed_years, persisted })
  }

  // ── Persistence ───────────────────────────────────────────────────────────

  fn persist_csv(&self, file_name: &str, table: &RenderedTable) -> Option<PathBuf> {
    if self.downloads_dir.is_none() {
      return None;
    }
    match table.to_csv() {
      Ok(bytes) => self.persist(&TabularArtifact::csv(file_name.to_owned(), bytes)),
      Err(e) => {
        warn!(file = file_name, error = %e, "could not encode CSV for saving");
        None
      }
    }
  }

  /// Write `artifact` to the downloads directory. Failures are logged only.
  fn persist(&self, artifact: &TabularArtifact) -> Option<PathBuf> {
    let dir: &Path = self.downloads_dir.as_deref()?;
    match artifact.persist(dir) {
      Ok(path) => {
        debug!(path = %path.display(), "artifact saved");
        Some(path)
      }
      Err(e) => {
        warn!(file = %artifact.file_name, error = %e, "could not save artifact");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    io::Cursor,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use acs_core::{
    derive::Operator,
    geography::GeographyScope,
    row::CellValue,
    source::GroupSummary,
    variable::{VariableDefinition, table_id},
  };
  use acs_store_sqlite::SqliteStore;
  use acs_table::MediaType;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("{0}")]
  struct FakeError(String);

  /// Serves fixed catalogs; every data cell is `100` for `_001E` ids and
  /// `40` otherwise.
  #[derive(Default)]
  struct FakeSource {
    catalogs:       HashMap<u16, VariableCatalog>,
    metadata_calls: AtomicUsize,
  }

  impl FakeSource {
    fn with_years(years: &[(u16, &[&str])]) -> Self {
      let catalogs = years
        .iter()
        .map(|&(year, ids)| (year, catalog(year, ids)))
        .collect();
      Self { catalogs, ..Self::default() }
    }
  }

  impl DataSource for FakeSource {
    type Error = FakeError;

    async fn variables(&self, year: u16) -> Result<VariableCatalog, FakeError> {
      self.metadata_calls.fetch_add(1, Ordering::SeqCst);
      self
        .catalogs
        .get(&year)
        .cloned()
        .ok_or_else(|| FakeError(format!("metadata unavailable for {year}")))
    }

    async fn group(&self, year: u16, _table: &str) -> Result<VariableCatalog, FakeError> {
      self.variables(year).await
    }

    async fn groups(&self, _year: u16) -> Result<Vec<GroupSummary>, FakeError> {
      Ok(Vec::new())
    }

    async fn rows(
      &self,
      _year: u16,
      fields: &[String],
      scope: &GeographyScope,
    ) -> Result<Vec<Vec<CellValue>>, FakeError> {
      let mut header: Vec<CellValue> =
        fields.iter().map(|f| CellValue::from(f.as_str())).collect();
      header.extend([CellValue::from("state"), CellValue::from("county")]);

      let mut row: Vec<CellValue> = fields
        .iter()
        .map(|f| match f.as_str() {
          "NAME" => CellValue::from("Chatham County, Georgia"),
          id if id.ends_with("_001E") => CellValue::from("100"),
          _ => CellValue::from("40"),
        })
        .collect();
      row.extend([
        CellValue::from(scope.state_fips.as_str()),
        CellValue::from(scope.county.fips.as_str()),
      ]);
      Ok(vec![header, row])
    }
  }

  fn def(id: &str, year: u16) -> VariableDefinition {
    VariableDefinition {
      id:             id.into(),
      label:          "Estimate!!Total:".into(),
      concept:        "SEX BY AGE".into(),
      group:          table_id(id).into(),
      year,
      predicate_type: "int".into(),
      limit:          "0".into(),
      attributes:     serde_json::Value::Null,
      values:         serde_json::Value::Null,
    }
  }

  fn catalog(year: u16, ids: &[&str]) -> VariableCatalog {
    VariableCatalog::from_definitions(year, ids.iter().map(|id| def(id, year)))
  }

  const SEX_BY_AGE: &[&str] = &["B01001_001E", "B01001_002E", "B01001_002M"];
  const INCOME: &[&str] = &["B19013_001E"];

  async fn pipeline(source: FakeSource) -> Pipeline<FakeSource, SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Pipeline::new(
      source,
      store,
      CountyRegistry::coastal_georgia(),
      BatchConfig::new(45, Duration::ZERO),
    )
  }

  fn request(years: &[u16]) -> DownloadRequest {
    DownloadRequest {
      tables: vec!["B01001_*".into()],
      years: years.to_vec(),
      ..DownloadRequest::default()
    }
  }

  #[tokio::test]
  async fn empty_year_is_reported_while_other_year_succeeds() {
    let source = FakeSource::with_years(&[(2015, INCOME), (2023, SEX_BY_AGE)]);
    let p = pipeline(source).await;

    let outcome = p.download(&request(&[2023, 2015])).await.unwrap();
    assert_eq!(outcome.artifact.file_name, "chatham_acs_county_2023.csv");
    assert_eq!(outcome.artifact.media_type, MediaType::Csv);
    assert_eq!(outcome.failed_years.len(), 1);
    assert_eq!(outcome.failed_years[0].year, 2015);
    assert!(outcome.failed_years[0].reason.contains("2015"));
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].variables, 2);
    assert_eq!(outcome.reports[0].rows, 1);
  }

  #[tokio::test]
  async fn every_year_failing_is_one_error_listing_years() {
    let source = FakeSource::with_years(&[(2015, INCOME)]);
    let p = pipeline(source).await;

    let err = p.download(&request(&[2016, 2015])).await.unwrap_err();
    let Error::AllYearsFailed(failed) = &err else { panic!("unexpected error: {err}") };
    let years: Vec<_> = failed.iter().map(|f| f.year).collect();
    assert_eq!(years, [2015, 2016]);
    assert!(err.to_string().contains("metadata unavailable for 2016"));
  }

  #[tokio::test]
  async fn combined_years_carry_derived_column() {
    let source = FakeSource::with_years(&[(2022, SEX_BY_AGE), (2023, SEX_BY_AGE)]);
    let p = pipeline(source).await;

    let req = DownloadRequest {
      format: PackageFormat::Combined,
      derived: vec![DerivedColumnSpec::new(
        "share",
        "B01001_002E",
        Operator::Divide,
        "B01001_001E",
      )],
      ..request(&[2022, 2023])
    };
    let outcome = p.download(&req).await.unwrap();
    assert_eq!(
      outcome.artifact.file_name,
      "chatham_acs_county_2022-2023_combined.csv"
    );

    let text = String::from_utf8(outcome.artifact.bytes).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
      lines[0],
      "year,state,county,NAME,Estimate → Total (B01001_001E),\
       Estimate → Total (B01001_002E),share"
    );
    assert_eq!(lines[1], "2022,13,051,\"Chatham County, Georgia\",100,40,0.4");
    assert!(lines[2].starts_with("2023,"));
    assert_eq!(outcome.reports[0].derived.applied, ["share"]);
  }

  #[tokio::test]
  async fn catalog_comes_from_store_then_cache() {
    let source = FakeSource::default();
    let p = pipeline(source).await;
    p.store().upsert_year(catalog(2023, SEX_BY_AGE)).await.unwrap();

    let first = p.resolve(&["B01001".to_owned()], 2023, true).await.unwrap();
    let second = p.resolve(&["B01001_002".to_owned()], 2023, true).await.unwrap();
    assert_eq!(first, ["B01001_001E"]);
    assert_eq!(second, ["B01001_002E", "B01001_002M"]);
    assert_eq!(p.source().metadata_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn remote_catalog_is_fetched_once_per_invocation() {
    let source = FakeSource::with_years(&[(2023, SEX_BY_AGE)]);
    let p = pipeline(source).await;

    p.download(&request(&[2023])).await.unwrap();
    p.resolve(&["B01001".to_owned()], 2023, false).await.unwrap();
    assert_eq!(p.source().metadata_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn refresh_stores_year() {
    let source = FakeSource::with_years(&[(2021, SEX_BY_AGE)]);
    let p = pipeline(source).await;

    assert_eq!(p.refresh(2021).await.unwrap(), 3);
    let stored = p.store().load_catalog(2021).await.unwrap().unwrap();
    assert!(stored.contains("B01001_002M"));
    assert!(p.refresh(1999).await.is_err());
  }

  #[tokio::test]
  async fn files_are_saved_under_downloads_dir() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::with_years(&[(2022, SEX_BY_AGE), (2023, SEX_BY_AGE)]);
    let p = pipeline(source).await.with_downloads_dir(dir.path());

    let outcome = p.download(&request(&[2022, 2023])).await.unwrap();
    assert_eq!(outcome.artifact.media_type, MediaType::Zip);
    for name in [
      "chatham_acs_county_2022.csv",
      "chatham_acs_county_2023.csv",
      "chatham_acs_county_2022-2023.zip",
    ] {
      assert!(dir.path().join(name).is_file(), "{name}");
    }
    assert_eq!(
      outcome.persisted.as_deref(),
      Some(dir.path().join("chatham_acs_county_2022-2023.zip").as_path())
    );

    let archive = zip::ZipArchive::new(Cursor::new(outcome.artifact.bytes)).unwrap();
    assert_eq!(archive.len(), 2);
  }

  #[tokio::test]
  async fn unwritable_downloads_dir_does_not_fail_download() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"").unwrap();
    let source = FakeSource::with_years(&[(2023, SEX_BY_AGE)]);
    let p = pipeline(source).await.with_downloads_dir(blocker.join("sub"));

    let outcome = p.download(&request(&[2023])).await.unwrap();
    assert!(outcome.reports[0].persisted.is_none());
    assert!(!outcome.artifact.bytes.is_empty());
  }

  #[tokio::test]
  async fn unknown_county_is_rejected_up_front() {
    let p = pipeline(FakeSource::with_years(&[(2023, SEX_BY_AGE)])).await;
    let req = DownloadRequest { county: Some("Fulton".into()), ..request(&[2023]) };
    assert!(matches!(
      p.download(&req).await,
      Err(Error::Core(acs_core::Error::UnknownCounty(_)))
    ));
  }
}
