//! `acs`: download Census ACS 5-year tables for a fixed set of counties.
//!
//! # Usage
//!
//! ```text
//! acs download --tables "B01001 B19013" --years 2019-2023 --format combined
//! acs download --tables B01001_* --geo tract --derive "pct_male=B01001_002E/B01001_001E"
//! acs refresh --years 2023
//! acs search "median household income"
//! ```
//!
//! Configuration is read from `acs.toml` (or `--config FILE`) and `ACS_*`
//! environment variables.

use std::{path::PathBuf, sync::Arc};

use acs_client::CensusClient;
use acs_core::{
  derive::DerivedColumnSpec,
  geography::Granularity,
  resolve::split_tokens,
  source::DataSource,
  store::{CatalogStore, SearchQuery},
  years::parse_years,
};
use acs_downloader::{AppConfig, DownloadRequest, Pipeline};
use acs_store_sqlite::SqliteStore;
use acs_table::{PackageFormat, normalize_label};
use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

type AppPipeline = Pipeline<CensusClient, SqliteStore>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "acs", author, version, about = "ACS 5-year table downloader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "acs.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Download tables for one county and one or more years.
  Download(DownloadArgs),

  /// Search the stored variable catalog.
  Search {
    /// Free text, matched against label, id, concept and table.
    #[arg(required = true)]
    query: Vec<String>,
    #[arg(short, long, default_value_t = acs_core::store::DEFAULT_SEARCH_LIMIT)]
    limit: usize,
    #[arg(short, long)]
    year:  Option<u16>,
  },

  /// Fetch variable metadata for the given years and store it.
  Refresh {
    /// Years, e.g. `2023` or `2018-2023,2015`.
    #[arg(short, long)]
    years: String,
  },

  /// Show one stored variable.
  Variable {
    id:   String,
    #[arg(short, long)]
    year: Option<u16>,
  },

  /// List the variables of one table.
  Group {
    table:  String,
    #[arg(short, long)]
    year:   Option<u16>,
    /// Ask the API instead of the stored catalog.
    #[arg(long)]
    remote: bool,
  },

  /// List the tables the API publishes for a year.
  Tables {
    /// Only tables whose id or description contains this text.
    filter: Option<String>,
    #[arg(short, long)]
    year:   Option<u16>,
  },

  /// Summarize the stored catalog.
  Stats,

  /// Show which variables a set of tokens resolves to.
  Resolve {
    #[arg(short, long)]
    tables: String,
    #[arg(short, long)]
    year:   Option<u16>,
    #[arg(long)]
    moe:    bool,
  },
}

#[derive(Args)]
struct DownloadArgs {
  /// Table or variable tokens: `B01001`, `B01001_002`, `B01001_*`.
  #[arg(short, long)]
  tables: String,

  /// Years, e.g. `2023` or `2018-2023,2015`. Defaults to the configured year.
  #[arg(short, long)]
  years: Option<String>,

  /// County name; defaults to the configured county.
  #[arg(long)]
  county: Option<String>,

  /// `county`, `tract` or `block-group`.
  #[arg(long, default_value = "county")]
  geo: Granularity,

  /// Include margin-of-error columns.
  #[arg(long)]
  moe: bool,

  /// `zip` (one CSV per year) or `combined` (one CSV with a year column).
  #[arg(long, default_value = "zip")]
  format: PackageFormat,

  /// Calculated column, `NAME=LEFT/RIGHT` (also `*`, `+`, `-`). Repeatable.
  #[arg(long = "derive", value_name = "SPEC")]
  derived: Vec<DerivedColumnSpec>,

  /// API key, used before any configured keys. Repeatable.
  #[arg(long = "api-key", value_name = "KEY")]
  api_keys: Vec<String>,

  /// Directory the final file is written to.
  #[arg(short, long, default_value = ".")]
  out: PathBuf,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = AppConfig::load(&cli.config)
    .with_context(|| format!("failed to read config {}", cli.config.display()))?;

  let extra_keys = match &cli.command {
    Command::Download(args) => args.api_keys.clone(),
    _ => Vec::new(),
  };
  let pipeline = build_pipeline(&cfg, &extra_keys).await?;

  match cli.command {
    Command::Download(args) => download(&pipeline, &cfg, args).await,
    Command::Search { query, limit, year } => {
      search(&pipeline, SearchQuery { text: query.join(" "), year, limit: Some(limit) }).await
    }
    Command::Refresh { years } => refresh(&pipeline, &cfg, &years).await,
    Command::Variable { id, year } => variable(&pipeline, &id, year).await,
    Command::Group { table, year, remote } => {
      group(&pipeline, &table, year.unwrap_or(cfg.default_year), remote).await
    }
    Command::Tables { filter, year } => {
      tables(&pipeline, filter.as_deref(), year.unwrap_or(cfg.default_year)).await
    }
    Command::Stats => stats(&pipeline).await,
    Command::Resolve { tables, year, moe } => {
      resolve(&pipeline, &tables, year.unwrap_or(cfg.default_year), moe).await
    }
  }
}

async fn build_pipeline(cfg: &AppConfig, extra_keys: &[String]) -> anyhow::Result<AppPipeline> {
  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open catalog at {store_path:?}"))?;

  let limiter = Arc::new(cfg.rate_limiter(extra_keys));
  let client =
    CensusClient::new(cfg.client_config(), limiter).context("failed to build HTTP client")?;
  let registry = cfg.registry().context("invalid county configuration")?;

  Ok(
    Pipeline::new(client, store, registry, cfg.batch_config())
      .with_downloads_dir(cfg.downloads_dir()),
  )
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn download(
  pipeline: &AppPipeline,
  cfg: &AppConfig,
  args: DownloadArgs,
) -> anyhow::Result<()> {
  let years = parse_years(args.years.as_deref().unwrap_or_default(), cfg.default_year);
  let request = DownloadRequest {
    tables: split_tokens(&args.tables),
    years,
    county: args.county,
    granularity: args.geo,
    include_moe: args.moe,
    format: args.format,
    derived: args.derived,
  };
  if request.tables.is_empty() {
    bail!("no table tokens given");
  }

  let outcome = pipeline.download(&request).await?;

  for report in &outcome.reports {
    info!(
      year = report.year,
      variables = report.variables,
      rows = report.rows,
      failed_batches = report.failed_batches.len(),
      missing_variables = report.missing_variables,
      "year assembled"
    );
    for skipped in &report.derived.skipped {
      warn!(year = report.year, column = %skipped.name, missing = ?skipped.missing, "derived column skipped");
    }
  }
  for failed in &outcome.failed_years {
    warn!(year = failed.year, reason = %failed.reason, "year failed");
  }

  let path = outcome
    .artifact
    .persist(&args.out)
    .with_context(|| format!("failed to write {}", outcome.artifact.file_name))?;
  println!("{} ({})", path.display(), outcome.artifact.media_type);
  Ok(())
}

async fn search(pipeline: &AppPipeline, query: SearchQuery) -> anyhow::Result<()> {
  let hits = pipeline.store().search(&query).await?;
  if hits.is_empty() {
    println!("no matches for {:?}", query.text);
  }
  for hit in hits {
    println!(
      "{:<14} {}  {}  [{}]",
      hit.id,
      hit.year,
      normalize_label(&hit.label),
      hit.concept
    );
  }
  Ok(())
}

async fn refresh(pipeline: &AppPipeline, cfg: &AppConfig, years: &str) -> anyhow::Result<()> {
  let mut failed = Vec::new();
  for year in parse_years(years, cfg.default_year) {
    match pipeline.refresh(year).await {
      Ok(count) => println!("{year}: {count} variables"),
      Err(e) => {
        warn!(year, error = %e, "refresh failed");
        failed.push(year);
      }
    }
  }
  if !failed.is_empty() {
    bail!("refresh failed for {failed:?}");
  }
  Ok(())
}

async fn variable(pipeline: &AppPipeline, id: &str, year: Option<u16>) -> anyhow::Result<()> {
  let Some(def) = pipeline.store().get_variable(id, year).await? else {
    bail!("variable {id} is not in the stored catalog");
  };
  println!("{}", serde_json::to_string_pretty(&def)?);
  Ok(())
}

async fn group(
  pipeline: &AppPipeline,
  table: &str,
  year: u16,
  remote: bool,
) -> anyhow::Result<()> {
  let rows: Vec<(String, String)> = if remote {
    let catalog = pipeline.source().group(year, table).await?;
    catalog.iter().map(|d| (d.id.clone(), d.label.clone())).collect()
  } else {
    let vars = pipeline.store().variables_by_group(table, year).await?;
    vars.into_iter().map(|v| (v.id, v.label)).collect()
  };

  if rows.is_empty() {
    bail!("no variables for table {table} in {year}");
  }
  for (id, label) in rows {
    println!("{id:<14} {}", normalize_label(&label));
  }
  Ok(())
}

async fn tables(pipeline: &AppPipeline, filter: Option<&str>, year: u16) -> anyhow::Result<()> {
  let needle = filter.map(str::to_lowercase);
  let groups = pipeline.source().groups(year).await?;
  for g in groups.iter().filter(|g| {
    needle.as_deref().is_none_or(|n| {
      g.name.to_lowercase().contains(n) || g.description.to_lowercase().contains(n)
    })
  }) {
    println!("{:<10} {}", g.name, g.description);
  }
  Ok(())
}

async fn stats(pipeline: &AppPipeline) -> anyhow::Result<()> {
  let stats = pipeline.store().stats().await?;
  println!("total variables: {}", stats.total);
  for (year, count) in &stats.by_year {
    println!("  {year}: {count}");
  }
  println!("largest tables:");
  for (group, count) in &stats.top_groups {
    println!("  {group:<10} {count}");
  }
  if let Some(last) = stats.refreshes.first() {
    println!(
      "last refresh: {} ({} variables, {})",
      last.year, last.variable_count, last.refreshed_at
    );
  }
  Ok(())
}

async fn resolve(
  pipeline: &AppPipeline,
  tables: &str,
  year: u16,
  moe: bool,
) -> anyhow::Result<()> {
  let ids = pipeline.resolve(&split_tokens(tables), year, moe).await?;
  let catalog = pipeline.catalog(year).await?;
  for id in ids {
    println!("{id:<14} {}", catalog.label(&id).map(normalize_label).unwrap_or_default());
  }
  Ok(())
}
