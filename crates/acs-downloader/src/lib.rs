//! Download pipeline and runtime configuration for the ACS table downloader.
//!
//! [`Pipeline`] ties a [`DataSource`](acs_core::source::DataSource), a
//! [`CatalogStore`](acs_core::store::CatalogStore) and the county registry
//! together and turns a [`DownloadRequest`] into one downloadable artifact.
//! The `acs` binary is a thin clap front-end over it.

pub mod error;
pub mod pipeline;
pub mod settings;

pub use error::{Error, FailedYear, Result};
pub use pipeline::{DownloadOutcome, DownloadRequest, Pipeline, YearReport};
pub use settings::AppConfig;
