//! Tabular codec for merged survey rows.
//!
//! Orders and labels columns, encodes CSV, combines years, and packages the
//! result as a single downloadable artifact. Pure synchronous; no HTTP or
//! database dependencies.

mod archive;
mod artifact;
mod combine;
mod label;
mod naming;
mod render;

pub mod error;

pub use archive::zip_entries;
pub use artifact::{MediaType, PackageFormat, TabularArtifact, package};
pub use combine::{CombinedTable, YEAR_COLUMN};
pub use error::{Error, Result};
pub use label::{LABEL_SEPARATOR, column_label, normalize_label, order_columns};
pub use naming::FileNames;
pub use render::RenderedTable;
