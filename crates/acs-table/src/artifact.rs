//! The final downloadable file and how per-year tables are packaged into it.

use std::{fmt, fs, path::{Path, PathBuf}, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result, archive::zip_entries, combine::CombinedTable, naming::FileNames,
  render::RenderedTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaType {
  Csv,
  Zip,
}

impl MediaType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Csv => "text/csv",
      Self::Zip => "application/zip",
    }
  }
}

impl fmt::Display for MediaType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How several years are delivered. A single year is always one CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
  /// One CSV per year inside a ZIP archive.
  #[default]
  Zip,
  /// One CSV with a leading year column.
  Combined,
}

impl FromStr for PackageFormat {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "zip" => Ok(Self::Zip),
      "combined" => Ok(Self::Combined),
      _ => Err(Error::UnknownFormat(s.to_owned())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularArtifact {
  pub file_name:  String,
  pub media_type: MediaType,
  pub bytes:      Vec<u8>,
}

impl TabularArtifact {
  pub fn csv(file_name: String, bytes: Vec<u8>) -> Self {
    Self { file_name, media_type: MediaType::Csv, bytes }
  }

  pub fn zip(file_name: String, bytes: Vec<u8>) -> Self {
    Self { file_name, media_type: MediaType::Zip, bytes }
  }

  /// Write the artifact under `dir`, creating it if needed.
  pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&self.file_name);
    fs::write(&path, &self.bytes)?;
    Ok(path)
  }
}

/// Package rendered years (ascending) into the artifact handed to the caller.
pub fn package(
  tables: &[RenderedTable],
  names: &FileNames,
  format: PackageFormat,
) -> Result<TabularArtifact> {
  let (first, last) = match (tables.first(), tables.last()) {
    (Some(first), Some(last)) => (first.year(), last.year()),
    _ => return Err(Error::NothingToPackage),
  };

  if let [only] = tables {
    return Ok(TabularArtifact::csv(names.year_csv(only.year()), only.to_csv()?));
  }

  match format {
    PackageFormat::Combined => Ok(TabularArtifact::csv(
      names.combined(first, last),
      CombinedTable::new(tables).to_csv()?,
    )),
    PackageFormat::Zip => {
      let files = tables
        .iter()
        .map(|t| -> Result<(String, Vec<u8>)> { Ok((names.year_csv(t.year()), t.to_csv()?)) })
        .collect::<Result<Vec<_>>>()?;
      let bytes = zip_entries(files.iter().map(|(n, b)| (n.as_str(), b.as_slice())))?;
      Ok(TabularArtifact::zip(names.archive(first, last), bytes))
    }
  }
}
