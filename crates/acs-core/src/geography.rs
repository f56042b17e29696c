//! Geography levels, the fixed county registry, and request scopes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Field carrying the human-readable name of a geography row.
pub const NAME_FIELD: &str = "NAME";

// ─── Levels ──────────────────────────────────────────────────────────────────

/// A geography level that can appear as a column in a data response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeoLevel {
  State,
  County,
  Tract,
  BlockGroup,
}

impl GeoLevel {
  /// Canonical column order.
  pub const ALL: [GeoLevel; 4] =
    [GeoLevel::State, GeoLevel::County, GeoLevel::Tract, GeoLevel::BlockGroup];

  /// Column name used by the API.
  pub fn api_name(self) -> &'static str {
    match self {
      Self::State => "state",
      Self::County => "county",
      Self::Tract => "tract",
      Self::BlockGroup => "block group",
    }
  }

  pub fn from_api_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|l| l.api_name() == name)
  }
}

/// The geography levels present in `headers`, in canonical order.
pub fn present_levels<S: AsRef<str>>(headers: &[S]) -> Vec<GeoLevel> {
  GeoLevel::ALL
    .into_iter()
    .filter(|l| headers.iter().any(|h| h.as_ref() == l.api_name()))
    .collect()
}

pub fn is_geography_field(field: &str) -> bool {
  GeoLevel::from_api_name(field).is_some()
}

// ─── Granularity ─────────────────────────────────────────────────────────────

/// The level at which rows are requested.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
  #[default]
  County,
  Tract,
  BlockGroup,
}

impl Granularity {
  pub fn level(self) -> GeoLevel {
    match self {
      Self::County => GeoLevel::County,
      Self::Tract => GeoLevel::Tract,
      Self::BlockGroup => GeoLevel::BlockGroup,
    }
  }

  /// Filename-safe form, e.g. `block_group`.
  pub fn slug(self) -> String { self.level().api_name().replace(' ', "_") }
}

impl fmt::Display for Granularity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.level().api_name())
  }
}

impl FromStr for Granularity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
      "county" => Ok(Self::County),
      "tract" => Ok(Self::Tract),
      "block group" | "blockgroup" => Ok(Self::BlockGroup),
      _ => Err(Error::UnknownGranularity(s.to_owned())),
    }
  }
}

// ─── Counties ────────────────────────────────────────────────────────────────

/// A named county inside the registry's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
  pub name: String,
  /// Three-digit county FIPS code.
  pub fips: String,
}

impl County {
  pub fn new(name: impl Into<String>, fips: impl Into<String>) -> Self {
    Self { name: name.into(), fips: fips.into() }
  }

  /// Lowercase, space-free form used in artifact filenames.
  pub fn slug(&self) -> String {
    self.name.trim().to_lowercase().replace(' ', "_")
  }
}

/// The fixed set of sub-regions the downloader serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyRegistry {
  state_fips: String,
  counties:   Vec<County>,
  default:    usize,
}

impl CountyRegistry {
  /// Build a registry; `default_county` must name one of `counties`.
  pub fn new(
    state_fips: impl Into<String>,
    counties: Vec<County>,
    default_county: &str,
  ) -> Result<Self> {
    let default = counties
      .iter()
      .position(|c| c.name.eq_ignore_ascii_case(default_county))
      .ok_or_else(|| Error::UnknownCounty(default_county.to_owned()))?;
    Ok(Self { state_fips: state_fips.into(), counties, default })
  }

  /// Coastal Georgia: Chatham (default), Liberty, Bryan, Effingham.
  pub fn coastal_georgia() -> Self {
    Self {
      state_fips: "13".into(),
      counties:   vec![
        County::new("Chatham", "051"),
        County::new("Liberty", "179"),
        County::new("Bryan", "029"),
        County::new("Effingham", "103"),
      ],
      default:    0,
    }
  }

  pub fn state_fips(&self) -> &str { &self.state_fips }

  pub fn counties(&self) -> &[County] { &self.counties }

  pub fn default_county(&self) -> &County { &self.counties[self.default] }

  /// Case-insensitive lookup by name.
  pub fn lookup(&self, name: &str) -> Result<&County> {
    let name = name.trim();
    self
      .counties
      .iter()
      .find(|c| c.name.eq_ignore_ascii_case(name))
      .ok_or_else(|| Error::UnknownCounty(name.to_owned()))
  }

  /// Scope for `county` (or the default county) at `granularity`.
  pub fn scope(
    &self,
    county: Option<&str>,
    granularity: Granularity,
  ) -> Result<GeographyScope> {
    let county = match county {
      Some(name) => self.lookup(name)?,
      None => self.default_county(),
    };
    Ok(GeographyScope {
      state_fips: self.state_fips.clone(),
      county: county.clone(),
      granularity,
    })
  }
}

impl Default for CountyRegistry {
  fn default() -> Self { Self::coastal_georgia() }
}

// ─── Scope ───────────────────────────────────────────────────────────────────

/// Where and at what granularity rows are requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeographyScope {
  pub state_fips:  String,
  pub county:      County,
  pub granularity: Granularity,
}

impl GeographyScope {
  /// Value of the API `for` parameter.
  pub fn for_clause(&self) -> String {
    match self.granularity {
      Granularity::County => format!("county:{}", self.county.fips),
      Granularity::Tract => "tract:*".to_owned(),
      Granularity::BlockGroup => "block group:*".to_owned(),
    }
  }

  /// Value of the API `in` parameter.
  pub fn in_clause(&self) -> String {
    match self.granularity {
      Granularity::County => format!("state:{}", self.state_fips),
      Granularity::Tract => {
        format!("state:{} county:{}", self.state_fips, self.county.fips)
      }
      Granularity::BlockGroup => format!(
        "state:{} county:{} tract:*",
        self.state_fips, self.county.fips
      ),
    }
  }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// Values of the geography levels present in a response, in canonical order.
/// Two rows with equal keys describe the same statistical unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeographyKey(pub Vec<String>);

impl fmt::Display for GeographyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({})", self.0.join(","))
  }
}
