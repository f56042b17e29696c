//! Artifact file names.
//!
//! `{county}_acs_{granularity}_{year}.csv` for one year,
//! `{county}_acs_{granularity}_{first}-{last}.zip` for separate files and
//! `{county}_acs_{granularity}_{first}-{last}_combined.csv` for one table.

use acs_core::geography::GeographyScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNames {
  stem: String,
}

impl FileNames {
  pub fn new(county_slug: &str, granularity_slug: &str) -> Self {
    Self { stem: format!("{county_slug}_acs_{granularity_slug}") }
  }

  pub fn for_scope(scope: &GeographyScope) -> Self {
    Self::new(&scope.county.slug(), &scope.granularity.slug())
  }

  pub fn year_csv(&self, year: u16) -> String { format!("{}_{year}.csv", self.stem) }

  pub fn archive(&self, first: u16, last: u16) -> String {
    format!("{}_{first}-{last}.zip", self.stem)
  }

  pub fn combined(&self, first: u16, last: u16) -> String {
    format!("{}_{first}-{last}_combined.csv", self.stem)
  }
}

#[cfg(test)]
mod tests {
  use acs_core::geography::{County, CountyRegistry, Granularity};

  use super::*;

  #[test]
  fn names_encode_scope_and_years() {
    let registry = CountyRegistry::coastal_georgia();
    let scope = registry.scope(Some("Effingham"), Granularity::BlockGroup).unwrap();
    let names = FileNames::for_scope(&scope);
    assert_eq!(names.year_csv(2023), "effingham_acs_block_group_2023.csv");
    assert_eq!(names.archive(2019, 2023), "effingham_acs_block_group_2019-2023.zip");
    assert_eq!(
      names.combined(2019, 2023),
      "effingham_acs_block_group_2019-2023_combined.csv"
    );
  }

  #[test]
  fn county_slug_is_lowercase_and_underscored() {
    assert_eq!(County::new("St Marys", "999").slug(), "st_marys");
  }
}
