//! Survey-year selection syntax.
//!
//! `"2018-2023,2015"` expands to `[2015, 2018, 2019, 2020, 2021, 2022, 2023]`.

use std::{collections::BTreeSet, ops::RangeInclusive};

/// Years the 5-year product can plausibly be requested for.
pub const SUPPORTED_YEARS: RangeInclusive<u16> = 2010..=2099;

/// Most recent year with a published 5-year release.
pub const DEFAULT_YEAR: u16 = 2023;

/// Parse a comma-separated list of years and inclusive `A-B` ranges.
///
/// Reversed ranges are swapped, duplicates collapse, unparseable parts and
/// years outside [`SUPPORTED_YEARS`] are dropped. An input that yields no year
/// falls back to `default`.
pub fn parse_years(input: &str, default: u16) -> Vec<u16> {
  let mut years = BTreeSet::new();

  for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
    match part.split_once('-') {
      Some((start, end)) => {
        let (Ok(start), Ok(end)) =
          (start.trim().parse::<u16>(), end.trim().parse::<u16>())
        else {
          continue;
        };
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        years.extend((lo..=hi).filter(|y| SUPPORTED_YEARS.contains(y)));
      }
      None => {
        if let Ok(year) = part.parse::<u16>()
          && SUPPORTED_YEARS.contains(&year)
        {
          years.insert(year);
        }
      }
    }
  }

  if years.is_empty() {
    return vec![default];
  }
  years.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ranges_and_singles_merge_sorted() {
    assert_eq!(
      parse_years("2018-2023,2015", DEFAULT_YEAR),
      [2015, 2018, 2019, 2020, 2021, 2022, 2023]
    );
  }

  #[test]
  fn reversed_range_is_swapped_and_duplicates_collapse() {
    assert_eq!(parse_years("2022-2020, 2021", DEFAULT_YEAR), [2020, 2021, 2022]);
  }

  #[test]
  fn out_of_range_and_garbage_fall_back_to_default() {
    assert_eq!(parse_years("", 2021), [2021]);
    assert_eq!(parse_years("1999, abc, 2200", 2021), [2021]);
    assert_eq!(parse_years("2008-2011", 2021), [2010, 2011]);
  }
}
