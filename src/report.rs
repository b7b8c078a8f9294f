//! Catalog summaries for the CLI: most popular songs, songs per decade and
//! overall statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{Catalog, Song};
use crate::features::Feature;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub songs: usize,
    pub distinct_names: usize,
    pub first_year: i32,
    pub last_year: i32,
    pub explicit: usize,
}

/// The `n` most popular songs. Equal popularity keeps catalog order.
pub fn top_by_popularity(catalog: &Catalog, n: usize) -> Vec<&Song> {
    let mut songs: Vec<&Song> = catalog.songs().iter().collect();
    songs.sort_by(|a, b| {
        b.feature(Feature::Popularity)
            .total_cmp(&a.feature(Feature::Popularity))
    });
    songs.truncate(n);
    songs
}

/// Song count per release decade, oldest first.
pub fn decade_counts(catalog: &Catalog) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for song in catalog.songs() {
        *counts.entry(song.release_decade()).or_insert(0) += 1;
    }
    counts
}

/// (earliest, latest) `year` in the catalog.
pub fn year_range(catalog: &Catalog) -> (i32, i32) {
    catalog
        .songs()
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), s| (lo.min(s.year), hi.max(s.year)))
}

pub fn stats(catalog: &Catalog) -> CatalogStats {
    let (first_year, last_year) = year_range(catalog);
    let explicit = catalog
        .songs()
        .iter()
        .filter(|s| s.feature(Feature::Explicit) > 0.5)
        .count();

    CatalogStats {
        songs: catalog.len(),
        distinct_names: catalog.distinct_names(),
        first_year,
        last_year,
        explicit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_song;
    use chrono::NaiveDate;

    fn song(name: &str, year: i32, popularity: f64, explicit: bool) -> Song {
        let mut s = make_song(name, "X", 0.5);
        s.year = year;
        s.release_date = NaiveDate::from_ymd_opt(year, 6, 1).unwrap();
        s.features[Feature::Year.index()] = f64::from(year);
        s.features[Feature::Popularity.index()] = popularity;
        s.features[Feature::Explicit.index()] = if explicit { 1.0 } else { 0.0 };
        s
    }

    fn catalog() -> Catalog {
        Catalog::from_songs(vec![
            song("Old", 1921, 5.0, false),
            song("Hit", 1985, 80.0, false),
            song("Banger", 2019, 95.0, true),
            song("Also 80", 1989, 80.0, false),
            song("Filler", 1980, 10.0, true),
            song("Old", 1930, 3.0, false),
        ])
        .unwrap()
    }

    #[test]
    fn test_top_by_popularity() {
        let c = catalog();
        let top: Vec<&str> = top_by_popularity(&c, 3).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(top, vec!["Banger", "Hit", "Also 80"]);
        assert_eq!(top_by_popularity(&c, 100).len(), 6);
        assert!(top_by_popularity(&c, 0).is_empty());
    }

    #[test]
    fn test_decade_counts() {
        let counts = decade_counts(&catalog());
        let expected: Vec<(i32, usize)> = vec![(1920, 1), (1930, 1), (1980, 3), (2010, 1)];
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_stats() {
        let s = stats(&catalog());
        assert_eq!(
            s,
            CatalogStats {
                songs: 6,
                distinct_names: 5,
                first_year: 1921,
                last_year: 2019,
                explicit: 2,
            }
        );
    }
}
