//! Nearest-neighbor retrieval around the centroid of one or more seed songs.

use std::collections::HashSet;
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, Song, name_key};
use crate::features::{FEATURE_DIM, FeatureVector};
use crate::normalize::Normalizer;

/// A seed song and its weight in the query centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub name: String,
    pub weight: f64,
}

impl Seed {
    pub fn new(name: impl Into<String>) -> Self {
        Self::weighted(name, 1.0)
    }

    pub fn weighted(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Why seeds could not be turned into a query vector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeedError {
    #[error("no seed songs given")]
    NoSeeds,
    #[error("not in catalog: {}", names.join(", "))]
    Missing { names: Vec<String> },
    #[error("invalid weight {weight} for {name:?}")]
    InvalidWeight { name: String, weight: f64 },
    #[error("query vector is not finite")]
    NonFiniteQuery,
}

/// One recommended song, closest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub name: String,
    pub artists: Vec<String>,
    pub year: i32,
    /// Euclidean distance in normalized feature space
    pub distance: f64,
}

/// Outcome of a request. Anything but `Ok` comes with an empty song list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendStatus {
    Ok,
    MissingSeed { names: Vec<String> },
    NoSeeds,
    InvalidWeight { name: String, weight: f64 },
    NonFiniteQuery,
}

impl From<SeedError> for RecommendStatus {
    fn from(e: SeedError) -> Self {
        match e {
            SeedError::NoSeeds => Self::NoSeeds,
            SeedError::Missing { names } => Self::MissingSeed { names },
            SeedError::InvalidWeight { name, weight } => Self::InvalidWeight { name, weight },
            SeedError::NonFiniteQuery => Self::NonFiniteQuery,
        }
    }
}

impl fmt::Display for RecommendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::MissingSeed { names } => {
                let quoted: Vec<String> = names.iter().map(|n| format!("\"{}\"", n)).collect();
                write!(f, "not in catalog: {}", quoted.join(", "))
            }
            Self::NoSeeds => write!(f, "no seed songs given"),
            Self::InvalidWeight { name, weight } => {
                write!(f, "weight {} for \"{}\" must be a positive number", weight, name)
            }
            Self::NonFiniteQuery => write!(f, "query vector is not finite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub status: RecommendStatus,
    pub songs: Vec<Recommendation>,
}

impl Recommendations {
    fn ok(songs: Vec<Recommendation>) -> Self {
        Self {
            status: RecommendStatus::Ok,
            songs,
        }
    }

    fn unavailable(status: RecommendStatus) -> Self {
        Self {
            status,
            songs: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RecommendStatus::Ok
    }
}

/// Nearest-neighbor search over a fitted catalog.
///
/// Borrows everything it needs, so each request can take its own copy.
#[derive(Debug, Clone, Copy)]
pub struct Retriever<'a> {
    catalog: &'a Catalog,
    normalizer: &'a Normalizer,
    /// `normalizer.transform` of every catalog row, in catalog order
    normalized: &'a [FeatureVector],
}

impl<'a> Retriever<'a> {
    pub fn new(
        catalog: &'a Catalog,
        normalizer: &'a Normalizer,
        normalized: &'a [FeatureVector],
    ) -> Self {
        debug_assert_eq!(catalog.len(), normalized.len());
        Self {
            catalog,
            normalizer,
            normalized,
        }
    }

    /// Case-insensitive exact name match; first catalog row wins.
    pub fn lookup(&self, name: &str) -> Option<&'a Song> {
        self.catalog.lookup(name)
    }

    /// Equal-weight mean of the seeds' raw feature vectors.
    pub fn mean_vector<S: AsRef<str>>(&self, seed_names: &[S]) -> Result<FeatureVector, SeedError> {
        let seeds: Vec<Seed> = seed_names.iter().map(|s| Seed::new(s.as_ref())).collect();
        self.weighted_centroid(&seeds)
    }

    /// Weighted mean of the seeds' raw feature vectors.
    ///
    /// Every seed must resolve: one unknown name fails the whole query
    /// rather than averaging over the rest.
    pub fn weighted_centroid(&self, seeds: &[Seed]) -> Result<FeatureVector, SeedError> {
        if seeds.is_empty() {
            return Err(SeedError::NoSeeds);
        }

        if let Some(bad) = seeds.iter().find(|s| !(s.weight.is_finite() && s.weight > 0.0)) {
            return Err(SeedError::InvalidWeight {
                name: bad.name.clone(),
                weight: bad.weight,
            });
        }

        let mut found: Vec<(&Song, f64)> = Vec::with_capacity(seeds.len());
        let mut missing = Vec::new();
        for seed in seeds {
            match self.lookup(seed.name.trim()) {
                Some(song) => found.push((song, seed.weight)),
                None => missing.push(seed.name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(SeedError::Missing { names: missing });
        }

        let total: f64 = found.iter().map(|(_, w)| w).sum();
        if !total.is_finite() {
            let (song, weight) = found
                .iter()
                .fold(found[0], |acc, &cur| if cur.1 > acc.1 { cur } else { acc });
            return Err(SeedError::InvalidWeight {
                name: song.name.clone(),
                weight,
            });
        }

        // Scale weights to sum to 1 before multiplying so large weights
        // cannot overflow the products
        let mut centroid = [0.0_f64; FEATURE_DIM];
        for (song, w) in &found {
            let share = w / total;
            for (d, &val) in song.features.iter().enumerate() {
                centroid[d] += val * share;
            }
        }

        if !centroid.iter().all(|v| v.is_finite()) {
            return Err(SeedError::NonFiniteQuery);
        }

        Ok(centroid)
    }

    /// Distance from a raw query vector to every catalog row, in catalog order.
    pub fn distances(&self, query: &FeatureVector) -> Vec<f64> {
        self.scan(&self.normalizer.transform(query))
    }

    fn scan(&self, q: &FeatureVector) -> Vec<f64> {
        self.normalized
            .par_iter()
            .map(|row| euclidean_distance(q, row))
            .collect()
    }

    /// Recommend `k` songs near the equal-weight centroid of `seed_names`.
    pub fn recommend<S: AsRef<str>>(&self, seed_names: &[S], k: usize) -> Recommendations {
        let seeds: Vec<Seed> = seed_names.iter().map(|s| Seed::new(s.as_ref())).collect();
        self.recommend_seeds(&seeds, k)
    }

    /// Recommend `k` songs near the weighted centroid of `seeds`.
    ///
    /// Seeds themselves are excluded by name, and each name appears at most
    /// once (the closest row carrying it). Returns fewer than `k` songs when
    /// the catalog runs out.
    pub fn recommend_seeds(&self, seeds: &[Seed], k: usize) -> Recommendations {
        let query = match self.weighted_centroid(seeds) {
            Ok(q) => q,
            Err(e) => {
                log::warn!("No recommendations: {}", e);
                return Recommendations::unavailable(e.into());
            }
        };

        if k == 0 {
            return Recommendations::ok(Vec::new());
        }

        let q = self.normalizer.transform(&query);
        if !q.iter().all(|v| v.is_finite()) {
            log::warn!("No recommendations: normalized query is not finite");
            return Recommendations::unavailable(RecommendStatus::NonFiniteQuery);
        }
        let distances = self.scan(&q);

        // Stable: equal distances keep catalog order
        let mut order: Vec<usize> = (0..distances.len()).collect();
        order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

        let excluded: HashSet<String> = seeds.iter().map(|s| name_key(s.name.trim())).collect();
        let mut accepted: HashSet<String> = HashSet::new();
        let mut songs = Vec::with_capacity(k.min(order.len()));

        for i in order {
            let song = &self.catalog.songs()[i];
            let key = name_key(&song.name);
            if excluded.contains(&key) || !accepted.insert(key) {
                continue;
            }

            songs.push(Recommendation {
                name: song.name.clone(),
                artists: song.artists.clone(),
                year: song.year,
                distance: distances[i],
            });
            if songs.len() == k {
                break;
            }
        }

        log::debug!(
            "Recommended {} of {} requested for {} seed(s)",
            songs.len(),
            k,
            seeds.len()
        );

        Recommendations::ok(songs)
    }
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
