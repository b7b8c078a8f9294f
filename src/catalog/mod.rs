pub mod load;

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::features::{Feature, FeatureVector};
use crate::normalize::NormalizeError;

/// Why a catalog was refused. Fatal at startup: no requests are served.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Invalid value {value:?} in column {column} at line {line}")]
    InvalidValue {
        line: u64,
        column: String,
        value: String,
    },
    #[error("Non-finite {column} for song {name:?}")]
    NonFinite { name: String, column: &'static str },
    #[error("Catalog is empty")]
    Empty,
    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Song {
    pub name: String,
    pub artists: Vec<String>,
    pub year: i32,
    pub release_date: NaiveDate,
    pub features: FeatureVector,
}

impl Song {
    pub fn feature(&self, feature: Feature) -> f64 {
        self.features[feature.index()]
    }

    /// Decade of the release date: 1977 → 1970.
    pub fn release_decade(&self) -> i32 {
        self.release_date.year().div_euclid(10) * 10
    }

    /// Artists joined for display: "A, B".
    pub fn artists_display(&self) -> String {
        self.artists.join(", ")
    }
}

/// Lookup key for song names. Matching is case-insensitive everywhere.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Immutable in-memory song table, loaded once.
#[derive(Debug)]
pub struct Catalog {
    songs: Vec<Song>,
    /// Lowercased name → first row carrying that name
    name_index: HashMap<String, usize>,
}

impl Catalog {
    /// Validate rows and build the name index.
    pub fn from_songs(songs: Vec<Song>) -> Result<Self> {
        if songs.is_empty() {
            return Err(CatalogError::Empty);
        }

        for song in &songs {
            if let Some(f) = Feature::ALL.iter().find(|f| !song.feature(**f).is_finite()) {
                return Err(CatalogError::NonFinite {
                    name: song.name.clone(),
                    column: f.column(),
                });
            }
        }

        let mut name_index = HashMap::with_capacity(songs.len());
        for (i, song) in songs.iter().enumerate() {
            name_index.entry(name_key(&song.name)).or_insert(i);
        }

        log::debug!(
            "Catalog built: {} rows, {} distinct names",
            songs.len(),
            name_index.len()
        );

        Ok(Self { songs, name_index })
    }

    /// Case-insensitive exact match. Duplicate names resolve to the first row.
    pub fn lookup(&self, name: &str) -> Option<&Song> {
        self.lookup_index(name).map(|i| &self.songs[i])
    }

    pub fn lookup_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(&name_key(name)).copied()
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn distinct_names(&self) -> usize {
        self.name_index.len()
    }

    pub fn feature_rows(&self) -> Vec<FeatureVector> {
        self.songs.iter().map(|s| s.features).collect()
    }
}
