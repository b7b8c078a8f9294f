//! CSV ingestion for the song catalog.
//!
//! The header must carry `name`, `artists`, `year`, `release_date` and every
//! feature column. Column order is free and extra columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::{Catalog, CatalogError, Result, Song};
use crate::features::{FEATURE_DIM, Feature, FeatureVector};

const NAME_COL: &str = "name";
const ARTISTS_COL: &str = "artists";
const YEAR_COL: &str = "year";
const RELEASE_DATE_COL: &str = "release_date";

// One quoted item of a Python-style list literal: 'A' or "B's"
static QUOTED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap());

/// Header positions of every column we read.
struct Columns {
    name: usize,
    artists: usize,
    year: usize,
    release_date: usize,
    features: [usize; FEATURE_DIM],
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |col: &str| -> usize {
            match headers.iter().position(|h| h.trim() == col) {
                Some(i) => i,
                None => {
                    missing.push(col.to_string());
                    0
                }
            }
        };

        let name = require(NAME_COL);
        let artists = require(ARTISTS_COL);
        let year = require(YEAR_COL);
        let release_date = require(RELEASE_DATE_COL);
        let mut features = [0usize; FEATURE_DIM];
        for f in Feature::ALL {
            // "year" is both identity and feature; reported once
            if f == Feature::Year {
                features[f.index()] = year;
            } else {
                features[f.index()] = require(f.column());
            }
        }

        if !missing.is_empty() {
            return Err(CatalogError::MissingColumns(missing));
        }

        Ok(Self {
            name,
            artists,
            year,
            release_date,
            features,
        })
    }
}

impl Catalog {
    /// Load and validate a catalog CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        log::info!("Loading catalog from {}", path.display());
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let columns = Columns::locate(rdr.headers()?)?;

        let mut songs = Vec::new();
        for record in rdr.records() {
            let record = record?;
            songs.push(parse_record(&record, &columns)?);
        }

        log::info!("Read {} catalog rows", songs.len());
        Catalog::from_songs(songs)
    }
}

fn parse_record(record: &csv::StringRecord, columns: &Columns) -> Result<Song> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let field = |idx: usize| record.get(idx).unwrap_or("");
    let invalid = |column: &str, value: &str| CatalogError::InvalidValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    };

    let raw_year = field(columns.year);
    let year = parse_year(raw_year).ok_or_else(|| invalid(YEAR_COL, raw_year))?;

    let raw_date = field(columns.release_date);
    let release_date =
        parse_release_date(raw_date).ok_or_else(|| invalid(RELEASE_DATE_COL, raw_date))?;

    let mut features: FeatureVector = [0.0; FEATURE_DIM];
    for f in Feature::ALL {
        let raw = field(columns.features[f.index()]);
        features[f.index()] = parse_number(f, raw).ok_or_else(|| invalid(f.column(), raw))?;
    }

    Ok(Song {
        name: field(columns.name).to_string(),
        artists: parse_artists(field(columns.artists)),
        year,
        release_date,
        features,
    })
}

/// Numeric cell. Boolean columns also take `True`/`False` as 1/0.
fn parse_number(feature: Feature, raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if feature.is_boolean() {
        if raw.eq_ignore_ascii_case("true") {
            return Some(1.0);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Some(0.0);
        }
    }
    raw.parse::<f64>().ok()
}

/// Integral year: "1999" or "1999.0".
fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(y) = raw.parse::<i32>() {
        return Some(y);
    }
    let y = raw.parse::<f64>().ok()?;
    if y.is_finite() && y.fract() == 0.0 && y.abs() <= f64::from(i32::MAX) {
        Some(y as i32)
    } else {
        None
    }
}

/// Release dates come at day, month or year precision.
fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    match raw.matches('-').count() {
        2 => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
        1 => NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok(),
        0 => raw
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
        _ => None,
    }
}

/// Split an artists cell into names.
///
/// `['A', "B's"]` → `["A", "B's"]`; a bare string is a single artist.
pub fn parse_artists(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let quoted: Vec<String> = QUOTED_ITEM_RE
            .captures_iter(inner)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
        if !quoted.is_empty() {
            return quoted;
        }
        return inner
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}
