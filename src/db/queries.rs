use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::params;
use rusqlite::types::Value;

use super::{Database, DbError, Result};
use crate::catalog::{Catalog, Song};
use crate::features::{FEATURE_DIM, Feature, FeatureVector};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column holding a feature in the `songs` table. `year` is taken by the
/// integer identity column, so its feature copy lives in `year_feature`.
pub fn feature_column(feature: Feature) -> &'static str {
    match feature {
        Feature::Year => "year_feature",
        other => other.column(),
    }
}

fn feature_list() -> String {
    Feature::ALL
        .iter()
        .map(|f| feature_column(*f))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row from the `imports` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub source: String,
    pub song_count: i64,
    pub imported_at: String,
}

impl Database {
    /// Replace the stored catalog with `catalog`, keeping row order.
    /// Returns the number of rows written.
    pub fn import_catalog(&self, catalog: &Catalog, source: &str) -> Result<usize> {
        let pb = ProgressBar::new(catalog.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} songs ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        pb.set_message("Importing...");

        // One transaction: the old catalog stays visible until commit
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM songs", [])?;
        tx.execute("DELETE FROM sqlite_sequence WHERE name = 'songs'", [])?;

        let placeholders = (1..=4 + FEATURE_DIM)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO songs (name, artists, year, release_date, {}) VALUES ({})",
            feature_list(),
            placeholders
        );

        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for song in catalog.songs() {
                let mut values: Vec<Value> = Vec::with_capacity(4 + FEATURE_DIM);
                values.push(Value::Text(song.name.clone()));
                values.push(Value::Text(serde_json::to_string(&song.artists)?));
                values.push(Value::Integer(i64::from(song.year)));
                values.push(Value::Text(song.release_date.format(DATE_FORMAT).to_string()));
                values.extend(song.features.iter().map(|&v| Value::Real(v)));

                stmt.execute(rusqlite::params_from_iter(values))?;
                pb.inc(1);
            }
        }

        tx.execute(
            "INSERT INTO imports (source, song_count) VALUES (?1, ?2)",
            params![source, catalog.len() as i64],
        )?;
        tx.commit()?;

        pb.finish_with_message("done");
        log::info!("Imported {} songs from {}", catalog.len(), source);

        Ok(catalog.len())
    }

    /// All stored songs in catalog order.
    pub fn load_songs(&self) -> Result<Vec<Song>> {
        let sql = format!(
            "SELECT id, name, artists, year, release_date, {} FROM songs ORDER BY id",
            feature_list()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], |row| {
                let mut features: FeatureVector = [0.0; FEATURE_DIM];
                for (d, slot) in features.iter_mut().enumerate() {
                    *slot = row.get(5 + d)?;
                }
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, String>(4)?,
                    features,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut songs = Vec::with_capacity(rows.len());
        for (id, name, artists, year, release_date, features) in rows {
            let release_date = NaiveDate::parse_from_str(&release_date, DATE_FORMAT)
                .map_err(|_| DbError::Date { id, value: release_date.clone() })?;
            songs.push(Song {
                name,
                artists: serde_json::from_str(&artists)?,
                year,
                release_date,
                features,
            });
        }

        log::debug!("Loaded {} songs from database", songs.len());
        Ok(songs)
    }

    /// Most recent import, if any.
    pub fn last_import(&self) -> Result<Option<ImportRecord>> {
        let result = self.conn.query_row(
            "SELECT source, song_count, imported_at FROM imports ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(ImportRecord {
                    source: row.get(0)?,
                    song_count: row.get(1)?,
                    imported_at: row.get(2)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
