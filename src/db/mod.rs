pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Artists column is not a JSON list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid release_date {value:?} for song id {id}")]
    Date { id: i64, value: String },
    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Imported copy of the song catalog.
pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than supported v{SCHEMA_VERSION}"
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: songs table. Feature columns follow `Feature::ALL` order.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS songs (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name                TEXT NOT NULL,
                artists             TEXT NOT NULL,  -- JSON list
                year                INTEGER NOT NULL,
                release_date        TEXT NOT NULL,  -- YYYY-MM-DD

                valence             REAL NOT NULL,
                year_feature        REAL NOT NULL,
                acousticness        REAL NOT NULL,
                danceability        REAL NOT NULL,
                duration_ms         REAL NOT NULL,
                energy              REAL NOT NULL,
                explicit            REAL NOT NULL,
                instrumentalness    REAL NOT NULL,
                key                 REAL NOT NULL,
                liveness            REAL NOT NULL,
                loudness            REAL NOT NULL,
                mode                REAL NOT NULL,
                popularity          REAL NOT NULL,
                speechiness         REAL NOT NULL,
                tempo               REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_songs_name ON songs(name COLLATE NOCASE);
            ",
        )?;
        Ok(())
    }

    /// V2: import history
    fn migrate_v2(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS imports (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                source          TEXT NOT NULL,
                song_count      INTEGER NOT NULL,
                imported_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }
}

const SCHEMA_VERSION: i32 = 2;
