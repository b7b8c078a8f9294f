use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::engine::CatalogSource;

/// Number of recommendations when none is requested.
pub const DEFAULT_RECOMMENDATIONS: usize = 10;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// CSV catalog to load directly (takes precedence over the database).
    pub catalog_path: Option<PathBuf>,
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Threads for the distance scan. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Default number of recommendations per request.
    pub recommendations: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            db_path: None,
            workers: 0,
            recommendations: DEFAULT_RECOMMENDATIONS,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/songrec/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Pick the catalog source: CSV (CLI, then config) before the database
    /// (CLI, then config, then XDG default).
    pub fn resolve_source(
        &self,
        cli_catalog: Option<PathBuf>,
        cli_db_path: Option<PathBuf>,
    ) -> CatalogSource {
        if let Some(csv) = cli_catalog.or_else(|| self.catalog_path.clone()) {
            return CatalogSource::Csv(csv);
        }
        CatalogSource::Sqlite(self.resolve_db_path(cli_db_path))
    }

    /// Database path: CLI > config > XDG default.
    pub fn resolve_db_path(&self, cli_db_path: Option<PathBuf>) -> PathBuf {
        cli_db_path
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(default_db_path)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("songrec.db")
    } else {
        // Fallback: current directory
        PathBuf::from("songrec.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("workers = 4").unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.recommendations, DEFAULT_RECOMMENDATIONS);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            catalog_path = "/data/spotify/data.csv"
            db_path = "/tmp/songrec.db"
            workers = 2
            recommendations = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.catalog_path, Some(PathBuf::from("/data/spotify/data.csv")));
        assert_eq!(config.recommendations, 25);
        assert_eq!(config.resolve_workers(), 2);
    }

    #[test]
    fn test_unparseable_file_falls_back() {
        let path = std::env::temp_dir().join(format!("songrec-config-{}.toml", std::process::id()));
        std::fs::write(&path, "workers = \"many\"").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_resolve_workers_auto() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }

    #[test]
    fn test_source_precedence() {
        let config = AppConfig {
            catalog_path: Some(PathBuf::from("config.csv")),
            db_path: Some(PathBuf::from("config.db")),
            ..AppConfig::default()
        };

        assert_eq!(
            config.resolve_source(Some(PathBuf::from("cli.csv")), Some(PathBuf::from("cli.db"))),
            CatalogSource::Csv(PathBuf::from("cli.csv"))
        );
        assert_eq!(
            config.resolve_source(None, Some(PathBuf::from("cli.db"))),
            CatalogSource::Csv(PathBuf::from("config.csv"))
        );

        let db_only = AppConfig {
            db_path: Some(PathBuf::from("config.db")),
            ..AppConfig::default()
        };
        assert_eq!(
            db_only.resolve_source(None, Some(PathBuf::from("cli.db"))),
            CatalogSource::Sqlite(PathBuf::from("cli.db"))
        );
        assert_eq!(
            db_only.resolve_source(None, None),
            CatalogSource::Sqlite(PathBuf::from("config.db"))
        );
    }
}
