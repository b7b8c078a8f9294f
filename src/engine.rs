//! Entry points for callers: build a [`CatalogHandle`] once, then ask it for
//! recommendations as often as needed, from as many threads as needed.

use std::path::PathBuf;

use crate::catalog::{Catalog, CatalogError, Result};
use crate::db::Database;
use crate::features::{Feature, FeatureVector};
use crate::normalize::Normalizer;
use crate::similarity::{Recommendations, Retriever, Seed};

/// Where the catalog table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogSource {
    /// A CSV export of the song dataset
    Csv(PathBuf),
    /// A SQLite store written by `songrec import`
    Sqlite(PathBuf),
}

/// A loaded catalog with its fitted normalizer and normalized matrix.
/// Read-only after construction.
#[derive(Debug)]
pub struct CatalogHandle {
    catalog: Catalog,
    normalizer: Normalizer,
    normalized: Vec<FeatureVector>,
}

/// Load, validate and fit a catalog.
pub fn initialize(source: &CatalogSource) -> Result<CatalogHandle> {
    let catalog = match source {
        CatalogSource::Csv(path) => Catalog::from_csv_path(path)?,
        CatalogSource::Sqlite(path) => {
            log::info!("Loading catalog from database {}", path.display());
            let db = Database::open(path)?;
            Catalog::from_songs(db.load_songs()?)?
        }
    };
    CatalogHandle::from_catalog(catalog)
}

/// Recommend `k` songs similar to the seeds. See [`Retriever::recommend`].
pub fn recommend<S: AsRef<str>>(
    handle: &CatalogHandle,
    seed_names: &[S],
    k: usize,
) -> Recommendations {
    handle.recommend(seed_names, k)
}

impl CatalogHandle {
    /// Fit the normalizer and precompute every row's normalized vector.
    pub fn from_catalog(catalog: Catalog) -> Result<Self> {
        let rows = catalog.feature_rows();
        let normalizer = Normalizer::fit(&rows)?;
        let normalized = normalizer.transform_all(&rows);

        // Surface numeric trouble now rather than per request
        for (song, row) in catalog.songs().iter().zip(&normalized) {
            if let Some(d) = row.iter().position(|v| !v.is_finite()) {
                return Err(CatalogError::NonFinite {
                    name: song.name.clone(),
                    column: Feature::ALL[d].column(),
                });
            }
        }

        log::info!(
            "Catalog ready: {} songs, {} distinct names",
            catalog.len(),
            catalog.distinct_names()
        );

        Ok(Self {
            catalog,
            normalizer,
            normalized,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn normalized(&self) -> &[FeatureVector] {
        &self.normalized
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(&self.catalog, &self.normalizer, &self.normalized)
    }

    pub fn recommend<S: AsRef<str>>(&self, seed_names: &[S], k: usize) -> Recommendations {
        self.retriever().recommend(seed_names, k)
    }

    pub fn recommend_seeds(&self, seeds: &[Seed], k: usize) -> Recommendations {
        self.retriever().recommend_seeds(seeds, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_song;
    use crate::similarity::RecommendStatus;

    fn handle() -> CatalogHandle {
        let catalog = Catalog::from_songs(vec![
            make_song("Song A", "X", 0.10),
            make_song("Song B", "Y", 0.90),
            make_song("Song C", "Z", 0.12),
            make_song("Song D", "W", 0.55),
        ])
        .unwrap();
        CatalogHandle::from_catalog(catalog).unwrap()
    }

    #[test]
    fn test_handle_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CatalogHandle>();
    }

    #[test]
    fn test_normalized_matrix_matches_transform() {
        let h = handle();
        for (song, row) in h.catalog().songs().iter().zip(h.normalized()) {
            let again = h.normalizer().standardize(&h.normalizer().range_normalize(&song.features));
            for (a, b) in again.iter().zip(row.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_constant_column_never_nan() {
        // make_song pins year to 2000: the year column is constant
        let h = handle();
        assert!(h.normalizer().degenerate_columns().contains(&Feature::Year));
        assert!(h.normalized().iter().flatten().all(|v| v.is_finite()));

        let query = h.retriever().mean_vector(&["Song A", "Song B"]).unwrap();
        assert!(h.normalizer().transform(&query).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_free_function_matches_method() {
        let h = handle();
        assert_eq!(recommend(&h, &["Song A"], 2), h.recommend(&["Song A"], 2));
        assert_eq!(recommend(&h, &["Song A"], 1).songs[0].name, "Song C");
    }

    #[test]
    fn test_concurrent_requests_agree() {
        let owned = handle();
        let h = &owned;
        let expected = h.recommend(&["Song B"], 3);

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || h.recommend(&["Song B"], 3)))
                .collect();
            for w in workers {
                assert_eq!(w.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_initialize_from_sqlite() {
        let dir = std::env::temp_dir().join(format!("songrec-engine-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.db");
        let _ = std::fs::remove_file(&path);

        {
            let db = Database::open(&path).unwrap();
            db.import_catalog(handle().catalog(), "catalog.csv").unwrap();
        }

        let h = initialize(&CatalogSource::Sqlite(path.clone())).unwrap();
        assert_eq!(h.catalog().len(), 4);
        assert_eq!(h.recommend(&["song a"], 1).songs[0].name, "Song C");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_initialize_from_csv() {
        let dir = std::env::temp_dir().join(format!("songrec-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.csv");

        let mut data = String::from(
            "valence,year,acousticness,artists,danceability,duration_ms,energy,explicit,id,\
             instrumentalness,key,liveness,loudness,mode,name,popularity,release_date,speechiness,tempo\n",
        );
        for (name, v) in [("Song A", 0.10), ("Song B", 0.90), ("Song C", 0.12)] {
            data.push_str(&format!(
                "{v},2000,{v},['X'],{v},{d},{v},0,id,{v},5,{v},-6,1,{name},50,2000-01-01,{v},120\n",
                d = 200_000.0 + v * 1000.0,
            ));
        }
        std::fs::write(&path, data).unwrap();

        let h = initialize(&CatalogSource::Csv(path)).unwrap();
        assert_eq!(h.catalog().len(), 3);
        let recs = h.recommend(&["Song A"], 2);
        assert!(recs.is_ok());
        assert_eq!(recs.songs[0].name, "Song C");
        assert_eq!(recs.songs[1].name, "Song B");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_initialize_empty_database_fails() {
        let dir = std::env::temp_dir().join(format!("songrec-empty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.db");
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            initialize(&CatalogSource::Sqlite(path)),
            Err(CatalogError::Empty)
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_initialize_missing_csv_is_io_error() {
        let missing = CatalogSource::Csv(PathBuf::from("/nonexistent/songrec/data.csv"));
        assert!(matches!(initialize(&missing), Err(CatalogError::Io(_))));
    }

    #[test]
    fn test_unknown_seed_through_handle() {
        let h = handle();
        let recs = h.recommend(&["Unknown Song"], 5);
        assert!(recs.songs.is_empty());
        assert!(matches!(recs.status, RecommendStatus::MissingSeed { .. }));
    }
}
