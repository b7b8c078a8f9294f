//! The fixed feature schema shared by catalog rows and query vectors.

/// Number of numeric feature columns per song.
pub const FEATURE_DIM: usize = 15;

/// A song's raw or normalized features, in `Feature::ALL` order.
pub type FeatureVector = [f64; FEATURE_DIM];

/// One numeric feature column. Discriminants are vector positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Valence,
    Year,
    Acousticness,
    Danceability,
    DurationMs,
    Energy,
    Explicit,
    Instrumentalness,
    Key,
    Liveness,
    Loudness,
    Mode,
    Popularity,
    Speechiness,
    Tempo,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_DIM] = [
        Self::Valence,
        Self::Year,
        Self::Acousticness,
        Self::Danceability,
        Self::DurationMs,
        Self::Energy,
        Self::Explicit,
        Self::Instrumentalness,
        Self::Key,
        Self::Liveness,
        Self::Loudness,
        Self::Mode,
        Self::Popularity,
        Self::Speechiness,
        Self::Tempo,
    ];

    /// Column name in the catalog file and the SQLite store.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Valence => "valence",
            Self::Year => "year",
            Self::Acousticness => "acousticness",
            Self::Danceability => "danceability",
            Self::DurationMs => "duration_ms",
            Self::Energy => "energy",
            Self::Explicit => "explicit",
            Self::Instrumentalness => "instrumentalness",
            Self::Key => "key",
            Self::Liveness => "liveness",
            Self::Loudness => "loudness",
            Self::Mode => "mode",
            Self::Popularity => "popularity",
            Self::Speechiness => "speechiness",
            Self::Tempo => "tempo",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.column() == name)
    }

    /// Columns coded as 0/1 in the catalog.
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::Explicit | Self::Mode)
    }
}
