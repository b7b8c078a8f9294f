pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod features;
pub mod normalize;
pub mod report;
pub mod similarity;

pub use engine::{CatalogHandle, CatalogSource, initialize, recommend};

/// Application name for XDG paths
pub const APP_NAME: &str = "songrec";
