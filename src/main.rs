use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use songrec::catalog::Catalog;
use songrec::engine::{CatalogHandle, CatalogSource};
use songrec::features::Feature;
use songrec::similarity::Seed;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "songrec", version, about = "Recommend songs with similar audio features")]
struct Cli {
    /// CSV catalog to load (skips the imported database)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a catalog CSV and import it into the database
    Import {
        /// CSV file with name, artists, year, release_date and feature columns
        csv: PathBuf,
    },

    /// Recommend songs similar to one or more seed songs
    Recommend {
        /// Seed song names (case-insensitive exact match)
        #[arg(required = true)]
        songs: Vec<String>,

        /// Number of recommendations (defaults to config `recommendations`)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Seed weights, one per song, in the same order
        #[arg(short, long = "weight")]
        weights: Vec<f64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the most popular songs in the catalog
    Top {
        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Count songs per release decade
    Decades,

    /// Show catalog statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = songrec::config::AppConfig::load();

    let workers = config.resolve_workers();
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("Failed to start worker pool")?;
    log::debug!("Distance scan uses {} workers", workers);

    match cli.command {
        Commands::Import { csv } => {
            let catalog = Catalog::from_csv_path(&csv)
                .with_context(|| format!("Invalid catalog {}", csv.display()))?;
            // Refuse anything the normalizer cannot fit
            let handle = CatalogHandle::from_catalog(catalog)
                .with_context(|| format!("Invalid catalog {}", csv.display()))?;

            let db_path = config.resolve_db_path(cli.db_path);
            log::info!("Database: {}", db_path.display());
            let db = songrec::db::Database::open(&db_path)
                .context("Failed to open database")?;

            let count = db
                .import_catalog(handle.catalog(), &csv.to_string_lossy())
                .context("Import failed")?;
            println!(
                "Import complete: {} songs ({} distinct names) into {}",
                count,
                handle.catalog().distinct_names(),
                db_path.display()
            );
        }

        Commands::Recommend { songs, limit, weights, json } => {
            if !weights.is_empty() && weights.len() != songs.len() {
                anyhow::bail!(
                    "Got {} weights for {} songs; pass one --weight per song or none",
                    weights.len(),
                    songs.len()
                );
            }

            let seeds: Vec<Seed> = if weights.is_empty() {
                songs.iter().map(Seed::new).collect()
            } else {
                songs
                    .iter()
                    .zip(&weights)
                    .map(|(name, &w)| Seed::weighted(name, w))
                    .collect()
            };
            let k = limit.unwrap_or(config.recommendations);

            let handle = load_handle(&config, cli.catalog, cli.db_path)?;
            let recs = handle.recommend_seeds(&seeds, k);

            if json {
                println!("{}", serde_json::to_string_pretty(&recs)?);
                return Ok(());
            }

            if !recs.is_ok() {
                println!("No recommendations available: {}.", recs.status);
                return Ok(());
            }
            if recs.songs.is_empty() {
                println!("No recommendations available.");
                return Ok(());
            }

            println!("Songs similar to {}:", songs.join(" + "));
            println!();
            println!(
                "{:>3}  {:<40} {:<30} {:>5} {:>7}",
                "#", "Song", "Artists", "Year", "Dist"
            );
            println!("{}", "-".repeat(90));
            for (rank, r) in recs.songs.iter().enumerate() {
                println!(
                    "{:>3}  {:<40} {:<30} {:>5} {:>7.3}",
                    rank + 1,
                    truncate(&r.name, 40),
                    truncate(&r.artists.join(", "), 30),
                    r.year,
                    r.distance,
                );
            }
            println!();
            println!("Dist = Euclidean distance in normalized feature space (lower = more similar)");
        }

        Commands::Top { limit, json } => {
            let handle = load_handle(&config, cli.catalog, cli.db_path)?;
            let top = songrec::report::top_by_popularity(handle.catalog(), limit);

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
                return Ok(());
            }

            println!("Top {} songs by popularity:", top.len());
            println!();
            println!("{:<40} {:<30} {:>5} {:>4}", "Song", "Artists", "Year", "Pop");
            println!("{}", "-".repeat(82));
            for s in &top {
                println!(
                    "{:<40} {:<30} {:>5} {:>4.0}",
                    truncate(&s.name, 40),
                    truncate(&s.artists_display(), 30),
                    s.year,
                    s.feature(Feature::Popularity),
                );
            }
        }

        Commands::Decades => {
            let handle = load_handle(&config, cli.catalog, cli.db_path)?;
            let counts = songrec::report::decade_counts(handle.catalog());

            println!("{:<8} {:>8}", "Decade", "Songs");
            println!("{}", "-".repeat(17));
            for (decade, count) in &counts {
                println!("{:<8} {:>8}", format!("{}s", decade), count);
            }
        }

        Commands::Stats => {
            let source = config.resolve_source(cli.catalog, cli.db_path);
            let handle = songrec::initialize(&source).context("Failed to load catalog")?;
            let stats = songrec::report::stats(handle.catalog());

            println!("Catalog Statistics");
            println!("==================");
            println!("Songs:            {}", stats.songs);
            println!("Distinct names:   {}", stats.distinct_names);
            println!("Years:            {} to {}", stats.first_year, stats.last_year);
            println!("Explicit:         {}", stats.explicit);

            let degenerate = handle.normalizer().degenerate_columns();
            if !degenerate.is_empty() {
                let cols: Vec<&str> = degenerate.iter().map(|f| f.column()).collect();
                println!("Constant columns: {}", cols.join(", "));
            }

            if let CatalogSource::Sqlite(path) = &source {
                let db = songrec::db::Database::open(path).context("Failed to open database")?;
                if let Some(import) = db.last_import().context("Query failed")? {
                    println!();
                    println!("Imported from {} at {}", import.source, import.imported_at);
                }
            }
        }
    }

    Ok(())
}

fn load_handle(
    config: &songrec::config::AppConfig,
    cli_catalog: Option<PathBuf>,
    cli_db_path: Option<PathBuf>,
) -> Result<CatalogHandle> {
    let source = config.resolve_source(cli_catalog, cli_db_path);
    songrec::initialize(&source).with_context(|| match &source {
        CatalogSource::Csv(path) => format!("Failed to load catalog {}", path.display()),
        CatalogSource::Sqlite(path) => format!(
            "Failed to load catalog from {} (run `songrec import <csv>` first)",
            path.display()
        ),
    })
}

/// Truncate to `width` characters, marking the cut with "...".
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
