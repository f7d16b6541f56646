//! immo-etl - real-estate sale records pipeline
//!
//! Subcommands:
//! - `load`: ingest raw land-registry sale files
//! - `geocode`: backfill coordinates through the batch geocoder
//! - `compute`: refresh the all-time average of every reference unit
//! - `aggregate`: rebuild the yearly city/department/region tables

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use immo_common::config::{load_config, TomlConfig};
use immo_etl::db::transactions::Selection;
use immo_etl::geocode::client::GeocodeClient;
use immo_etl::ingest::{record, ReferenceIndex, RejectedRow};
use immo_etl::{AggregationEngine, IngestOptions, Ingestor, Reconciler};

/// Command-line arguments for immo-etl
#[derive(Parser, Debug)]
#[command(name = "immo-etl")]
#[command(about = "Ingest, geocode and aggregate real-estate sale records")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest raw pipe-delimited sale files
    Load {
        /// Files to ingest, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Semicolon-delimited city/zip code file used for missing zips
        #[arg(long)]
        zipcode_file: Option<PathBuf>,

        /// Write rejected rows of each file as JSON to this path
        #[arg(long)]
        rejected_out: Option<PathBuf>,
    },

    /// Geocode stored transactions
    Geocode {
        /// Re-geocode every row instead of only rows without coordinates
        #[arg(long)]
        all: bool,

        /// Department codes to restrict to (all departments when omitted)
        departments: Vec<String>,
    },

    /// Store the all-time average price on regions, departments and cities
    Compute,

    /// Rebuild the yearly aggregate tables
    Aggregate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let mut toml_config = loaded.config.clone();
    immo_etl::config::apply_env_overrides(&mut toml_config);

    let level = if args.debug {
        "debug"
    } else {
        toml_config.logging.level.as_str()
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("immo_etl={level},immo_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting immo-etl {}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();

    let db_path = immo_etl::config::resolve_database_path(args.database.as_deref(), &toml_config);
    let pool = immo_etl::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database connection established");

    match args.command {
        Command::Load {
            files,
            zipcode_file,
            rejected_out,
        } => run_load(pool, &toml_config, files, zipcode_file, rejected_out).await,
        Command::Geocode { all, departments } => {
            run_geocode(pool, &toml_config, all, departments).await
        }
        Command::Compute => {
            AggregationEngine::new(pool, &toml_config.aggregate)
                .compute_unit_averages()
                .await
                .context("Unit average computation failed")?;
            Ok(())
        }
        Command::Aggregate => {
            AggregationEngine::new(pool, &toml_config.aggregate)
                .aggregate()
                .await
                .context("Aggregation failed")?;
            Ok(())
        }
    }
}

/// Rejected rows of one ingested file
#[derive(Serialize)]
struct RejectedFile {
    file: PathBuf,
    invalid: u64,
    rows: Vec<RejectedRow>,
}

async fn run_load(
    pool: SqlitePool,
    toml_config: &TomlConfig,
    files: Vec<PathBuf>,
    zipcode_file: Option<PathBuf>,
    rejected_out: Option<PathBuf>,
) -> Result<()> {
    let mut reference = ReferenceIndex::from_database(&pool)
        .await
        .context("Failed to load city reference")?;

    if let Some(path) = zipcode_file.or_else(|| toml_config.ingest.zipcode_file.clone()) {
        reference.merge_zipcode_file(&path);
    }

    let ingestor = Ingestor::new(
        pool,
        reference,
        IngestOptions::from(&toml_config.ingest),
    );

    let mut rejected = Vec::new();
    for file in files {
        let report = ingestor
            .ingest_file(&file)
            .await
            .with_context(|| format!("Failed to ingest {}", file.display()))?;

        if !report.rejected.is_empty() {
            rejected.push(RejectedFile {
                file: file.clone(),
                invalid: report.invalid,
                rows: report.rejected,
            });
        }
    }

    if let Some(path) = rejected_out {
        let json = serde_json::to_string_pretty(&rejected)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Rejected rows written to {}", path.display());
    }

    Ok(())
}

async fn run_geocode(
    pool: SqlitePool,
    toml_config: &TomlConfig,
    all: bool,
    departments: Vec<String>,
) -> Result<()> {
    let client = GeocodeClient::new(&toml_config.geocoder).context("Failed to build HTTP client")?;
    let reconciler = Reconciler::new(pool, client);

    let base = if all {
        Selection::all()
    } else {
        Selection::incremental()
    };

    let selections = if departments.is_empty() {
        vec![base]
    } else {
        let mut selections = Vec::with_capacity(departments.len());
        for raw in departments {
            match record::normalize_department(&raw) {
                Some(code) => selections.push(base.clone().with_department(code)),
                None => warn!(department = %raw, "Overseas departments are never ingested, skipping"),
            }
        }
        selections
    };

    for selection in &selections {
        reconciler
            .reconcile(selection)
            .await
            .context("Geocoding failed")?;
    }

    Ok(())
}
