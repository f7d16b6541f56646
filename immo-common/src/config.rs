//! Configuration loading
//!
//! Bootstrap configuration is read from a TOML file. Every field has a
//! built-in default so a missing file never prevents a run.
//!
//! Priority order (highest first), applied by the binaries:
//! 1. Command-line argument
//! 2. Environment variable (`IMMOTEP_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the database file location
pub const ENV_DATABASE: &str = "IMMOTEP_DATABASE";

/// Environment variable overriding the geocoding endpoint
pub const ENV_GEOCODER_ENDPOINT: &str = "IMMOTEP_GEOCODER_ENDPOINT";

/// Default geocoding endpoint (national address base, CSV batch search)
pub const DEFAULT_GEOCODER_ENDPOINT: &str = "https://api-adresse.data.gouv.fr/search/csv/";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    ///
    /// If not specified, falls back to `<data dir>/immotep/immotep.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Raw transaction ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Accepted records buffered before each batched insert
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,

    /// Log a progress line every N source lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Upper bound on rejected rows kept for inspection (counters stay exact)
    #[serde(default = "default_max_rejected_kept")]
    pub max_rejected_kept: usize,

    /// Optional semicolon-delimited city name → zip code file
    #[serde(default)]
    pub zipcode_file: Option<PathBuf>,
}

/// External geocoding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds (batch geocoding of 5000 rows is slow)
    #[serde(default = "default_geocoder_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum delay between two requests, in milliseconds
    #[serde(default = "default_geocoder_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Request CSV columns the service combines into the searched address
    #[serde(default = "default_geocoder_columns")]
    pub columns: Vec<String>,
}

/// Yearly aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Aggregate rows per insert statement
    #[serde(default = "default_aggregate_batch_size")]
    pub batch_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_ingest_batch_size() -> usize {
    500
}

fn default_progress_interval() -> u64 {
    100_000
}

fn default_max_rejected_kept() -> usize {
    1_000
}

fn default_geocoder_endpoint() -> String {
    DEFAULT_GEOCODER_ENDPOINT.to_string()
}

fn default_geocoder_timeout_secs() -> u64 {
    120
}

fn default_geocoder_min_interval_ms() -> u64 {
    1_000
}

fn default_geocoder_columns() -> Vec<String> {
    vec!["Address".to_string(), "City".to_string(), "ZipCode".to_string()]
}

fn default_aggregate_batch_size() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
            progress_interval: default_progress_interval(),
            max_rejected_kept: default_max_rejected_kept(),
            zipcode_file: None,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocoder_endpoint(),
            timeout_secs: default_geocoder_timeout_secs(),
            min_interval_ms: default_geocoder_min_interval_ms(),
            columns: default_geocoder_columns(),
        }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            batch_size: default_aggregate_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Platform config file location: `<config dir>/immotep/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("immotep").join("config.toml"))
}

/// Platform database location: `<data dir>/immotep/immotep.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("immotep").join("immotep.db"))
        .unwrap_or_else(|| PathBuf::from("./immotep.db"))
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Where the configuration in effect came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Default file present but unreadable or malformed
    Ignored { path: PathBuf, reason: String },
    BuiltIn,
}

/// Configuration plus its origin
///
/// Loading happens before logging is set up, so the origin is returned
/// for the caller to report once a subscriber is installed.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: ConfigSource,
}

impl LoadedConfig {
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::File(path) => info!("Using config file: {}", path.display()),
            ConfigSource::Ignored { path, reason } => {
                warn!("Ignoring config file {}: {}", path.display(), reason)
            }
            ConfigSource::BuiltIn => info!("No config file found, using built-in defaults"),
        }
    }
}

/// Load configuration
///
/// An explicit path must exist and parse. Without one, the platform
/// default file is used when present; a malformed default file yields
/// built-in defaults and is reported as [`ConfigSource::Ignored`].
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_from(explicit, default_config_path())
}

/// [`load_config`] with the default file location supplied by the caller
pub fn load_config_from(
    explicit: Option<&Path>,
    default_path: Option<PathBuf>,
) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        return Ok(LoadedConfig {
            config: parse_toml_config(&content)?,
            source: ConfigSource::File(path.to_path_buf()),
        });
    }

    let built_in = LoadedConfig {
        config: TomlConfig::default(),
        source: ConfigSource::BuiltIn,
    };

    let Some(path) = default_path.filter(|p| p.exists()) else {
        return Ok(built_in);
    };

    match std::fs::read_to_string(&path)
        .map_err(Error::from)
        .and_then(|content| parse_toml_config(&content))
    {
        Ok(config) => Ok(LoadedConfig {
            config,
            source: ConfigSource::File(path),
        }),
        Err(e) => Ok(LoadedConfig {
            source: ConfigSource::Ignored {
                path,
                reason: e.to_string(),
            },
            ..built_in
        }),
    }
}
