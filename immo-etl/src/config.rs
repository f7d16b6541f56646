//! Configuration resolution for immo-etl
//!
//! Each setting is resolved with CLI → ENV → TOML → default priority.

use std::path::{Path, PathBuf};

use immo_common::config::{self, TomlConfig, ENV_DATABASE, ENV_GEOCODER_ENDPOINT};
use tracing::{info, warn};

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the SQLite database location
pub fn resolve_database_path(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    let env_path = env_value(ENV_DATABASE).map(PathBuf::from);
    let toml_path = toml_config.database_path.clone();

    let mut sources = Vec::new();
    if cli_arg.is_some() {
        sources.push("command line");
    }
    if env_path.is_some() {
        sources.push("environment");
    }
    if toml_path.is_some() {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "Database path found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(path) = cli_arg {
        info!("Database path from command line: {}", path.display());
        return path.to_path_buf();
    }

    if let Some(path) = env_path {
        info!("Database path from {}: {}", ENV_DATABASE, path.display());
        return path;
    }

    if let Some(path) = toml_path {
        info!("Database path from TOML config: {}", path.display());
        return path;
    }

    let path = config::default_database_path();
    info!("Database path (default): {}", path.display());
    path
}

/// Apply the geocoder endpoint override from the environment, if any
pub fn apply_env_overrides(toml_config: &mut TomlConfig) {
    if let Some(endpoint) = env_value(ENV_GEOCODER_ENDPOINT) {
        if endpoint != toml_config.geocoder.endpoint {
            info!(
                "Geocoder endpoint from {}: {} (overrides {})",
                ENV_GEOCODER_ENDPOINT, endpoint, toml_config.geocoder.endpoint
            );
        }
        toml_config.geocoder.endpoint = endpoint;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cli_wins_over_env_and_toml() {
        std::env::set_var(ENV_DATABASE, "/tmp/from-env.db");
        let toml_config = TomlConfig {
            database_path: Some(PathBuf::from("/tmp/from-toml.db")),
            ..Default::default()
        };

        let path = resolve_database_path(Some(Path::new("/tmp/from-cli.db")), &toml_config);
        assert_eq!(path, PathBuf::from("/tmp/from-cli.db"));

        std::env::remove_var(ENV_DATABASE);
    }

    #[test]
    #[serial]
    fn test_env_wins_over_toml() {
        std::env::set_var(ENV_DATABASE, "/tmp/from-env.db");
        let toml_config = TomlConfig {
            database_path: Some(PathBuf::from("/tmp/from-toml.db")),
            ..Default::default()
        };

        assert_eq!(
            resolve_database_path(None, &toml_config),
            PathBuf::from("/tmp/from-env.db")
        );

        std::env::remove_var(ENV_DATABASE);
        assert_eq!(
            resolve_database_path(None, &toml_config),
            PathBuf::from("/tmp/from-toml.db")
        );
    }

    #[test]
    #[serial]
    fn test_default_when_nothing_configured() {
        std::env::remove_var(ENV_DATABASE);
        let path = resolve_database_path(None, &TomlConfig::default());
        assert_eq!(path, config::default_database_path());
    }

    #[test]
    #[serial]
    fn test_endpoint_env_override() {
        std::env::set_var(ENV_GEOCODER_ENDPOINT, "http://127.0.0.1:9/search/csv/");
        let mut toml_config = TomlConfig::default();
        apply_env_overrides(&mut toml_config);
        assert_eq!(toml_config.geocoder.endpoint, "http://127.0.0.1:9/search/csv/");

        std::env::remove_var(ENV_GEOCODER_ENDPOINT);
        let mut toml_config = TomlConfig::default();
        apply_env_overrides(&mut toml_config);
        assert_eq!(toml_config.geocoder.endpoint, config::DEFAULT_GEOCODER_ENDPOINT);
    }
}
