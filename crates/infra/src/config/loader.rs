//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `NOVAIO_AUTH_API_URL` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//! 5. With no file either, uses the defaults
//!
//! ## Environment Variables
//! - `NOVAIO_AUTH_API_URL`: Base URL of the API (required for the env path)
//! - `NOVAIO_REQUEST_TIMEOUT_MS`: Timeout of every request
//! - `NOVAIO_REFRESH_TIMEOUT_MS`: Timeout of the refresh call
//! - `NOVAIO_EXPIRY_SKEW_MS`: Renewal margin before access token expiry
//! - `NOVAIO_STORAGE_PATH`: Credential file (memory storage when unset)
//! - `NOVAIO_STORAGE_NAMESPACE`: Storage key prefix
//! - `NOVAIO_WATCH_INTERVAL_MS`: Credential file polling interval
//! - `NOVAIO_PREFLIGHT_FAILURE`: `proceed` or `abort`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./novaio.toml`, `./novaio.json`
//! 2. `./config.toml`, `./config.json`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use novaio_domain::{ClientConfig, NovaError, PreflightFailurePolicy, Result};

const CANDIDATE_NAMES: [&str; 4] = ["novaio.toml", "novaio.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `NovaError::Config` if a source exists but is invalid.
pub fn load() -> Result<ClientConfig> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) if std::env::var_os("NOVAIO_AUTH_API_URL").is_some() => return Err(e),
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            match probe_config_paths() {
                Some(path) => load_from_file(Some(path))?,
                None => {
                    tracing::info!("No configuration found; using defaults");
                    ClientConfig::default()
                }
            }
        }
    };
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `NOVAIO_AUTH_API_URL` is required; every other variable falls back to its
/// default when unset.
///
/// # Errors
/// Returns `NovaError::Config` if the base URL is missing or a value does
/// not parse.
pub fn load_from_env() -> Result<ClientConfig> {
    let defaults = ClientConfig::default();

    Ok(ClientConfig {
        base_url: env_var("NOVAIO_AUTH_API_URL")?,
        request_timeout_ms: env_parse("NOVAIO_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
        refresh_timeout_ms: env_parse("NOVAIO_REFRESH_TIMEOUT_MS", defaults.refresh_timeout_ms)?,
        expiry_skew_ms: env_parse("NOVAIO_EXPIRY_SKEW_MS", defaults.expiry_skew_ms)?,
        storage_path: std::env::var_os("NOVAIO_STORAGE_PATH").map(PathBuf::from),
        storage_namespace: std::env::var("NOVAIO_STORAGE_NAMESPACE")
            .unwrap_or(defaults.storage_namespace),
        watch_interval_ms: env_parse("NOVAIO_WATCH_INTERVAL_MS", defaults.watch_interval_ms)?,
        auth_paths: defaults.auth_paths,
        preflight_failure: env_parse::<PreflightFailurePolicy>(
            "NOVAIO_PREFLIGHT_FAILURE",
            defaults.preflight_failure,
        )?,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `NovaError::Config` if the file is missing or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(NovaError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            NovaError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| NovaError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| NovaError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| NovaError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(NovaError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the working directory, then the executable's directory.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CANDIDATE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// # Errors
/// Returns `NovaError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| NovaError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable, or `default` if unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| NovaError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
