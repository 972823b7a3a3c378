//! Configuration loading and config-file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/embrya/<file_name>`)
//!
//! A missing config file is never fatal: a warning is logged and compiled
//! defaults are used. A present but malformed file is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "embrya";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive (e.g. "info", "embrya_ai=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Service configuration as read from TOML
///
/// Every field is optional; unset fields fall back to CLI/ENV values or
/// compiled defaults in the owning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address to bind the HTTP listener to
    pub bind_address: Option<String>,
    /// HTTP port
    pub port: Option<u16>,
    /// Directory holding frozen classifier files
    pub model_dir: Option<PathBuf>,
    /// Version tag reported in audit events (defaults to the registry tag)
    pub model_version: Option<String>,
    /// Browser origins allowed to call the API; empty disables CORS
    pub cors_origins: Vec<String>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Default config file path for the current user, if the platform has one
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name))
}

/// Resolve which config file to read
///
/// Returns `None` only when no CLI/ENV path was given and the platform has no
/// config directory.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    default_config_path(file_name)
}

/// Load TOML config from `path`
///
/// Missing file → warning + defaults. Malformed file → `Error::Toml`.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}; using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;

    if let Some(port) = config.port {
        if port == 0 {
            return Err(Error::Config(format!(
                "Invalid port 0 in {}",
                path.display()
            )));
        }
    }

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve and load in one step; an unresolvable path yields defaults
pub fn load_resolved_config(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, env_var_name, file_name) {
        Some(path) => load_toml_config(&path),
        None => {
            warn!("No config directory available on this platform; using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}
