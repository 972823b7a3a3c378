//! Service configuration resolution
//!
//! **Priority:** CLI argument / environment variable → TOML → compiled default

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use embrya_common::config::TomlConfig;
use embrya_common::{Error, Result};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "embrya-ai.toml";
pub const CONFIG_ENV_VAR: &str = "EMBRYA_CONFIG";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5731;
pub const DEFAULT_MODEL_DIR: &str = "./models";
pub const DEFAULT_MODEL_VERSION: &str = "unversioned";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub model_version: Option<String>,
}

/// Effective service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub model_dir: PathBuf,
    pub model_version: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn resolve(overrides: ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let bind = overrides
            .bind_address
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address: IpAddr = bind
            .parse()
            .map_err(|_| Error::Config(format!("Invalid bind address: {}", bind)))?;

        let port = overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }

        let model_dir = overrides
            .model_dir
            .or_else(|| toml.model_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));

        let model_version = overrides
            .model_version
            .or_else(|| toml.model_version.clone())
            .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string());

        let config = Self {
            bind_address,
            port,
            model_dir,
            model_version,
            cors_origins: toml.cors_origins.clone(),
            log_level: toml.logging.level.clone(),
        };
        info!(
            bind = %config.bind_address,
            port = config.port,
            model_dir = %config.model_dir.display(),
            "Configuration resolved"
        );
        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
