//! Server configuration module.
//!
//! Configuration is layered: built-in defaults, then an optional
//! `pharmacon.toml`, then `PHARMACON_*` environment variables
//! (`PHARMACON_PORT=9000`, `PHARMACON_TOKEN_SECRET=...`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use pharmacon_core::DEFAULT_TOKEN_TTL_SECS;

const DEV_SECRET: &str = "pharmacon-dev-secret-change-in-production";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// HMAC secret for signing session tokens
    pub token_secret: String,

    /// Session token lifetime in seconds
    pub token_ttl_secs: i64,

    /// Root directory for rendered PDFs
    pub document_dir: PathBuf,

    /// Default tracing filter (RUST_LOG wins when set)
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: PathBuf::from("./pharmacon.db"),
            token_secret: DEV_SECRET.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            document_dir: PathBuf::from("./documents"),
            log_filter: "info,pharmacon_server=debug".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `pharmacon.toml` (optional) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("pharmacon")
    }

    /// Load with an explicit config file stem (no extension).
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let settings = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("database_path", defaults.database_path.to_string_lossy().to_string())?
            .set_default("token_secret", defaults.token_secret)?
            .set_default("token_ttl_secs", defaults.token_ttl_secs)?
            .set_default("document_dir", defaults.document_dir.to_string_lossy().to_string())?
            .set_default("log_filter", defaults.log_filter)?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("PHARMACON").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("token_secret".to_string()));
        }
        if self.token_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue("token_ttl_secs".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }
        Ok(())
    }

    /// Whether the built-in development secret is still in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.token_secret == DEV_SECRET
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("host".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert!(config.uses_dev_secret());
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServerConfig::load_from("does-not-exist/pharmacon").unwrap();
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_rejects_non_positive_ttl() {
        let config = ServerConfig {
            token_ttl_secs: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_rejects_empty_secret() {
        let config = ServerConfig {
            token_secret: "  ".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }
}
