//! Configuration loading from disk and the process environment.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::config::schema::{BackpressurePolicy, GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Settings supplied through the environment (or matching CLI flags).
///
/// Each one, when present, replaces the value from the file or defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Optional TOML configuration file.
    #[arg(long = "config", env = "GATEWAY_CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Listen port; replaces the port of `listener.bind_address`.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Broker connection URL.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Comma-separated origin allow-list.
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: Option<String>,

    /// Comma-separated broker patterns.
    #[arg(long, env = "BROKER_PATTERNS")]
    pub broker_patterns: Option<String>,

    /// drop_message | close_connection
    #[arg(long, env = "BACKPRESSURE_POLICY")]
    pub backpressure: Option<BackpressurePolicy>,

    /// pretty | json
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl ConfigOverrides {
    /// Build the effective configuration: defaults, then the optional file,
    /// then these overrides. The result is validated.
    pub fn resolve(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config_path {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Apply the overrides onto an existing configuration.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{port}"),
            };
        }
        if let Some(url) = &self.redis_url {
            config.broker.url = url.clone();
        }
        if let Some(origins) = &self.allowed_origins {
            config.origins.allowed = split_list(origins);
        }
        if let Some(patterns) = &self.broker_patterns {
            config.broker.patterns = split_list(patterns);
        }
        if let Some(policy) = self.backpressure {
            config.connection.backpressure = policy;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
