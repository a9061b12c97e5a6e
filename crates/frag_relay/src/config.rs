//! Configuration management for the relay.
//!
//! This module handles loading, validation, and conversion of the relay
//! configuration from TOML files and command-line arguments.

use crate::cli::CliArgs;
use relay_server::{IdAllocation, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Log levels accepted by `logging.level` and `--log-level`.
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_max_connections() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_report_interval() -> u64 {
    60
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay listener settings
    pub server: ServerSettings,
    /// Periodic scoreboard reporting
    #[serde(default)]
    pub scoreboard: ScoreboardSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Relay listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the relay to (e.g., "0.0.0.0:8887")
    pub bind_address: String,
    /// Maximum number of concurrent client connections (0 for no limit)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest accepted WebSocket message in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// What to do when the identifier counter lands on a held identifier
    #[serde(default)]
    pub id_allocation: IdAllocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreboardSettings {
    /// Seconds between leaderboard reports; 0 disables them
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for ScoreboardSettings {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: format!("0.0.0.0:{}", relay_server::DEFAULT_PORT),
                max_connections: default_max_connections(),
                max_message_size: default_max_message_size(),
                id_allocation: IdAllocation::default(),
            },
            scoreboard: ScoreboardSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Overlays the command-line flags that were given.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(bind_address) = &args.bind_address {
            self.server.bind_address = bind_address.clone();
        }

        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }

        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Converts the application configuration to the relay's server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            max_message_size: self.server.max_message_size,
            id_allocation: self.server.id_allocation,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.max_message_size == 0 {
            return Err("server.max_message_size must be greater than 0".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
