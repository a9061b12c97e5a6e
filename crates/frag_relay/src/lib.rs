//! # Frag Relay - Main Entry Point
//!
//! WebSocket relay for multiplayer shooters with a built-in kill counter.
//! This entry point handles CLI parsing, configuration loading, logging setup
//! and the application lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (listens on 0.0.0.0:8887)
//! frag_relay
//!
//! # Specify custom configuration
//! frag_relay --config production.toml
//!
//! # Override specific settings
//! frag_relay --bind 127.0.0.1:9000 --log-level debug
//!
//! # JSON logging for production
//! frag_relay --json-logs
//! ```
//!
//! ## Configuration
//!
//! The relay loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The relay shuts down gracefully on SIGINT (Ctrl+C) and SIGTERM. A second
//! signal exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

/// Main entry point for the relay.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "❌ Failed to load configuration from {}: {e}",
                args.config_path.display()
            );
            std::process::exit(1);
        }
    };
    config.apply_cli_overrides(&args);

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(config, &args.config_path) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export configuration types for library usage
pub use config::{AppConfig, LoggingSettings, ScoreboardSettings, ServerSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use relay_server::IdAllocation;
    use std::path::Path;

    #[test]
    fn test_default_config_converts() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config
            .to_server_config()
            .expect("Default config should convert to ServerConfig");
        assert_eq!(server_config.bind_address.port(), 8887);
        assert_eq!(server_config.max_connections, 256);
        assert_eq!(server_config.id_allocation, IdAllocation::Wrap);
    }

    #[test]
    fn test_application_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();

        let result = Application::new(config, Path::new("config.toml"));
        let err = result.err().expect("invalid config must be rejected");
        assert!(err.to_string().contains("Configuration validation failed"));
    }

    #[test]
    fn test_application_creation() {
        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        assert!(Application::new(config, Path::new("config.toml")).is_ok());
    }

    #[test]
    fn test_cli_flags_flow_into_server_config() {
        let args = CliArgs::parse_from(["frag_relay", "--bind", "127.0.0.1:9100", "-l", "warn"]);
        let mut config = AppConfig::default();
        config.apply_cli_overrides(&args);

        assert!(config.validate().is_ok());
        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.to_string(), "127.0.0.1:9100");
        assert_eq!(config.logging.level, "warn");
    }
}
