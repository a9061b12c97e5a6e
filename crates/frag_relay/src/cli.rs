//! Command-line interface handling for the relay.
//!
//! Flags given here override the matching settings from the configuration
//! file.

use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Exits with a usage message when the arguments are malformed.
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    /// Parses an explicit argument list, the first item being the binary name.
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().get_matches_from(args);

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

fn command() -> Command {
    Command::new("Frag Relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("WebSocket relay for multiplayer shooters with a built-in kill counter")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 0.0.0.0:8887)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let args = CliArgs::parse_from(["frag_relay"]);
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert_eq!(args.bind_address, None);
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_all_overrides() {
        let args = CliArgs::parse_from([
            "frag_relay",
            "-c",
            "relay.toml",
            "--bind",
            "127.0.0.1:9000",
            "-l",
            "debug",
            "--json-logs",
        ]);
        assert_eq!(args.config_path, PathBuf::from("relay.toml"));
        assert_eq!(args.bind_address.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
    }

    #[test]
    fn test_command_definition_is_consistent() {
        command().debug_assert();
    }
}
