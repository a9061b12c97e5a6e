//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates relay
//! startup, scoreboard reporting and graceful shutdown.

use crate::{
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, wait_for_signal},
};
use relay_server::{RelayServer, ServerError, SharedRelayState, ShutdownState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info, warn};

/// Number of leaderboard entries included in each report.
const LEADERBOARD_SIZE: usize = 10;

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: Validates the merged file and CLI configuration
/// * **Server Orchestration**: Owns the relay server and its accept loop task
/// * **Scoreboard Reporting**: Logs the leaderboard and relay counters periodically
/// * **Graceful Shutdown**: Handles termination signals and cleanup
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// File the configuration came from
    config_path: PathBuf,
    /// Relay server instance
    server: Arc<RelayServer>,
}

impl Application {
    /// Creates a new application from an already merged configuration.
    ///
    /// # Process
    ///
    /// 1. Validate the configuration
    /// 2. Display startup banner
    /// 3. Initialize the relay server with the converted configuration
    pub fn new(config: AppConfig, config_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = Arc::new(RelayServer::new(server_config));

        info!("📂 Config: {}", config_path.display());

        Ok(Self {
            config,
            config_path: config_path.to_path_buf(),
            server,
        })
    }

    /// Runs the relay until a shutdown signal arrives or the server fails.
    ///
    /// # Shutdown Phases
    ///
    /// 1. Stop scoreboard reporting
    /// 2. Stop the accept loop, which asks every open client to close
    /// 3. Wait briefly for connections to drain
    /// 4. Log the final leaderboard and counters
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Frag Relay");
        self.log_configuration_summary();

        let shutdown_state = ShutdownState::new();
        let state = self.server.state();

        let mut server_handle = {
            let server = self.server.clone();
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move { server.start_with_shutdown_state(shutdown_state).await })
        };

        let monitoring_handle = {
            let state = state.clone();
            let interval_secs = self.config.scoreboard.report_interval_secs;

            tokio::spawn(async move {
                if interval_secs == 0 {
                    return;
                }
                let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately
                interval.tick().await;

                loop {
                    interval.tick().await;
                    log_scoreboard(&state, "📊 Scoreboard").await;
                }
            })
        };

        info!("✅ Frag Relay is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            self.config.server.bind_address
        );
        if self.config.scoreboard.report_interval_secs > 0 {
            info!(
                "🔍 Scoreboard reports every {} seconds",
                self.config.scoreboard.report_interval_secs
            );
        }
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            finished = &mut server_handle => {
                monitoring_handle.abort();
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(ServerError::Internal(format!("Server task failed: {e}")).into()),
                };
            }
            signal = setup_signal_handlers(&shutdown_state) => signal?,
        }

        // merciless shutdown
        {
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move {
                if let Err(e) = wait_for_signal().await {
                    error!("Failed to set up merciless shutdown signal handler: {e}");
                    return;
                }
                if shutdown_state.is_shutdown_complete() {
                    info!("Shutdown already complete, letting it finish");
                    return;
                }

                warn!("Shutdown handler received again! I'll make this quick.");
                std::process::exit(1);
            });
        }

        info!("📡 Phase 1: Stopping scoreboard reports...");
        monitoring_handle.abort();

        info!("🧹 Phase 2: Stopping accept loop and closing connections...");
        match tokio::time::timeout(Duration::from_secs(5), server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Accept loop stopped"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => warn!("⏰ Accept loop did not stop within timeout, proceeding with cleanup"),
        }

        info!("⏳ Phase 3: Waiting for connections to close...");
        let mut wait_cycles = 0;
        const MAX_WAIT_CYCLES: u32 = 30; // 30 * 100ms

        while wait_cycles < MAX_WAIT_CYCLES {
            if state.lock().await.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            wait_cycles += 1;
        }

        let remaining = state.lock().await.connection_count();
        if remaining > 0 {
            info!("⏰ Timeout reached with {} connection(s) still open", remaining);
        } else {
            info!("✅ All connections closed");
        }

        shutdown_state.complete_shutdown();

        log_scoreboard(&state, "📊 Final Scoreboard").await;
        info!("✅ Frag Relay shutdown complete");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📂 Config file: {}", self.config_path.display());
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        if self.config.server.max_connections == 0 {
            info!("  👥 Max connections: unlimited");
        } else {
            info!("  👥 Max connections: {}", self.config.server.max_connections);
        }
        info!(
            "  📦 Max message size: {} bytes",
            self.config.server.max_message_size
        );
        info!("  🔢 Id allocation: {:?}", self.config.server.id_allocation);
    }
}

/// Logs relay counters and the current leaderboard.
async fn log_scoreboard(state: &SharedRelayState, heading: &str) {
    let (stats, connections, leaderboard) = {
        let state = state.lock().await;
        (state.stats(), state.connection_count(), state.scores().leaderboard())
    };

    info!(
        "{} - {} connected | {} accepted | {} refused | {} relayed | {} kills | {} id collisions",
        heading,
        connections,
        stats.connections_accepted,
        stats.connections_refused,
        stats.messages_relayed,
        stats.kills_credited,
        stats.id_collisions
    );

    for (rank, (id, kills)) in leaderboard.iter().take(LEADERBOARD_SIZE).enumerate() {
        info!("  🏆 #{} client {} - {} kill(s)", rank + 1, id, kills);
    }
}
