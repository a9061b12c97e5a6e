//! Signal handling for graceful relay shutdown.
//!
//! The first signal starts a graceful shutdown; the application keeps
//! listening and exits immediately on a second one.

use relay_server::ShutdownState;
use tokio::signal;
use tracing::info;

/// Resolves on the next termination signal.
///
/// * **Unix platforms**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}

/// Waits for a termination signal, then initiates `shutdown_state`.
pub async fn setup_signal_handlers(shutdown_state: &ShutdownState) -> std::io::Result<()> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    shutdown_state.initiate_shutdown();
    Ok(())
}
