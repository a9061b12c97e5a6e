//! Core relay server implementation.
//!
//! This module contains the `RelayServer` struct: it owns the shared relay
//! state, binds the listener, runs the accept loop and hands every accepted
//! socket to its own connection task.

use crate::{
    config::ServerConfig,
    error::ServerError,
    server::handlers::handle_connection,
    shutdown::ShutdownState,
    state::{RelayState, RelayStats, SharedRelayState},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

/// The relay server.
///
/// # Architecture
///
/// * **Relay State**: registry, score table and counters behind one mutex
/// * **Accept Loop**: admits sockets while a connection slot is free
/// * **Connection Tasks**: one task per client running the lifecycle in
///   [`handle_connection`]
pub struct RelayServer {
    /// Server configuration settings
    config: ServerConfig,

    /// State shared with every connection task
    state: SharedRelayState,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    /// One permit per allowed connection, `None` when unlimited
    connection_slots: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Creates a new relay server with the specified configuration.
    ///
    /// The relay state is created here and lives as long as the server.
    pub fn new(config: ServerConfig) -> Self {
        let state = RelayState::shared(config.id_allocation);
        let (shutdown_sender, _) = broadcast::channel(1);
        let connection_slots = config
            .connection_limit()
            .map(|limit| Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS))));

        Self {
            config,
            state,
            shutdown_sender,
            connection_slots,
        }
    }

    /// Binds the configured address and relays until shutdown is initiated
    /// through `shutdown_state`.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, Some(shutdown_state)).await
    }

    /// Binds the configured address and relays until [`RelayServer::shutdown`]
    /// is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, None).await
    }

    /// Binds a TCP listener on the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| {
                ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address))
            })
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// Returns when shutdown is initiated, either through `shutdown_state`
    /// or [`RelayServer::shutdown`]. Open connections are then asked to
    /// close.
    pub async fn serve(&self, listener: TcpListener, shutdown_state: Option<ShutdownState>) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;
        info!("🚀 Relay listening on ws://{}", local_addr);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr).await,
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                _ = wait_for(&shutdown_state) => {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("🧹 Closing open connections...");
        let closing = self.state.lock().await.registry().close_all("Server shutting down");
        info!("✅ Asked {} connection(s) to close", closing);
        Ok(())
    }

    /// Hands an accepted socket to its own connection task.
    ///
    /// A slot is taken here, before the handshake, and held by the task until
    /// the connection is cleaned up, so handshakes in flight count against
    /// the ceiling too.
    async fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let permit = match &self.connection_slots {
            Some(slots) => match slots.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(
                        "🚫 Refusing {}: connection ceiling of {} reached",
                        addr, self.config.max_connections
                    );
                    self.state.lock().await.record_refused();
                    return;
                }
            },
            None => None,
        };

        debug!("🔗 Accepted TCP connection from {}", addr);
        let state = self.state.clone();
        let max_message_size = self.config.max_message_size;
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, addr, state, max_message_size).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }

    /// Initiates server shutdown.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down relay...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets the shared relay state.
    pub fn state(&self) -> SharedRelayState {
        self.state.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current relay counters.
    pub async fn stats(&self) -> RelayStats {
        self.state.lock().await.stats()
    }
}

async fn wait_for(shutdown_state: &Option<ShutdownState>) {
    match shutdown_state {
        Some(state) => state.wait_for_shutdown().await,
        None => std::future::pending().await,
    }
}
