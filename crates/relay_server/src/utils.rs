//! Factory helpers for building relay servers.

use crate::{config::ServerConfig, server::RelayServer};

/// Creates a new relay server with default configuration.
///
/// The server binds `0.0.0.0:8887` once started.
///
/// # Example
///
/// ```rust
/// use relay_server::create_server;
///
/// let server = create_server();
/// assert_eq!(server.config().bind_address.port(), 8887);
/// ```
pub fn create_server() -> RelayServer {
    RelayServer::new(ServerConfig::default())
}

/// Creates a new relay server with custom configuration.
///
/// # Example
///
/// ```rust
/// use relay_server::{create_server_with_config, IdAllocation, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "127.0.0.1:9000".parse().unwrap(),
///     id_allocation: IdAllocation::SkipOccupied,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// assert_eq!(server.config().max_connections, 256);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> RelayServer {
    RelayServer::new(config)
}
