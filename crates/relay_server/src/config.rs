//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the relay.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Port the relay listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8887;

/// How the registry picks an identifier once the counter has wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdAllocation {
    /// Hand out the counter value unconditionally, even if an open
    /// connection still holds it. Both connections stay open and keep
    /// relaying; the newer one becomes the holder whose departure is
    /// announced, and the collision is logged.
    #[default]
    Wrap,
    /// Scan forward from the counter to the next identifier no open
    /// connection holds, refusing the connection if all 256 are taken.
    SkipOccupied,
}

/// Configuration structure for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections (0 for no limit)
    pub max_connections: usize,

    /// Largest accepted WebSocket message in bytes
    pub max_message_size: usize,

    /// Identifier allocation policy
    pub id_allocation: IdAllocation,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 256,
            max_message_size: 64 * 1024, // 64KB
            id_allocation: IdAllocation::default(),
        }
    }
}

impl ServerConfig {
    /// Number of connection slots, or `None` when connections are unlimited.
    pub fn connection_limit(&self) -> Option<usize> {
        (self.max_connections > 0).then_some(self.max_connections)
    }
}
