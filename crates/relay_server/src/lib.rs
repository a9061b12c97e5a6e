//! # Relay Server
//!
//! A WebSocket relay for small multiplayer shooters. The server holds no game
//! logic beyond a kill counter: every text frame a client sends is forwarded
//! verbatim to every other open client, and kill reports additionally credit
//! the killer on a per-client score table.
//!
//! ## Wire Protocol
//!
//! Frames are UTF-8 text whose first character is a tag.
//!
//! | Direction        | Frame    | Meaning                                  |
//! |------------------|----------|------------------------------------------|
//! | server → client  | `I<id>`  | Your identifier (first frame you get)    |
//! | server → others  | `J<id>`  | Client `id` joined                       |
//! | server → others  | `L<id>`  | Client `id` left                         |
//! | client → others  | `K<a>;<b>` | `a` killed `b`; relayed, credits `a`   |
//! | client → others  | anything else | relayed verbatim                    |
//!
//! Identifiers are `0..=255`. The allocation counter wraps, so the 257th
//! connection is given `0` again; see [`IdAllocation`] for how collisions
//! with a still-open holder are treated.
//!
//! ## Concurrency
//!
//! The registry, the score table and the counters live together in one
//! [`RelayState`] behind a single `tokio::sync::Mutex`. Each connection runs
//! a reader and a writer task; the writer drains an unbounded queue, so a
//! broadcast only ever queues frames and never waits on a slow socket.
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_server::{create_server_with_config, ServerConfig, ShutdownState};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), relay_server::ServerError> {
//! let server = create_server_with_config(ServerConfig::default());
//! let shutdown = ShutdownState::new();
//! server.start_with_shutdown_state(shutdown).await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types and functions for easy access
pub use config::{IdAllocation, ServerConfig, DEFAULT_PORT};
pub use connection::{ClientId, SessionId};
pub use error::ServerError;
pub use scores::ScoreTable;
pub use server::RelayServer;
pub use shutdown::ShutdownState;
pub use state::{RelayState, RelayStats, SharedRelayState};
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod scores;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod utils;
