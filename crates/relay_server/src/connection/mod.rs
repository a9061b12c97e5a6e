//! Connection tracking for relay clients.
//!
//! This module owns the registry of open connections, the identifier
//! allocation policy, and the skip-closed broadcast used by every relay path.

pub mod client;
pub mod registry;

pub use client::{ClientConnection, Outbound};
pub use registry::{ConnectionRegistry, Registration};

/// Wire-level client identifier.
///
/// Identifiers live in a fixed space of 256 values and are reused once the
/// allocation counter wraps.
pub type ClientId = u8;

/// Process-unique key for one accepted connection.
///
/// Unlike [`ClientId`], a session key is never reused, which lets the registry
/// tell two holders of the same wrapped identifier apart.
pub type SessionId = u64;

/// Size of the identifier space.
pub const ID_SPACE: usize = 256;
