//! Error types for the relay server.

/// Enumeration of possible server errors.
///
/// Peer-level failures (a send that could not be queued, a malformed kill
/// report) never surface here; only failures that stop a listener or a
/// connection handler do.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or handshake issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}
