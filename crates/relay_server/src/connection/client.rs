//! Client connection representation.
//!
//! A `ClientConnection` is the registry's non-owning view of a live link: the
//! socket itself belongs to the connection task, the registry only keeps the
//! sending half of that task's outbound queue.

use super::{ClientId, SessionId};
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Sending half of a connection's outbound frame queue.
pub type Outbound = mpsc::UnboundedSender<Message>;

/// Represents an individual client connection to the relay.
///
/// # Fields
///
/// * `id` - Wire identifier announced to every client
/// * `session` - Never-reused key for this particular accept
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was registered
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ClientId,
    pub session: SessionId,
    pub remote_addr: SocketAddr,
    pub connected_at: SystemTime,
    outbound: Outbound,
}

impl ClientConnection {
    /// Creates a connection record around an outbound queue.
    pub fn new(id: ClientId, session: SessionId, remote_addr: SocketAddr, outbound: Outbound) -> Self {
        Self {
            id,
            session,
            remote_addr,
            connected_at: SystemTime::now(),
            outbound,
        }
    }

    /// Whether the transport behind this connection still accepts frames.
    ///
    /// The writer task drops its receiver as soon as the socket fails or
    /// closes, so a closed queue means a closed transport.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queues a frame for delivery without waiting on the socket.
    ///
    /// Returns `false` when the transport has already gone away.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_send_reaches_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ClientConnection::new(3, 1, addr(), tx);

        assert!(connection.is_open());
        assert!(connection.send(Message::text("hello")));
        assert_eq!(rx.try_recv().unwrap(), Message::text("hello"));
    }

    #[test]
    fn test_closed_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = ClientConnection::new(3, 1, addr(), tx);
        drop(rx);

        assert!(!connection.is_open());
        assert!(!connection.send(Message::text("lost")));
    }
}
