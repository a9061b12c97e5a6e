//! Registry of open connections and identifier allocation.
//!
//! The registry is a plain owned collection. It performs no locking of its
//! own: the relay keeps it inside the single mutex that also guards the score
//! table, so allocation, registration and broadcast are applied atomically
//! per event.

use super::{client::ClientConnection, client::Outbound, ClientId, SessionId, ID_SPACE};
use crate::config::IdAllocation;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

/// Outcome of a successful [`ConnectionRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Identifier assigned to the new connection
    pub id: ClientId,
    /// Never-reused key of the new connection
    pub session: SessionId,
    /// Session that held `id` until now; it stays connected but no longer owns the id
    pub displaced: Option<SessionId>,
}

/// Central registry for all open relay connections.
///
/// Connections are keyed by session, so two connections that ended up with
/// the same wrapped identifier are both kept and both relayed to. For every
/// identifier the registry also remembers its current holder, which is the
/// most recent session it was handed to. Identifiers come from a monotonic
/// counter that wraps to 0 after 255; what happens when the counter lands on
/// an identifier that is still held is decided by the configured
/// [`IdAllocation`] policy.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: HashMap<SessionId, ClientConnection>,
    holders: HashMap<ClientId, SessionId>,
    next_id: usize,
    next_session: SessionId,
    policy: IdAllocation,
}

impl ConnectionRegistry {
    /// Creates an empty registry using the given allocation policy.
    pub fn new(policy: IdAllocation) -> Self {
        Self {
            connections: HashMap::new(),
            holders: HashMap::new(),
            next_id: 0,
            next_session: 1,
            policy,
        }
    }

    /// Allocates an identifier and records the connection under a new session.
    ///
    /// Returns `None` only under [`IdAllocation::SkipOccupied`] when all 256
    /// identifiers are held by open connections.
    pub fn register(&mut self, remote_addr: SocketAddr, outbound: Outbound) -> Option<Registration> {
        let id = self.allocate_id()?;
        let session = self.next_session;
        self.next_session += 1;

        let displaced = self.holders.insert(id, session);
        if let Some(previous) = displaced.and_then(|previous| self.connections.get(&previous)) {
            warn!(
                "⚠️ Identifier {} reassigned while session {} from {} still holds it",
                id, previous.session, previous.remote_addr
            );
        }

        self.connections
            .insert(session, ClientConnection::new(id, session, remote_addr, outbound));

        debug!("📝 Registered client {} (session {}) from {}", id, session, remote_addr);
        Some(Registration { id, session, displaced })
    }

    fn allocate_id(&mut self) -> Option<ClientId> {
        match self.policy {
            IdAllocation::Wrap => {
                let id = self.next_id;
                self.next_id = (self.next_id + 1) % ID_SPACE;
                Some(id as ClientId)
            }
            IdAllocation::SkipOccupied => {
                for offset in 0..ID_SPACE {
                    let candidate = (self.next_id + offset) % ID_SPACE;
                    if !self.holders.contains_key(&(candidate as ClientId)) {
                        self.next_id = (candidate + 1) % ID_SPACE;
                        return Some(candidate as ClientId);
                    }
                }
                None
            }
        }
    }

    /// Removes the connection registered under `session`.
    ///
    /// The identifier is released only if `session` is still its holder, so
    /// a displaced connection closing never frees the newer holder's id.
    pub fn unregister(&mut self, session: SessionId) -> Option<ClientConnection> {
        let removed = self.connections.remove(&session)?;
        if self.holders.get(&removed.id) == Some(&session) {
            self.holders.remove(&removed.id);
        }
        debug!("🗑️ Unregistered client {} (session {})", removed.id, session);
        Some(removed)
    }

    /// Whether `id` is currently held by `session`.
    pub fn holds(&self, id: ClientId, session: SessionId) -> bool {
        self.holders.get(&id) == Some(&session)
    }

    /// Delivers `message` to every open connection except the `sender` session.
    ///
    /// Connections whose transport has closed are skipped. A failed send to
    /// one peer never stops delivery to the rest.
    ///
    /// # Returns
    ///
    /// The number of connections the message was queued for.
    pub fn broadcast(&self, sender: SessionId, message: &Message) -> usize {
        let mut delivered = 0;
        for (&session, connection) in &self.connections {
            if session == sender || !connection.is_open() {
                continue;
            }
            if connection.send(message.clone()) {
                delivered += 1;
            } else {
                trace!("Skipping client {}: transport closed during broadcast", connection.id);
            }
        }
        trace!("📡 Broadcast from session {} reached {} connection(s)", sender, delivered);
        delivered
    }

    /// Sends a message to a single connection.
    ///
    /// Returns `false` if `session` is not registered or its transport is closed.
    pub fn send_to(&self, session: SessionId, message: Message) -> bool {
        self.connections
            .get(&session)
            .is_some_and(|connection| connection.is_open() && connection.send(message))
    }

    /// Queues a going-away close frame for every open connection.
    ///
    /// Each connection's writer stops after sending it, which in turn runs
    /// the normal departure path for that client.
    pub fn close_all(&self, reason: &str) -> usize {
        let frame = Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: reason.to_owned().into(),
        }));
        self.connections
            .values()
            .filter(|connection| connection.is_open() && connection.send(frame.clone()))
            .count()
    }

    /// The connection that currently holds `id`.
    pub fn holder(&self, id: ClientId) -> Option<&ClientConnection> {
        self.holders
            .get(&id)
            .and_then(|session| self.connections.get(session))
    }

    /// Number of registered connections, displaced ones included.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Held identifiers in ascending order.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.holders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
