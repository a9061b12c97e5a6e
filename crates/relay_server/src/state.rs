//! Shared relay state and the connection lifecycle.
//!
//! `RelayState` bundles everything that connection handlers mutate: the
//! connection registry (with its identifier counter), the score table and
//! the relay counters. It is created once per server and shared behind a
//! single mutex, so every connect, message and close is applied as one
//! uninterrupted step against all three.

use crate::config::IdAllocation;
use crate::connection::{ClientId, ConnectionRegistry, Outbound, Registration, SessionId};
use crate::messaging::ServerAnnouncement;
use crate::scores::ScoreTable;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Handle to the relay state shared by the accept loop and every connection task.
pub type SharedRelayState = Arc<Mutex<RelayState>>;

/// Counters describing relay activity since startup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Connections that completed registration
    pub connections_accepted: u64,
    /// Connections turned away by the ceiling or a full identifier space
    pub connections_refused: u64,
    /// Inbound payloads relayed to peers
    pub messages_relayed: u64,
    /// Kill reports that credited a killer
    pub kills_credited: u64,
    /// Registrations that reused an identifier still held by an open connection
    pub id_collisions: u64,
}

/// Registry, score table and counters for one relay instance.
#[derive(Debug)]
pub struct RelayState {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) scores: ScoreTable,
    pub(crate) stats: RelayStats,
}

impl RelayState {
    pub fn new(policy: IdAllocation) -> Self {
        Self {
            registry: ConnectionRegistry::new(policy),
            scores: ScoreTable::new(),
            stats: RelayStats::default(),
        }
    }

    /// Wraps a fresh state for sharing across tasks.
    pub fn shared(policy: IdAllocation) -> SharedRelayState {
        Arc::new(Mutex::new(Self::new(policy)))
    }

    /// Registers a new client and announces it.
    ///
    /// The new client's first queued frame is its `I<id>` identity; every
    /// other open client then receives `J<id>`. Returns `None` when no
    /// identifier can be assigned.
    pub fn connect(&mut self, remote_addr: SocketAddr, outbound: Outbound) -> Option<Registration> {
        let Some(registration) = self.registry.register(remote_addr, outbound) else {
            warn!("🚫 No free identifier for {}, refusing connection", remote_addr);
            self.stats.connections_refused += 1;
            return None;
        };
        let id = registration.id;

        if registration.displaced.is_some() {
            self.stats.id_collisions += 1;
        }
        self.stats.connections_accepted += 1;

        self.scores.reset(id);
        self.registry
            .send_to(registration.session, ServerAnnouncement::Identity(id).to_message());
        let notified = self
            .registry
            .broadcast(registration.session, &ServerAnnouncement::Join(id).to_message());

        info!("👋 Client {} joined from {} ({} peer(s) notified)", id, remote_addr, notified);
        Some(registration)
    }

    /// Announces a departure and forgets the client.
    ///
    /// Only the session that currently holds `id` triggers `L<id>`; a session
    /// that was displaced by a wrapped identifier is unregistered silently so
    /// the newer holder is neither announced as gone nor stripped of its score.
    pub fn disconnect(&mut self, id: ClientId, session: SessionId) {
        if !self.registry.holds(id, session) {
            self.registry.unregister(session);
            debug!("Displaced session {} for client {} closed", session, id);
            return;
        }

        let notified = self
            .registry
            .broadcast(session, &ServerAnnouncement::Leave(id).to_message());
        self.scores.clear(id);
        self.registry.unregister(session);

        info!("👋 Client {} left ({} peer(s) notified)", id, notified);
    }

    /// Records a connection turned away before registration.
    pub fn record_refused(&mut self) {
        self.stats.connections_refused += 1;
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_tungstenite::tungstenite::Message;

    fn addr() -> SocketAddr {
        "127.0.0.1:55555".parse().unwrap()
    }

    fn join(state: &mut RelayState) -> (Registration, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registration = state.connect(addr(), tx).expect("connect refused");
        (registration, rx)
    }

    fn texts(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame.to_text().unwrap().to_owned());
        }
        frames
    }

    #[test]
    fn test_connect_sends_identity_then_announces_join() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (first, mut rx_first) = join(&mut state);
        assert_eq!(texts(&mut rx_first), vec!["I0"]);

        let (second, mut rx_second) = join(&mut state);
        assert_eq!(second.id, 1);
        assert_eq!(texts(&mut rx_second), vec!["I1"]);
        assert_eq!(texts(&mut rx_first), vec!["J1"]);

        assert_eq!(state.scores().get(first.id), Some(0));
        assert_eq!(state.scores().get(second.id), Some(0));
        assert_eq!(state.stats().connections_accepted, 2);
    }

    #[test]
    fn test_disconnect_announces_leave_and_clears_score() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, mut rx_a) = join(&mut state);
        let (b, mut rx_b) = join(&mut state);
        texts(&mut rx_a);
        texts(&mut rx_b);

        state.disconnect(b.id, b.session);

        assert_eq!(texts(&mut rx_a), vec!["L1"]);
        assert!(texts(&mut rx_b).is_empty());
        assert_eq!(state.scores().get(b.id), None);
        assert_eq!(state.connection_count(), 1);
        assert!(state.registry().holds(a.id, a.session));
    }

    #[test]
    fn test_displaced_session_leaves_silently() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let mut clients = Vec::new();
        for _ in 0..256 {
            clients.push(join(&mut state));
        }
        let (newer, mut rx_newer) = join(&mut state);
        assert_eq!(newer.id, 0);
        assert_eq!(state.stats().id_collisions, 1);
        assert_eq!(state.connection_count(), 257);
        assert_eq!(texts(&mut rx_newer), vec!["I0"]);
        // the displaced holder of id 0 hears the newer one join
        assert_eq!(texts(&mut clients[0].1).last().map(String::as_str), Some("J0"));
        texts(&mut clients[1].1);

        let (original, _) = &clients[0];
        state.disconnect(original.id, original.session);

        assert_eq!(state.connection_count(), 256);
        assert!(state.registry().holds(0, newer.session));
        assert_eq!(state.scores().get(0), Some(0));
        assert!(texts(&mut clients[1].1).is_empty());
        assert!(texts(&mut rx_newer).is_empty());

        state.disconnect(newer.id, newer.session);
        assert_eq!(texts(&mut clients[1].1), vec!["L0"]);
        assert_eq!(state.scores().get(0), None);
    }

    #[test]
    fn test_full_identifier_space_refuses() {
        let mut state = RelayState::new(IdAllocation::SkipOccupied);
        let mut clients = Vec::new();
        for _ in 0..256 {
            clients.push(join(&mut state));
        }
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(state.connect(addr(), tx).is_none());
        assert_eq!(state.stats().connections_refused, 1);
    }
}
