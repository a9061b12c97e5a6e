//! Inbound message routing.
//!
//! Every payload a client sends is relayed verbatim to all other open
//! connections, whatever its tag. Kill reports are additionally scored.

use crate::{
    connection::{ClientId, SessionId},
    messaging::{KillReport, Tag},
    state::RelayState,
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

/// Routes a text payload received from client `sender` on `session`.
///
/// # Message Flow
///
/// 1. Broadcast the payload unchanged to every other open connection
/// 2. If the payload carries the `K` tag, split out `<killer>;<killed>` and
///    credit the killer in the score table
///
/// Malformed kill reports are tolerated: an unparseable killer leaves the
/// score table untouched, and `killed` is carried along without affecting
/// any count.
///
/// # Returns
///
/// The number of connections the payload was relayed to.
pub fn route_client_message(state: &mut RelayState, sender: ClientId, session: SessionId, text: &str) -> usize {
    debug!("{}: {}", sender, text);

    let delivered = state.registry.broadcast(session, &Message::text(text));
    state.stats.messages_relayed += 1;

    if Tag::of(text) == Tag::Kill {
        if let Some(report) = KillReport::parse(text) {
            score_kill(state, sender, &report);
        }
    }

    delivered
}

/// Relays a binary payload from `sender` without interpreting it.
pub fn route_binary_message(state: &mut RelayState, sender: ClientId, session: SessionId, data: Message) -> usize {
    trace!("{}: <{} bytes>", sender, data.len());
    let delivered = state.registry.broadcast(session, &data);
    state.stats.messages_relayed += 1;
    delivered
}

fn score_kill(state: &mut RelayState, sender: ClientId, report: &KillReport<'_>) {
    let Some(killer) = report.killer_id() else {
        debug!(
            "Ignoring kill report from {} with unusable killer '{}'",
            sender, report.killer
        );
        return;
    };

    let kills = state.scores.credit_kill(killer);
    state.stats.kills_credited += 1;
    match report.killed_id() {
        Some(victim) => debug!("🎯 Client {} credited with kill on client {} (total {})", killer, victim, kills),
        None => debug!(
            "🎯 Client {} credited with kill on '{}' (total {})",
            killer,
            report.killed.unwrap_or_default(),
            kills
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdAllocation;
    use crate::connection::Registration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn join(state: &mut RelayState) -> (Registration, UnboundedReceiver<Message>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registration = state
            .connect("127.0.0.1:60000".parse().unwrap(), tx)
            .expect("connect refused");
        // discard the identity frame
        rx.try_recv().unwrap();
        (registration, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Message> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_payload_reaches_every_other_client_once() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, mut rx_a) = join(&mut state);
        let (_b, mut rx_b) = join(&mut state);
        let (_c, mut rx_c) = join(&mut state);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let delivered = route_client_message(&mut state, a.id, a.session, "P12.5;40.0");

        assert_eq!(delivered, 2);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![Message::text("P12.5;40.0")]);
        assert_eq!(drain(&mut rx_c), vec![Message::text("P12.5;40.0")]);
        assert_eq!(state.stats().messages_relayed, 1);
    }

    #[test]
    fn test_kill_from_absent_scores_one() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);

        route_client_message(&mut state, a.id, a.session, "K5;9");
        assert_eq!(state.scores().get(5), Some(1));

        route_client_message(&mut state, a.id, a.session, "K5;9");
        assert_eq!(state.scores().get(5), Some(2));
        assert_eq!(state.scores().get(9), None);
        assert_eq!(state.stats().kills_credited, 2);
    }

    #[test]
    fn test_kill_report_is_relayed_verbatim() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);
        let (_b, mut rx_b) = join(&mut state);

        route_client_message(&mut state, a.id, a.session, "K0;1");

        assert_eq!(drain(&mut rx_b), vec![Message::text("K0;1")]);
        assert_eq!(state.scores().get(0), Some(1));
    }

    #[test]
    fn test_malformed_kill_reports_are_tolerated() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);
        let (_b, mut rx_b) = join(&mut state);

        for payload in ["K", "K;", "Kx;y", "K999;1", "K-1;2"] {
            route_client_message(&mut state, a.id, a.session, payload);
        }
        route_client_message(&mut state, a.id, a.session, "K7");

        assert_eq!(drain(&mut rx_b).len(), 6);
        assert_eq!(state.scores().get(7), Some(1));
        assert_eq!(state.stats().kills_credited, 1);
    }

    #[test]
    fn test_padded_killer_tokens_share_a_score() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);

        route_client_message(&mut state, a.id, a.session, "K5;1");
        route_client_message(&mut state, a.id, a.session, "K05;1");
        route_client_message(&mut state, a.id, a.session, "K+5;1");

        assert_eq!(state.scores().get(5), Some(3));
    }

    #[test]
    fn test_clients_sharing_a_wrapped_id_hear_each_other() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let mut clients: Vec<_> = (0..256).map(|_| join(&mut state)).collect();
        let (newer, mut rx_newer) = join(&mut state);
        assert_eq!(newer.id, 0);
        drain(&mut clients[0].1);

        let (original, rx_original) = &mut clients[0];
        assert_eq!(route_client_message(&mut state, original.id, original.session, "P1;1"), 256);
        assert_eq!(drain(&mut rx_newer), vec![Message::text("P1;1")]);

        route_client_message(&mut state, newer.id, newer.session, "P2;2");
        assert_eq!(drain(rx_original), vec![Message::text("P2;2")]);
    }

    #[test]
    fn test_non_kill_tags_do_not_score() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);

        route_client_message(&mut state, a.id, a.session, "J5");
        route_client_message(&mut state, a.id, a.session, "k5;1");

        assert_eq!(state.scores().get(5), None);
        assert_eq!(state.stats().kills_credited, 0);
    }

    #[test]
    fn test_binary_relayed_without_scoring() {
        let mut state = RelayState::new(IdAllocation::Wrap);
        let (a, _rx_a) = join(&mut state);
        let (_b, mut rx_b) = join(&mut state);

        let frame = Message::binary(b"K1;2".to_vec());
        route_binary_message(&mut state, a.id, a.session, frame.clone());

        assert_eq!(drain(&mut rx_b), vec![frame]);
        assert_eq!(state.scores().get(1), None);
    }
}
