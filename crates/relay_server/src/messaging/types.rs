//! Wire message types for the relay protocol.
//!
//! Every payload is a short UTF-8 string whose first character is its tag:
//!
//! | Tag | Direction | Body |
//! |-----|-----------|------|
//! | `I` | server -> new client | assigned identifier |
//! | `J` | server -> others | identifier that joined |
//! | `L` | server -> others | identifier that left |
//! | `K` | client -> others | `<killer>;<killed>` |
//!
//! Any other leading character marks an opaque payload (positions, chat,
//! state) that the relay forwards without looking inside.

use crate::connection::ClientId;
use std::fmt;
use tokio_tungstenite::tungstenite::Message;

/// Leading character of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Identity,
    Join,
    Leave,
    Kill,
    Untagged,
}

impl Tag {
    /// Classifies a payload by its first character.
    pub fn of(payload: &str) -> Self {
        match payload.chars().next() {
            Some('I') => Tag::Identity,
            Some('J') => Tag::Join,
            Some('L') => Tag::Leave,
            Some('K') => Tag::Kill,
            _ => Tag::Untagged,
        }
    }

    /// Wire character for tagged payloads.
    pub fn as_char(self) -> Option<char> {
        match self {
            Tag::Identity => Some('I'),
            Tag::Join => Some('J'),
            Tag::Leave => Some('L'),
            Tag::Kill => Some('K'),
            Tag::Untagged => None,
        }
    }
}

/// A kill report split out of a `K` payload.
///
/// Tokens are kept as received. The relay does not check that they name
/// registered clients, nor that there are exactly two of them: a missing
/// second token leaves `killed` empty and extra tokens are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillReport<'a> {
    pub killer: &'a str,
    pub killed: Option<&'a str>,
}

impl<'a> KillReport<'a> {
    /// Parses a full payload, returning `None` unless it carries the `K` tag.
    pub fn parse(payload: &'a str) -> Option<Self> {
        let body = payload.strip_prefix('K')?;
        let mut tokens = body.split(';');
        let killer = tokens.next().unwrap_or_default();
        let killed = tokens.next();
        Some(Self { killer, killed })
    }

    /// Killer token as an identifier, if it is one.
    ///
    /// Tokens are read as decimal numbers, so `"05"` and `"+5"` both name
    /// client 5 and credit the same score entry.
    pub fn killer_id(&self) -> Option<ClientId> {
        self.killer.parse().ok()
    }

    /// Killed token as an identifier, if present and valid.
    pub fn killed_id(&self) -> Option<ClientId> {
        self.killed.and_then(|token| token.parse().ok())
    }
}

/// Messages originated by the relay itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAnnouncement {
    /// Private identity assignment for a new client
    Identity(ClientId),
    /// A client joined
    Join(ClientId),
    /// A client left
    Leave(ClientId),
}

impl ServerAnnouncement {
    pub fn tag(&self) -> Tag {
        match self {
            ServerAnnouncement::Identity(_) => Tag::Identity,
            ServerAnnouncement::Join(_) => Tag::Join,
            ServerAnnouncement::Leave(_) => Tag::Leave,
        }
    }

    /// Encodes the announcement as a text frame.
    pub fn to_message(&self) -> Message {
        Message::text(self.to_string())
    }
}

impl fmt::Display for ServerAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            ServerAnnouncement::Identity(id)
            | ServerAnnouncement::Join(id)
            | ServerAnnouncement::Leave(id) => id,
        };
        match self.tag().as_char() {
            Some(tag) => write!(f, "{tag}{id}"),
            None => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_classification() {
        assert_eq!(Tag::of("I3"), Tag::Identity);
        assert_eq!(Tag::of("J12"), Tag::Join);
        assert_eq!(Tag::of("L0"), Tag::Leave);
        assert_eq!(Tag::of("K5;9"), Tag::Kill);
        assert_eq!(Tag::of("P10.5;3.2"), Tag::Untagged);
        assert_eq!(Tag::of("k5;9"), Tag::Untagged);
        assert_eq!(Tag::of(""), Tag::Untagged);
    }

    #[test]
    fn test_announcements_encode_decimal_ids() {
        assert_eq!(ServerAnnouncement::Identity(0).to_string(), "I0");
        assert_eq!(ServerAnnouncement::Join(42).to_string(), "J42");
        assert_eq!(ServerAnnouncement::Leave(255).to_string(), "L255");
        assert_eq!(ServerAnnouncement::Join(7).to_message(), Message::text("J7"));
    }

    #[test]
    fn test_kill_report_two_tokens() {
        let report = KillReport::parse("K5;9").unwrap();
        assert_eq!(report.killer, "5");
        assert_eq!(report.killed, Some("9"));
        assert_eq!(report.killer_id(), Some(5));
        assert_eq!(report.killed_id(), Some(9));
    }

    #[test]
    fn test_kill_report_missing_second_token() {
        let report = KillReport::parse("K5").unwrap();
        assert_eq!(report.killer_id(), Some(5));
        assert_eq!(report.killed, None);
        assert_eq!(report.killed_id(), None);
    }

    #[test]
    fn test_kill_report_extra_tokens_ignored() {
        let report = KillReport::parse("K1;2;3;4").unwrap();
        assert_eq!(report.killer_id(), Some(1));
        assert_eq!(report.killed_id(), Some(2));
    }

    #[test]
    fn test_kill_report_malformed_ids() {
        let empty = KillReport::parse("K").unwrap();
        assert_eq!(empty.killer, "");
        assert_eq!(empty.killer_id(), None);

        let words = KillReport::parse("Kbob;alice").unwrap();
        assert_eq!(words.killer_id(), None);
        assert_eq!(words.killed_id(), None);

        let out_of_range = KillReport::parse("K300;1").unwrap();
        assert_eq!(out_of_range.killer_id(), None);
    }

    #[test]
    fn test_kill_report_ids_are_normalised() {
        for payload in ["K5;1", "K05;1", "K+5;1", "K005;01"] {
            let report = KillReport::parse(payload).unwrap();
            assert_eq!(report.killer_id(), Some(5), "{payload}");
            assert_eq!(report.killed_id(), Some(1), "{payload}");
        }
        assert_eq!(KillReport::parse("K 5;1").unwrap().killer_id(), None);
    }

    #[test]
    fn test_non_kill_payload_not_parsed() {
        assert!(KillReport::parse("J5").is_none());
        assert!(KillReport::parse("hello").is_none());
    }
}
