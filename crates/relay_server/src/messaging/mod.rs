//! Message parsing and routing for the relay protocol.
//!
//! This module defines the tagged text format exchanged with clients and the
//! router that relays payloads and scores kill reports.

pub mod router;
pub mod types;

pub use router::{route_binary_message, route_client_message};
pub use types::{KillReport, ServerAnnouncement, Tag};
