//! Kill counters keyed by client identifier.
//!
//! Entries are never removed: a departing client's entry is cleared to the
//! absent state instead, and a new holder of a wrapped identifier starts from
//! a fresh 0 so it never inherits the previous holder's count.

use crate::connection::ClientId;
use std::collections::HashMap;

/// Mapping from client identifier to kill count.
#[derive(Debug, Default, Clone)]
pub struct ScoreTable {
    scores: HashMap<ClientId, Option<u32>>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a freshly connected client at zero kills.
    pub fn reset(&mut self, id: ClientId) {
        self.scores.insert(id, Some(0));
    }

    /// Clears a departed client's entry to the absent state.
    pub fn clear(&mut self, id: ClientId) {
        self.scores.insert(id, None);
    }

    /// Credits `killer` with one kill and returns the new count.
    ///
    /// A positive count is incremented. Anything else (no entry, a cleared
    /// entry, or an explicit zero) is treated as "no kills yet" and set to 1.
    pub fn credit_kill(&mut self, killer: ClientId) -> u32 {
        let entry = self.scores.entry(killer).or_insert(None);
        let count = match *entry {
            Some(kills) if kills > 0 => kills + 1,
            _ => 1,
        };
        *entry = Some(count);
        count
    }

    /// Current count for `id`, or `None` when absent or cleared.
    pub fn get(&self, id: ClientId) -> Option<u32> {
        self.scores.get(&id).copied().flatten()
    }

    /// Live entries sorted by descending kills, then ascending identifier.
    pub fn leaderboard(&self) -> Vec<(ClientId, u32)> {
        let mut board: Vec<(ClientId, u32)> = self
            .scores
            .iter()
            .filter_map(|(&id, &kills)| kills.map(|kills| (id, kills)))
            .collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        board
    }
}
