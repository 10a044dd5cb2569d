use tracing::debug;

use crate::core::Identity;
use crate::protocol::ScoreEntry;

/// Reaction times of one round, in collection order
///
/// On the host the board fills up one report at a time and is published
/// exactly once when complete. On a client it is replaced wholesale by the
/// host's result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    entries: Vec<ScoreEntry>,
    published: bool,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a time, overwriting an earlier one from the same identity
    ///
    /// Returns whether the identity is new to the board.
    pub fn record(&mut self, identity: Identity, elapsed_ms: u32) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.identity == identity) {
            debug!("Overwriting time of {}: {} -> {}", identity, entry.elapsed_ms, elapsed_ms);
            entry.elapsed_ms = elapsed_ms;
            return false;
        }
        self.entries.push(ScoreEntry::new(identity, elapsed_ms));
        true
    }

    pub fn get(&self, identity: &Identity) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| &e.identity == identity)
            .map(|e| e.elapsed_ms)
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_complete(&self, expected: usize) -> bool {
        self.entries.len() == expected
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Hands out the final board the first time it is complete
    pub fn take_publication(&mut self, expected: usize) -> Option<Vec<ScoreEntry>> {
        if self.published || !self.is_complete(expected) {
            return None;
        }
        self.published = true;
        Some(self.entries.clone())
    }

    /// Replaces the board with a published result
    pub fn replace_all(&mut self, entries: Vec<ScoreEntry>) {
        self.entries = entries;
        self.published = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.published = false;
    }
}
