use std::fmt;

use tracing::{debug, info, warn};

use crate::core::{Identity, MAX_PLAYERS};
use super::message::RoomName;

/// A named, host-scoped rendezvous point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    name: RoomName,
    host: Identity,
    /// Join order, without duplicates and never containing the host
    players: Vec<Identity>,
}

impl Room {
    /// Creates a room with an empty roster
    pub fn create(name: RoomName, host: Identity) -> Self {
        Room {
            name,
            host,
            players: Vec::new(),
        }
    }

    pub fn name(&self) -> &RoomName {
        &self.name
    }

    pub fn host(&self) -> Identity {
        self.host
    }

    pub fn players(&self) -> &[Identity] {
        &self.players
    }

    pub fn has_player(&self, identity: &Identity) -> bool {
        self.players.contains(identity)
    }

    /// Whether the roster reached [`MAX_PLAYERS`]
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Appends a player, returning whether it was newly added
    pub fn add_player(&mut self, identity: Identity) -> bool {
        if identity == self.host || identity.is_broadcast() {
            debug!("Ignoring {} as a player of {}", identity, self.name);
            return false;
        }
        if self.players.contains(&identity) {
            debug!("Player {} is already in room {}", identity, self.name);
            return false;
        }
        if self.is_full() {
            warn!("Room {} is full, refusing {}", self.name, identity);
            return false;
        }

        self.players.push(identity);
        info!("Player {} added to room {}", identity, self.name);
        true
    }

    /// Players plus the host itself
    pub fn expected_participant_count(&self) -> usize {
        self.players.len() + 1
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Room(name={}, host={})", self.name, self.host)
    }
}
