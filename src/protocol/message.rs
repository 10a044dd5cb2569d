use std::fmt;

use crate::core::{Identity, ProtocolError, MAX_ROOM_NAME_LEN};
use crate::util::words;

/// Human-readable room name, also the correlation key of a round
///
/// Names are printable ASCII words separated by single spaces. They never
/// contain `,` or `:`, which delimit scoreboard entries on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Validates and wraps a room name
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_ROOM_NAME_LEN {
            return Err(ProtocolError::MalformedFrame(format!(
                "room name must be 1..={MAX_ROOM_NAME_LEN} bytes"
            )));
        }
        if !name.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(ProtocolError::MalformedFrame("room name is not printable ASCII".into()));
        }
        if name.contains(',') || name.contains(':') {
            return Err(ProtocolError::MalformedFrame("room name contains a delimiter".into()));
        }
        if name.split(' ').any(str::is_empty) {
            return Err(ProtocolError::MalformedFrame("room name has stray spaces".into()));
        }
        Ok(RoomName(name))
    }

    /// Draws a two-word name from the room vocabulary
    pub fn generate<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        RoomName(format!("{} {}", words::pick(rng), words::pick(rng)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a scoreboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEntry {
    pub identity: Identity,
    pub elapsed_ms: u32,
}

impl ScoreEntry {
    pub fn new(identity: Identity, elapsed_ms: u32) -> Self {
        ScoreEntry { identity, elapsed_ms }
    }
}

/// Protocol message types exchanged between host and clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Host → everyone: a room is open
    Advertise {
        room: RoomName,
    },

    /// Client → host: request to enter the room
    Join {
        room: RoomName,
    },

    /// Host → client: the join request was accepted
    JoinAck {
        room: RoomName,
    },

    /// Host → everyone: arm after `delay_ms`
    Start {
        room: RoomName,
        delay_ms: u32,
    },

    /// Client → host: measured reaction time
    Time {
        room: RoomName,
        elapsed_ms: u32,
    },

    /// Host → everyone: final scoreboard in collection order
    Result {
        room: RoomName,
        entries: Vec<ScoreEntry>,
    },
}

impl Message {
    /// Room the message belongs to
    pub fn room(&self) -> &RoomName {
        match self {
            Message::Advertise { room }
            | Message::Join { room }
            | Message::JoinAck { room }
            | Message::Start { room, .. }
            | Message::Time { room, .. }
            | Message::Result { room, .. } => room,
        }
    }

    /// Wire tag of the message
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Advertise { .. } => "HOST",
            Message::Join { .. } => "JOIN",
            Message::JoinAck { .. } => "JOINED",
            Message::Start { .. } => "START",
            Message::Time { .. } => "TIME",
            Message::Result { .. } => "RESULT",
        }
    }

    pub fn is_for(&self, room: &RoomName) -> bool {
        self.room() == room
    }
}

/// A message together with where it has to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Broadcast(Message),
    Unicast(Identity, Message),
}

impl Outbound {
    pub fn message(&self) -> &Message {
        match self {
            Outbound::Broadcast(message) | Outbound::Unicast(_, message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_room_name_validation() {
        assert!(RoomName::new("banana fish").is_ok());
        assert!(RoomName::new("kite").is_ok());

        assert!(RoomName::new("").is_err());
        assert!(RoomName::new(" banana").is_err());
        assert!(RoomName::new("banana  fish").is_err());
        assert!(RoomName::new("banana fish ").is_err());
        assert!(RoomName::new("a:b").is_err());
        assert!(RoomName::new("a,b").is_err());
        assert!(RoomName::new("tab\tname").is_err());
        assert!(RoomName::new("x".repeat(MAX_ROOM_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_generated_names_are_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let name = RoomName::generate(&mut rng);
            assert_eq!(name.as_str().split(' ').count(), 2);
            assert_eq!(RoomName::new(name.as_str()).unwrap(), name);
        }
    }

    #[test]
    fn test_message_accessors() {
        let room = RoomName::new("banana fish").unwrap();
        let other = RoomName::new("coral kite").unwrap();
        let start = Message::Start { room: room.clone(), delay_ms: 1200 };

        assert_eq!(start.tag(), "START");
        assert_eq!(start.room(), &room);
        assert!(start.is_for(&room));
        assert!(!start.is_for(&other));
    }
}
