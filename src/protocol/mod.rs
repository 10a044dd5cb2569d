//! Protocol implementation module
//!
//! This module defines the REACTZ text frames, their encoding/decoding,
//! the room registry and the rendezvous state machine.

pub mod codec;
pub mod message;
pub mod room;
pub mod state;

pub use self::codec::MessageCodec;
pub use self::message::{Message, Outbound, RoomName, ScoreEntry};
pub use self::room::Room;
pub use self::state::{Rendezvous, RendezvousEvent, RendezvousState, Role, StateInfo, Step};

/// Default UDP port for protocol communication
pub const DEFAULT_PORT: u16 = 4444;
