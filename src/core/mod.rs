//! Core types and traits for the Reactz protocol
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{EncodeError, Error, ProtocolError, Result, RoundError, TransportError};
pub use self::types::{Config, DelayRange, Identity};

/// Literal prefix carried by every frame of this protocol
pub const TAG_PREFIX: &str = "REACTZ ";

/// Maximum datagram payload in bytes
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Length of a device identity in bytes
pub const IDENTITY_LEN: usize = 6;

/// Maximum length of a room name in bytes
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Largest start delay accepted from the wire
pub const MAX_START_DELAY_MS: u32 = 60_000;

/// Widest `RESULT` entry: hex identity, `:`, a full u32 and the `,` separator
const RESULT_ENTRY_LEN: usize = IDENTITY_LEN * 2 + 1 + 10 + 1;

/// `REACTZ RESULT <name> ` with the longest possible room name
const RESULT_HEADER_LEN: usize = TAG_PREFIX.len() + "RESULT".len() + 1 + MAX_ROOM_NAME_LEN + 1;

/// Players a room admits besides its host
///
/// Bounded so the final scoreboard, host included, always fits one frame.
/// The last entry has no trailing separator, hence the `+ 1`.
pub const MAX_PLAYERS: usize = (MAX_PAYLOAD_SIZE - RESULT_HEADER_LEN + 1) / RESULT_ENTRY_LEN - 1;
