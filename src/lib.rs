//! Reactz: rendezvous and synchronized start for a multiplayer reaction game
//!
//! One device hosts a named room and advertises it over a broadcast
//! datagram transport. Others discover the room, join it and wait for the
//! host's start signal. Everybody measures their own reaction time and the
//! host publishes the final scoreboard.
pub mod app;
pub mod core;
pub mod network;
pub mod protocol;
pub mod sync;
pub mod time;
pub mod util;

// Re-export commonly used items
pub use core::{Config, Error, Identity, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
