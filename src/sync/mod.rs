//! Synchronization module
//!
//! This module runs one match round: the synchronized start, the reaction
//! window and the aggregation of everybody's times.

pub mod manager;
pub mod round;
pub mod scoreboard;
pub mod timer;

pub use self::manager::{RoundCommand, RoundHandle, RoundRunner, RoundSnapshot};
pub use self::round::{MatchRound, RoundMode, RoundPhase};
pub use self::scoreboard::Scoreboard;
pub use self::timer::{Reaction, ReactionTimer, TimerState};
