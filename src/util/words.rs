//! Fixed vocabularies for room names and lobby chatter

use rand::seq::SliceRandom;

/// Words room names are built from. None contains a space, `,` or `:`.
pub const ROOM_WORDS: &[&str] = &[
    "scuba", "cactus", "banana", "penguin", "giraffe", "octopus", "jelly", "fish", "turtle",
    "dolphin", "whale", "seahorse", "star", "coral", "anemone", "urchin", "clam", "lobster",
    "crab", "squid", "octagon", "hexagon", "circle", "square", "rhombus", "trapezoid", "kite",
    "ellipse",
];

/// Messages cycled while a client searches for rooms
pub const WAITING_MESSAGES: &[&str] = &[
    "waiting…",
    "still waiting…",
    "hmmmm…",
    "anyone?",
    "anyone there?",
    "still waiting.",
    "hurry up!!",
    "are you there?",
    "waiting for you…",
    "patience now…",
    "r u still there?",
    "come on…",
    "giving up…",
    "bored now",
];

/// Picks a random room word
pub fn pick<R: rand::Rng + ?Sized>(rng: &mut R) -> &'static str {
    ROOM_WORDS.choose(rng).copied().unwrap_or("banana")
}

/// Picks a random waiting message
pub fn waiting_message<R: rand::Rng + ?Sized>(rng: &mut R) -> &'static str {
    WAITING_MESSAGES.choose(rng).copied().unwrap_or("waiting…")
}
