use rand::Rng;
use tracing::{debug, info, warn};

use crate::core::{Config, Identity, RoundError, MAX_START_DELAY_MS};
use crate::protocol::{Message, Outbound, Room, ScoreEntry};
use crate::time::Ticks;
use super::scoreboard::Scoreboard;
use super::timer::{Reaction, ReactionTimer};

/// How a round is played
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundMode {
    /// We own the room: pick the delay, collect times, publish the result
    Host(Room),
    /// We joined the room: wait for the host's start and report our time
    Client(Room),
    /// Single player, no traffic
    Solo,
}

/// Progress of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Client: waiting for the host's start signal
    WaitingForStart,
    /// Start signal handled, arming after `delay_ms`
    Countdown { delay_ms: u32 },
    Armed,
    /// Reacted, the scoreboard is not complete yet
    WaitingForResults,
    Finished,
}

/// Match round state machine
///
/// Sans-IO: the caller supplies the clock readings and randomness, feeds
/// received messages in, and sends whatever [`Outbound`] comes back.
#[derive(Debug, Clone)]
pub struct MatchRound {
    mode: RoundMode,
    local: Identity,
    phase: RoundPhase,
    timer: ReactionTimer,
    scoreboard: Scoreboard,
    attempt: u32,
}

impl MatchRound {
    pub fn new(mode: RoundMode, local: Identity) -> Self {
        MatchRound {
            mode,
            local,
            phase: RoundPhase::WaitingForStart,
            timer: ReactionTimer::new(),
            scoreboard: Scoreboard::new(),
            attempt: 0,
        }
    }

    pub fn mode(&self) -> &RoundMode {
        &self.mode
    }

    pub fn local(&self) -> Identity {
        self.local
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn timer(&self) -> &ReactionTimer {
        &self.timer
    }

    pub fn results(&self) -> &[ScoreEntry] {
        self.scoreboard.entries()
    }

    /// Number of times the round was restarted
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn room(&self) -> Option<&Room> {
        match &self.mode {
            RoundMode::Host(room) | RoundMode::Client(room) => Some(room),
            RoundMode::Solo => None,
        }
    }

    /// Whether the round has to hear from the transport
    pub fn uses_network(&self) -> bool {
        !matches!(self.mode, RoundMode::Solo)
    }

    /// Starts the round
    ///
    /// The host picks the delay and returns the start broadcast, a solo
    /// round picks a local delay, a client waits for the host.
    pub fn begin<R: Rng + ?Sized>(&mut self, rng: &mut R, config: &Config) -> Option<Outbound> {
        self.timer.reset();
        self.scoreboard.clear();

        match &self.mode {
            RoundMode::Host(room) => {
                let delay_ms = config.host_delay.sample(rng);
                info!("Starting round in {} with a {} ms delay", room.name(), delay_ms);
                self.phase = RoundPhase::Countdown { delay_ms };
                Some(Outbound::Broadcast(Message::Start {
                    room: room.name().clone(),
                    delay_ms,
                }))
            }
            RoundMode::Client(room) => {
                debug!("Waiting for the start of {}", room.name());
                self.phase = RoundPhase::WaitingForStart;
                None
            }
            RoundMode::Solo => {
                self.phase = RoundPhase::Countdown {
                    delay_ms: config.solo_delay.sample(rng),
                };
                None
            }
        }
    }

    /// Abandons the round and starts over
    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R, config: &Config) -> Option<Outbound> {
        self.attempt += 1;
        self.begin(rng, config)
    }

    /// Client: the start signal did not arrive in time
    pub fn start_timed_out<R: Rng + ?Sized>(&mut self, rng: &mut R, config: &Config) -> RoundError {
        warn!("No start signal within {:?}, restarting the round", config.start_timeout);
        self.restart(rng, config);
        RoundError::StartNotReceived
    }

    /// Countdown over: opens the reaction window
    pub fn arm(&mut self, now: Ticks) {
        if !matches!(self.phase, RoundPhase::Countdown { .. }) {
            debug!("Ignoring arm in {:?}", self.phase);
            return;
        }
        self.timer.arm(now);
        self.phase = RoundPhase::Armed;
    }

    /// Applies a user action
    ///
    /// `Reaction::Restart` is only reported; the caller decides to restart.
    pub fn react(&mut self, now: Ticks) -> (Reaction, Option<Outbound>) {
        let reaction = self.timer.react(now);
        let Reaction::Captured(elapsed_ms) = reaction else {
            return (reaction, None);
        };
        info!("Reaction captured: {} ms", elapsed_ms);

        let outbound = match &self.mode {
            RoundMode::Host(_) => {
                self.scoreboard.record(self.local, elapsed_ms);
                self.phase = RoundPhase::WaitingForResults;
                self.try_publish()
            }
            RoundMode::Client(room) => {
                // The result may already be in
                self.phase = if self.scoreboard.is_published() {
                    RoundPhase::Finished
                } else {
                    RoundPhase::WaitingForResults
                };
                Some(Outbound::Unicast(
                    room.host(),
                    Message::Time {
                        room: room.name().clone(),
                        elapsed_ms,
                    },
                ))
            }
            RoundMode::Solo => {
                self.scoreboard.record(self.local, elapsed_ms);
                self.phase = RoundPhase::Finished;
                None
            }
        };
        (reaction, outbound)
    }

    /// Handles a message received during the round
    ///
    /// Messages for another room, from unexpected senders or with a tag
    /// that does not belong to our role are ignored.
    pub fn handle_message(&mut self, sender: Identity, message: Message) -> Option<Outbound> {
        let room = self.room()?;
        if !message.is_for(room.name()) {
            debug!("Ignoring {} for room {}", message.tag(), message.room());
            return None;
        }

        match (&self.mode, message) {
            (RoundMode::Host(room), Message::Time { elapsed_ms, .. }) => {
                if !room.has_player(&sender) {
                    debug!("Ignoring time from {}, not a player of {}", sender, room.name());
                    return None;
                }
                self.scoreboard.record(sender, elapsed_ms);
                self.try_publish()
            }

            (RoundMode::Client(room), Message::Start { delay_ms, .. }) if sender == room.host() => {
                if self.phase != RoundPhase::WaitingForStart {
                    debug!("Ignoring repeated start in {:?}", self.phase);
                    return None;
                }
                // Anything published before this start belongs to an older round
                self.scoreboard.clear();
                self.phase = RoundPhase::Countdown {
                    delay_ms: delay_ms.min(MAX_START_DELAY_MS),
                };
                None
            }

            (RoundMode::Client(room), Message::Result { entries, .. }) if sender == room.host() => {
                if self.phase == RoundPhase::WaitingForStart {
                    debug!("Ignoring result from before the start of this round");
                    return None;
                }
                info!("Result received with {} entries", entries.len());
                self.scoreboard.replace_all(entries);
                if self.phase == RoundPhase::WaitingForResults {
                    self.phase = RoundPhase::Finished;
                }
                None
            }

            (_, message) => {
                debug!("Ignoring {} from {}", message.tag(), sender);
                None
            }
        }
    }

    fn try_publish(&mut self) -> Option<Outbound> {
        let RoundMode::Host(room) = &self.mode else {
            return None;
        };
        let entries = self.scoreboard.take_publication(room.expected_participant_count())?;

        info!("All {} times are in, publishing the result", entries.len());
        self.phase = RoundPhase::Finished;
        Some(Outbound::Broadcast(Message::Result {
            room: room.name().clone(),
            entries,
        }))
    }
}
