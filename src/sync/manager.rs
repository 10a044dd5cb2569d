use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::core::{Config, Error, Identity, Result, TransportError};
use crate::network::discovery::fire_and_forget;
use crate::network::{receive_message, Transport};
use crate::protocol::{Message, Outbound, ScoreEntry};
use crate::time::Clock;
use super::round::{MatchRound, RoundPhase};
use super::timer::Reaction;

/// Requests from the user side to a running round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundCommand {
    /// The reaction button was pressed
    ///
    /// Once a time is captured, another press restarts the round.
    React,
}

/// What the user side gets to see of a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub phase: RoundPhase,
    pub reacted_ms: Option<u32>,
    pub results: Vec<ScoreEntry>,
    pub attempt: u32,
    /// Outcome of the most recent button press
    pub last_reaction: Option<Reaction>,
}

impl RoundSnapshot {
    fn of(round: &MatchRound, last_reaction: Option<Reaction>) -> Self {
        RoundSnapshot {
            phase: round.phase(),
            reacted_ms: round.timer().reacted_ms(),
            results: round.results().to_vec(),
            attempt: round.attempt(),
            last_reaction,
        }
    }
}

/// Handle for talking to a [`RoundRunner`]
#[derive(Clone)]
pub struct RoundHandle {
    commands: mpsc::Sender<RoundCommand>,
    snapshots: watch::Receiver<RoundSnapshot>,
}

impl RoundHandle {
    pub async fn react(&self) -> Result<()> {
        self.send(RoundCommand::React).await
    }

    /// Latest published state of the round
    pub fn snapshot(&self) -> RoundSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoundSnapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, command: RoundCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::invalid_state("Round is no longer running"))
    }
}

/// Actor that owns one [`MatchRound`] and does its I/O
///
/// Commands, countdowns, the start timeout and transport receives are
/// multiplexed in a single loop, so the round state is never shared.
pub struct RoundRunner<T: Transport> {
    round: MatchRound,
    transport: Option<Arc<T>>,
    clock: Arc<dyn Clock>,
    config: Config,
    rng: StdRng,
    commands: mpsc::Receiver<RoundCommand>,
    snapshots: watch::Sender<RoundSnapshot>,
    last_reaction: Option<Reaction>,
    countdown: Option<Instant>,
    start_deadline: Option<Instant>,
}

impl<T: Transport> RoundRunner<T> {
    /// Creates the actor and its handle
    ///
    /// `transport` may be `None` only for a solo round.
    pub fn new(
        round: MatchRound,
        transport: Option<Arc<T>>,
        clock: Arc<dyn Clock>,
        config: Config,
        rng: StdRng,
    ) -> (Self, RoundHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(RoundSnapshot::of(&round, None));

        let runner = RoundRunner {
            round,
            transport,
            clock,
            config,
            rng,
            commands: command_rx,
            snapshots: snapshot_tx,
            last_reaction: None,
            countdown: None,
            start_deadline: None,
        };
        let handle = RoundHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (runner, handle)
    }

    /// Runs the round until every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        if self.round.uses_network() && self.transport.is_none() {
            return Err(Error::invalid_state("A networked round needs a transport"));
        }

        let outbound = self.round.begin(&mut self.rng, &self.config);
        self.after_transition(None);
        self.send(outbound).await;

        loop {
            self.publish();

            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("Round handle dropped, stopping");
                        return Ok(());
                    };
                    self.on_command(command).await;
                }

                _ = until(self.countdown) => {
                    self.round.arm(self.clock.now());
                    self.after_transition(None);
                }

                _ = until(self.start_deadline) => {
                    let before = self.marker();
                    let err = self.round.start_timed_out(&mut self.rng, &self.config);
                    debug!("Round attempt {} abandoned: {}", self.round.attempt(), err);
                    self.after_transition(Some(before));
                }

                received = next_message(self.transport.as_deref(), self.config.score_poll) => {
                    if let Some((sender, message)) = received? {
                        let before = self.marker();
                        let outbound = self.round.handle_message(sender, message);
                        self.after_transition(Some(before));
                        self.send(outbound).await;
                    }
                }
            }
        }
    }

    async fn on_command(&mut self, command: RoundCommand) {
        let before = self.marker();
        let outbound = match command {
            RoundCommand::React => {
                let (reaction, outbound) = self.round.react(self.clock.now());
                self.last_reaction = Some(reaction);
                match reaction {
                    Reaction::Restart => {
                        info!("Restarting round");
                        self.round.restart(&mut self.rng, &self.config)
                    }
                    Reaction::TooSoon => {
                        debug!("Too soon, press dropped");
                        outbound
                    }
                    Reaction::Captured(_) => outbound,
                }
            }
        };
        self.after_transition(Some(before));
        self.send(outbound).await;
    }

    fn marker(&self) -> (RoundPhase, u32) {
        (self.round.phase(), self.round.attempt())
    }

    /// Re-derives the countdown and start deadlines after a state change
    fn after_transition(&mut self, before: Option<(RoundPhase, u32)>) {
        let now = self.marker();
        if before == Some(now) {
            return;
        }

        self.countdown = match now.0 {
            RoundPhase::Countdown { delay_ms } => {
                Some(Instant::now() + Duration::from_millis(u64::from(delay_ms)))
            }
            _ => None,
        };
        self.start_deadline = match now.0 {
            RoundPhase::WaitingForStart => Some(Instant::now() + self.config.start_timeout),
            _ => None,
        };
    }

    async fn send(&self, outbound: Option<Outbound>) {
        let (Some(outbound), Some(transport)) = (outbound, &self.transport) else {
            return;
        };
        // Lost starts and results are covered by the client timeout
        fire_and_forget(&**transport, &outbound).await;
    }

    fn publish(&self) {
        let snapshot = RoundSnapshot::of(&self.round, self.last_reaction);
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_message<T: Transport>(
    transport: Option<&T>,
    poll: Duration,
) -> Result<Option<(Identity, Message)>> {
    match transport {
        Some(transport) => match receive_message(transport, Some(poll)).await {
            // Nothing will ever arrive again
            Err(Error::Transport(TransportError::Closed)) => Err(TransportError::Closed.into()),
            Err(Error::Transport(e)) => {
                warn!("Receive failed: {}", e);
                Ok(None)
            }
            other => other,
        },
        None => std::future::pending().await,
    }
}
