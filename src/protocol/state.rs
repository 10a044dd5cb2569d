use tracing::{debug, info, warn};

use crate::core::{Error, Identity, Result, RoundError};
use super::message::{Message, Outbound, RoomName};
use super::room::Room;

/// Which side of the rendezvous this device plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

/// Current state of the rendezvous
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousState {
    /// Nothing started yet
    Idle,

    /// Host: room is open and being advertised
    Advertising {
        room: Room,
    },

    /// Host: advertising stopped, roster frozen for the match
    Committed {
        room: Room,
    },

    /// Client: listening for advertisements
    Searching,

    /// Client: an advertisement was received
    Found {
        room: Room,
    },

    /// Client: join request sent, waiting for the acknowledgement
    Joining {
        room: Room,
        /// Number of join requests sent so far
        attempts: u32,
    },

    /// Client: the host acknowledged the join
    Joined {
        room: Room,
    },
}

/// Something the caller may want to surface to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousEvent {
    PlayerJoined { player: Identity, count: usize },
    RoomFound(Room),
    Joined(Room),
}

/// Result of feeding one message to the state machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub outbound: Option<Outbound>,
    pub event: Option<RendezvousEvent>,
}

impl Step {
    fn ignored() -> Self {
        Step::default()
    }
}

/// Information about the current rendezvous state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    /// Current state type
    pub state_type: &'static str,
    /// Name of the room, once one exists
    pub room_name: Option<RoomName>,
    /// Number of joined players (host side)
    pub player_count: usize,
}

/// Rendezvous state machine for both roles
///
/// Sans-IO: callers feed received messages in and send whatever
/// [`Outbound`] comes back.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    role: Role,
    local: Identity,
    state: RendezvousState,
    max_join_attempts: u32,
}

impl Rendezvous {
    /// Creates a new rendezvous in the `Idle` state
    pub fn new(role: Role, local: Identity, max_join_attempts: u32) -> Self {
        Rendezvous {
            role,
            local,
            state: RendezvousState::Idle,
            max_join_attempts: max_join_attempts.max(1),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local(&self) -> Identity {
        self.local
    }

    pub fn state(&self) -> &RendezvousState {
        &self.state
    }

    /// The room of the current state, if any
    pub fn room(&self) -> Option<&Room> {
        match &self.state {
            RendezvousState::Idle | RendezvousState::Searching => None,
            RendezvousState::Advertising { room }
            | RendezvousState::Committed { room }
            | RendezvousState::Found { room }
            | RendezvousState::Joining { room, .. }
            | RendezvousState::Joined { room } => Some(room),
        }
    }

    /// Gets information about the current state
    pub fn get_state_info(&self) -> StateInfo {
        let state_type = match &self.state {
            RendezvousState::Idle => "Idle",
            RendezvousState::Advertising { .. } => "Advertising",
            RendezvousState::Committed { .. } => "Committed",
            RendezvousState::Searching => "Searching",
            RendezvousState::Found { .. } => "Found",
            RendezvousState::Joining { .. } => "Joining",
            RendezvousState::Joined { .. } => "Joined",
        };
        let room = self.room();
        StateInfo {
            state_type,
            room_name: room.map(|r| r.name().clone()),
            player_count: room.map_or(0, |r| r.players().len()),
        }
    }

    /// Opens a room and starts advertising it
    pub fn start_advertising(&mut self, name: RoomName) -> Result<()> {
        self.expect_role(Role::Host)?;
        if !matches!(self.state, RendezvousState::Idle) {
            return Err(Error::invalid_state("Can only advertise from Idle state"));
        }

        info!("Advertising room {}", name);
        self.state = RendezvousState::Advertising {
            room: Room::create(name, self.local),
        };
        Ok(())
    }

    /// The advertisement to broadcast on the next tick
    pub fn advertisement(&self) -> Option<Outbound> {
        match &self.state {
            RendezvousState::Advertising { room } => Some(Outbound::Broadcast(Message::Advertise {
                room: room.name().clone(),
            })),
            _ => None,
        }
    }

    /// Stops advertising and freezes the roster
    pub fn commit(&mut self) -> Result<Room> {
        match &self.state {
            RendezvousState::Advertising { room } if !room.players().is_empty() => {
                let room = room.clone();
                info!("Committing {} with {} player(s)", room, room.players().len());
                self.state = RendezvousState::Committed { room: room.clone() };
                Ok(room)
            }
            RendezvousState::Advertising { .. } => {
                Err(Error::invalid_state("Cannot commit a room without players"))
            }
            _ => Err(Error::invalid_state("Can only commit from Advertising state")),
        }
    }

    /// Starts listening for advertisements
    pub fn start_search(&mut self) -> Result<()> {
        self.expect_role(Role::Client)?;
        if !matches!(self.state, RendezvousState::Idle) {
            return Err(Error::invalid_state("Can only search from Idle state"));
        }
        self.state = RendezvousState::Searching;
        Ok(())
    }

    /// Sends the first join request for the found room
    pub fn begin_join(&mut self) -> Result<Outbound> {
        let room = match &self.state {
            RendezvousState::Found { room } => room.clone(),
            _ => return Err(Error::invalid_state("Can only join from Found state")),
        };

        info!("Joining {}", room);
        let request = join_request(&room);
        self.state = RendezvousState::Joining { room, attempts: 1 };
        Ok(request)
    }

    /// Re-sends the join request, or gives up once the attempts are spent
    ///
    /// Giving up returns to `Found` so the join can be tried again later.
    pub fn retry_join(&mut self) -> Result<Outbound> {
        let (room, attempts) = match &self.state {
            RendezvousState::Joining { room, attempts } => (room.clone(), *attempts),
            _ => return Err(Error::invalid_state("Can only retry from Joining state")),
        };

        if attempts >= self.max_join_attempts {
            warn!("No acknowledgement from {} after {} attempts", room.host(), attempts);
            self.state = RendezvousState::Found { room };
            return Err(RoundError::HostUnreachable { attempts }.into());
        }

        debug!("Re-sending join request to {} (attempt {})", room.host(), attempts + 1);
        let request = join_request(&room);
        self.state = RendezvousState::Joining {
            room,
            attempts: attempts + 1,
        };
        Ok(request)
    }

    /// Handles an incoming message
    ///
    /// Messages that do not fit the current state or room are ignored.
    pub fn handle_message(&mut self, sender: Identity, message: Message) -> Step {
        if sender == self.local {
            return Step::ignored();
        }

        match message {
            Message::Join { room } => self.on_join(sender, room),
            Message::Advertise { room } => self.on_advertise(sender, room),
            Message::JoinAck { room } => self.on_join_ack(sender, room),
            other => {
                debug!("Ignoring {} from {} during rendezvous", other.tag(), sender);
                Step::ignored()
            }
        }
    }

    fn on_join(&mut self, sender: Identity, name: RoomName) -> Step {
        let RendezvousState::Advertising { room } = &mut self.state else {
            return Step::ignored();
        };
        if &name != room.name() {
            debug!("Ignoring JOIN for {} while hosting {}", name, room.name());
            return Step::ignored();
        }
        if room.is_full() && !room.has_player(&sender) {
            // No ack: the client gives up as if the host were unreachable
            warn!("Refusing {}, {} is full", sender, room.name());
            return Step::ignored();
        }

        let event = room.add_player(sender).then(|| RendezvousEvent::PlayerJoined {
            player: sender,
            count: room.players().len(),
        });
        // A repeated join still gets an ack, the first one may have been lost
        Step {
            outbound: Some(Outbound::Unicast(sender, Message::JoinAck { room: name })),
            event,
        }
    }

    fn on_advertise(&mut self, sender: Identity, name: RoomName) -> Step {
        if !matches!(self.state, RendezvousState::Searching) {
            return Step::ignored();
        }

        let room = Room::create(name, sender);
        info!("Found {}", room);
        self.state = RendezvousState::Found { room: room.clone() };
        Step {
            outbound: None,
            event: Some(RendezvousEvent::RoomFound(room)),
        }
    }

    fn on_join_ack(&mut self, sender: Identity, name: RoomName) -> Step {
        let room = match &self.state {
            RendezvousState::Joining { room, .. } if sender == room.host() && &name == room.name() => {
                room.clone()
            }
            _ => return Step::ignored(),
        };

        info!("Joined {}", room);
        self.state = RendezvousState::Joined { room: room.clone() };
        Step {
            outbound: None,
            event: Some(RendezvousEvent::Joined(room)),
        }
    }

    /// Returns to `Idle`, dropping any room
    pub fn reset(&mut self) {
        self.state = RendezvousState::Idle;
    }

    fn expect_role(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(Error::invalid_state(format!(
                "Operation requires the {role:?} role"
            )));
        }
        Ok(())
    }
}

fn join_request(room: &Room) -> Outbound {
    Outbound::Unicast(
        room.host(),
        Message::Join {
            room: room.name().clone(),
        },
    )
}
