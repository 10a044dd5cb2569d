use rand::Rng;

use crate::core::Identity;
use crate::protocol::{Room, RoomName, ScoreEntry};
use crate::sync::{RoundHandle, RoundPhase, RoundSnapshot};
use crate::util::words;

/// How often a searching client changes its waiting message
pub const WAITING_ROTATION_MS: u32 = 3_000;

/// Background mood of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Menu,
    Lobby,
    Waiting,
    Armed,
    Done,
}

/// Whatever the frames get drawn on
pub trait DrawSurface {
    fn begin_frame(&mut self, tone: Tone);
    fn text(&mut self, line: &str);
    fn end_frame(&mut self) {}
}

/// Host side of the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLobby {
    pub room_name: RoomName,
    pub players: usize,
}

/// Where a client stands in the rendezvous
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    Searching,
    Found(Room),
    Joining(Room),
    /// The host never acknowledged; the join may be retried
    Failed(Room),
}

/// Client side of the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLobby {
    pub status: ClientStatus,
    waiting_message: &'static str,
    since_rotation_ms: u32,
}

impl ClientLobby {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        ClientLobby {
            status: ClientStatus::Searching,
            waiting_message: words::waiting_message(rng),
            since_rotation_ms: 0,
        }
    }

    pub fn waiting_message(&self) -> &'static str {
        self.waiting_message
    }

    fn tick<R: Rng + ?Sized>(&mut self, delta_ms: u32, rng: &mut R) {
        self.since_rotation_ms = self.since_rotation_ms.saturating_add(delta_ms);
        if self.since_rotation_ms >= WAITING_ROTATION_MS {
            self.since_rotation_ms = 0;
            self.waiting_message = words::waiting_message(rng);
        }
    }
}

/// Which kind of round is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayKind {
    Solo,
    Host,
    Client,
}

/// A round in progress
#[derive(Clone)]
pub struct Playing {
    pub kind: PlayKind,
    pub local: Identity,
    pub handle: RoundHandle,
    pub snapshot: RoundSnapshot,
}

/// The closed set of things the app can show
pub enum Screen {
    MainMenu,
    HostLobby(HostLobby),
    ClientLobby(ClientLobby),
    Playing(Playing),
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::MainMenu => "MainMenu",
            Screen::HostLobby(_) => "HostLobby",
            Screen::ClientLobby(_) => "ClientLobby",
            Screen::Playing(_) => "Playing",
        }
    }

    /// Advances time-driven state by `delta_ms`
    pub fn update<R: Rng + ?Sized>(&mut self, delta_ms: u32, rng: &mut R) {
        match self {
            Screen::ClientLobby(lobby) if lobby.status == ClientStatus::Searching => {
                lobby.tick(delta_ms, rng);
            }
            Screen::Playing(playing) => playing.snapshot = playing.handle.snapshot(),
            _ => {}
        }
    }

    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        match self {
            Screen::MainMenu => {
                surface.begin_frame(Tone::Menu);
                surface.text("React");
                surface.text("CANCEL: host   RIGHT: join");
                surface.text("DOWN: singleplayer   LEFT: quit");
            }
            Screen::HostLobby(lobby) => {
                surface.begin_frame(Tone::Lobby);
                surface.text("your room name is");
                surface.text(lobby.room_name.as_str());
                match lobby.players {
                    0 => surface.text("players can join now"),
                    n => {
                        surface.text(&format!("{n} player(s) joined"));
                        surface.text("DOWN: start");
                    }
                }
            }
            Screen::ClientLobby(lobby) => {
                surface.begin_frame(Tone::Lobby);
                match &lobby.status {
                    ClientStatus::Searching => {
                        surface.text("searching for rooms…");
                        surface.text(lobby.waiting_message);
                    }
                    ClientStatus::Found(room) => {
                        surface.text("found room");
                        surface.text(room.name().as_str());
                        surface.text("DOWN: join");
                    }
                    ClientStatus::Joining(room) => {
                        surface.text("joining");
                        surface.text(room.name().as_str());
                    }
                    ClientStatus::Failed(room) => {
                        surface.text("host unreachable");
                        surface.text(room.name().as_str());
                        surface.text("DOWN: try again");
                    }
                }
            }
            Screen::Playing(playing) => draw_round(playing, surface),
        }
        surface.end_frame();
    }
}

fn draw_round(playing: &Playing, surface: &mut dyn DrawSurface) {
    let snapshot = &playing.snapshot;
    match snapshot.phase {
        RoundPhase::WaitingForStart => {
            surface.begin_frame(Tone::Waiting);
            surface.text("waiting for the host…");
        }
        RoundPhase::Countdown { .. } => {
            surface.begin_frame(Tone::Waiting);
            surface.text("get ready…");
        }
        RoundPhase::Armed => {
            surface.begin_frame(Tone::Armed);
            surface.text("NOW!");
        }
        RoundPhase::WaitingForResults => {
            surface.begin_frame(Tone::Done);
            if let Some(ms) = snapshot.reacted_ms {
                surface.text(&format!("{ms}ms"));
            }
            surface.text("waiting for the others…");
        }
        RoundPhase::Finished => {
            surface.begin_frame(Tone::Done);
            if playing.kind == PlayKind::Solo {
                if let Some(ms) = snapshot.reacted_ms {
                    surface.text(&format!("{ms}ms"));
                }
            } else {
                for line in leaderboard(&snapshot.results, playing.local) {
                    surface.text(&line);
                }
            }
            surface.text("press again to restart");
        }
    }
}

/// Scoreboard lines in collection order, our own entry labelled `You`
pub fn leaderboard(results: &[ScoreEntry], local: Identity) -> Vec<String> {
    results
        .iter()
        .map(|entry| {
            let label = if entry.identity == local {
                "You".to_string()
            } else {
                entry.identity.short()
            };
            format!("{label}: {}ms", entry.elapsed_ms)
        })
        .collect()
}
