//! Application shell
//!
//! Maps buttons to role changes, owns the tasks of the active role and
//! keeps the current [`Screen`] up to date.

pub mod screen;

pub use self::screen::{ClientLobby, ClientStatus, DrawSurface, HostLobby, PlayKind, Playing, Screen, Tone};

use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::core::{Config, Error, Result};
use crate::network::{Discovery, DiscoveryEvent, Transport};
use crate::protocol::{Rendezvous, Role, Room, RoomName};
use crate::sync::{MatchRound, RoundHandle, RoundMode, RoundRunner};
use crate::time::Clock;
use crate::util::TaskGroup;

/// Physical buttons of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Confirm,
    Up,
    Down,
    Left,
    Right,
    Cancel,
}

impl FromStr for Button {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONFIRM" => Ok(Button::Confirm),
            "UP" => Ok(Button::Up),
            "DOWN" => Ok(Button::Down),
            "LEFT" => Ok(Button::Left),
            "RIGHT" => Ok(Button::Right),
            "CANCEL" => Ok(Button::Cancel),
            other => Err(Error::Input(format!("unknown button {other:?}"))),
        }
    }
}

/// What a button press amounts to on the current screen
enum Action {
    Host,
    Search,
    Solo,
    Quit,
    Close,
    Commit,
    Join(Room),
    React(RoundHandle),
    Ignore,
}

/// Ties input, screens, discovery and rounds together
pub struct App<T: Transport> {
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
    config: Config,
    rng: StdRng,
    screen: Screen,
    tasks: TaskGroup,
    rendezvous: Option<Arc<Mutex<Rendezvous>>>,
    events_tx: mpsc::UnboundedSender<DiscoveryEvent>,
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    quit: bool,
}

impl<T: Transport> App<T> {
    pub fn new(transport: Arc<T>, clock: Arc<dyn Clock>, config: Config, rng: StdRng) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        App {
            transport,
            clock,
            config,
            rng,
            screen: Screen::MainMenu,
            tasks: TaskGroup::new("role"),
            rendezvous: None,
            events_tx,
            events,
            quit: false,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Number of background tasks owned by the active role
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        self.screen.draw(surface);
    }

    /// Handles one button press
    pub async fn handle_button(&mut self, button: Button) -> Result<()> {
        debug!("Button {:?} on {}", button, self.screen.name());

        match self.action_for(button) {
            Action::Host => self.host().await,
            Action::Search => self.search().await,
            Action::Solo => {
                self.start_round(RoundMode::Solo);
                Ok(())
            }
            Action::Quit => {
                info!("Quitting");
                self.quit = true;
                Ok(())
            }
            Action::Close => self.close_role().await,
            Action::Commit => self.commit().await,
            Action::Join(room) => {
                self.join(room);
                Ok(())
            }
            Action::React(handle) => handle.react().await,
            Action::Ignore => Ok(()),
        }
    }

    fn action_for(&self, button: Button) -> Action {
        match (&self.screen, button) {
            (Screen::MainMenu, Button::Cancel) => Action::Host,
            (Screen::MainMenu, Button::Right) => Action::Search,
            (Screen::MainMenu, Button::Down) => Action::Solo,
            (Screen::MainMenu, Button::Left) => Action::Quit,
            (_, Button::Left) => Action::Close,
            (Screen::HostLobby(_), Button::Down) => Action::Commit,
            (Screen::ClientLobby(lobby), Button::Down) => match &lobby.status {
                ClientStatus::Found(room) | ClientStatus::Failed(room) => Action::Join(room.clone()),
                _ => Action::Ignore,
            },
            (Screen::Playing(playing), Button::Confirm | Button::Right | Button::Down) => {
                Action::React(playing.handle.clone())
            }
            _ => Action::Ignore,
        }
    }

    /// Applies background progress and advances timers by `delta_ms`
    pub fn update(&mut self, delta_ms: u32) {
        while let Ok(event) = self.events.try_recv() {
            self.on_event(event);
        }
        self.screen.update(delta_ms, &mut self.rng);
    }

    async fn host(&mut self) -> Result<()> {
        let discovery = self.enter_role(Role::Host).await?;
        let name = RoomName::generate(&mut self.rng);
        let rng = self.child_rng();

        self.screen = Screen::HostLobby(HostLobby {
            room_name: name.clone(),
            players: 0,
        });
        self.tasks.spawn(async move {
            if let Err(e) = discovery.advertise(name, rng).await {
                warn!("Advertising ended: {}", e);
            }
        });
        Ok(())
    }

    async fn search(&mut self) -> Result<()> {
        let discovery = self.enter_role(Role::Client).await?;
        self.screen = Screen::ClientLobby(ClientLobby::new(&mut self.rng));
        self.tasks.spawn(async move {
            if let Err(e) = discovery.search().await {
                warn!("Search ended: {}", e);
            }
        });
        Ok(())
    }

    fn join(&mut self, room: Room) {
        let Some(rendezvous) = self.rendezvous.clone() else {
            return;
        };
        if let Screen::ClientLobby(lobby) = &mut self.screen {
            lobby.status = ClientStatus::Joining(room);
        }

        let discovery = self.discovery(rendezvous);
        self.tasks.spawn(async move {
            if let Err(e) = discovery.join().await {
                warn!("Join ended: {}", e);
            }
        });
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(rendezvous) = self.rendezvous.clone() else {
            return Ok(());
        };
        let committed = rendezvous.lock().await.commit();
        match committed {
            Ok(room) => {
                // The advertiser must not keep reading the round's traffic
                self.tasks.shutdown().await;
                self.start_round(RoundMode::Host(room));
                Ok(())
            }
            Err(e) => {
                info!("Cannot start yet: {}", e);
                Ok(())
            }
        }
    }

    fn start_round(&mut self, mode: RoundMode) {
        let kind = match mode {
            RoundMode::Host(_) => PlayKind::Host,
            RoundMode::Client(_) => PlayKind::Client,
            RoundMode::Solo => PlayKind::Solo,
        };
        let local = self.transport.local_identity();
        let transport = (kind != PlayKind::Solo).then(|| Arc::clone(&self.transport));

        let (runner, handle) = RoundRunner::new(
            MatchRound::new(mode, local),
            transport,
            Arc::clone(&self.clock),
            self.config.clone(),
            self.child_rng(),
        );
        self.tasks.spawn(async move {
            if let Err(e) = runner.run().await {
                warn!("Round ended: {}", e);
            }
        });

        let snapshot = handle.snapshot();
        self.screen = Screen::Playing(Playing {
            kind,
            local,
            handle,
            snapshot,
        });
    }

    /// Cancels everything the current role owns and returns to the menu
    async fn close_role(&mut self) -> Result<()> {
        info!("Closing {}", self.screen.name());
        self.tasks.shutdown().await;
        self.rendezvous = None;
        while self.events.try_recv().is_ok() {}

        self.screen = Screen::MainMenu;
        self.transport.reset().await?;
        Ok(())
    }

    async fn enter_role(&mut self, role: Role) -> Result<Discovery<T>> {
        self.tasks.shutdown().await;
        self.transport.reset().await?;

        let rendezvous = Arc::new(Mutex::new(Rendezvous::new(
            role,
            self.transport.local_identity(),
            self.config.join_attempts,
        )));
        self.rendezvous = Some(Arc::clone(&rendezvous));
        Ok(self.discovery(rendezvous))
    }

    fn discovery(&self, rendezvous: Arc<Mutex<Rendezvous>>) -> Discovery<T> {
        Discovery::new(
            Arc::clone(&self.transport),
            rendezvous,
            self.config.clone(),
            self.events_tx.clone(),
        )
    }

    fn child_rng(&mut self) -> StdRng {
        StdRng::from_rng(&mut self.rng).unwrap_or_else(|_| StdRng::from_entropy())
    }

    fn on_event(&mut self, event: DiscoveryEvent) {
        if let (Screen::ClientLobby(_), DiscoveryEvent::Joined(room)) = (&self.screen, &event) {
            let room = room.clone();
            self.start_round(RoundMode::Client(room));
            return;
        }

        match (&mut self.screen, event) {
            (Screen::HostLobby(lobby), DiscoveryEvent::PlayerJoined { player, count }) => {
                info!("{} joined, {} player(s) now", player, count);
                lobby.players = count;
            }
            (Screen::ClientLobby(lobby), DiscoveryEvent::RoomFound(room)) => {
                lobby.status = ClientStatus::Found(room);
            }
            (Screen::ClientLobby(lobby), DiscoveryEvent::JoinFailed { attempts }) => {
                if let ClientStatus::Joining(room) = &lobby.status {
                    warn!("Host of {} unreachable after {} attempts", room.name(), attempts);
                    lobby.status = ClientStatus::Failed(room.clone());
                }
            }
            (_, event) => debug!("Dropping stale event {:?}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Identity;
    use crate::network::{MemoryMedium, MemoryTransport};
    use crate::sync::RoundPhase;
    use crate::time::MonotonicClock;
    use std::time::Duration;

    const HOST: Identity = Identity([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const PLAYER: Identity = Identity([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const TICK_MS: u32 = 50;

    fn app(medium: &MemoryMedium, identity: Identity, seed: u64) -> App<MemoryTransport> {
        App::new(
            Arc::new(medium.attach(identity)),
            Arc::new(MonotonicClock::new()),
            Config::default(),
            StdRng::seed_from_u64(seed),
        )
    }

    /// Ticks every app until `done` holds, failing after a minute of virtual time
    async fn pump<F>(apps: &mut [&mut App<MemoryTransport>], mut done: F)
    where
        F: FnMut(&[&mut App<MemoryTransport>]) -> bool,
    {
        for _ in 0..(60_000 / TICK_MS) {
            if done(apps) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(u64::from(TICK_MS))).await;
            for app in apps.iter_mut() {
                app.update(TICK_MS);
            }
        }
        panic!("condition not reached");
    }

    fn phase(app: &App<MemoryTransport>) -> Option<RoundPhase> {
        match app.screen() {
            Screen::Playing(playing) => Some(playing.snapshot.phase),
            _ => None,
        }
    }

    #[test]
    fn test_button_names() {
        assert_eq!("confirm".parse::<Button>().unwrap(), Button::Confirm);
        assert_eq!(" LEFT ".parse::<Button>().unwrap(), Button::Left);
        assert!(matches!("jump".parse::<Button>(), Err(Error::Input(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_quit() {
        let medium = MemoryMedium::new();
        let mut app = app(&medium, HOST, 1);
        app.handle_button(Button::Confirm).await.unwrap();
        assert!(!app.should_quit());
        app.handle_button(Button::Left).await.unwrap();
        assert!(app.should_quit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_solo_game() {
        let medium = MemoryMedium::new();
        let mut app = app(&medium, PLAYER, 2);

        app.handle_button(Button::Down).await.unwrap();
        assert!(matches!(app.screen(), Screen::Playing(Playing { kind: PlayKind::Solo, .. })));

        pump(&mut [&mut app], |apps| phase(&apps[0]) == Some(RoundPhase::Armed)).await;
        app.handle_button(Button::Confirm).await.unwrap();
        pump(&mut [&mut app], |apps| phase(&apps[0]) == Some(RoundPhase::Finished)).await;

        app.handle_button(Button::Left).await.unwrap();
        assert!(matches!(app.screen(), Screen::MainMenu));
        assert_eq!(app.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_cannot_start_alone() {
        let medium = MemoryMedium::new();
        let mut host = app(&medium, HOST, 3);

        host.handle_button(Button::Cancel).await.unwrap();
        host.handle_button(Button::Down).await.unwrap();
        assert!(matches!(host.screen(), Screen::HostLobby(HostLobby { players: 0, .. })));
        assert_eq!(host.task_count(), 1);

        host.handle_button(Button::Left).await.unwrap();
        assert!(matches!(host.screen(), Screen::MainMenu));
        assert_eq!(host.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiplayer_game() {
        let medium = MemoryMedium::new();
        let mut host = app(&medium, HOST, 4);
        let mut client = app(&medium, PLAYER, 5);

        host.handle_button(Button::Cancel).await.unwrap();
        client.handle_button(Button::Right).await.unwrap();

        pump(&mut [&mut host, &mut client], |apps| {
            matches!(apps[1].screen(), Screen::ClientLobby(ClientLobby { status: ClientStatus::Found(_), .. }))
        })
        .await;
        client.handle_button(Button::Down).await.unwrap();

        pump(&mut [&mut host, &mut client], |apps| {
            matches!(apps[0].screen(), Screen::HostLobby(HostLobby { players: 1, .. }))
                && phase(&apps[1]) == Some(RoundPhase::WaitingForStart)
        })
        .await;
        host.handle_button(Button::Down).await.unwrap();

        pump(&mut [&mut host, &mut client], |apps| {
            phase(&apps[0]) == Some(RoundPhase::Armed) && phase(&apps[1]) == Some(RoundPhase::Armed)
        })
        .await;
        host.handle_button(Button::Confirm).await.unwrap();
        client.handle_button(Button::Right).await.unwrap();

        pump(&mut [&mut host, &mut client], |apps| {
            phase(&apps[0]) == Some(RoundPhase::Finished) && phase(&apps[1]) == Some(RoundPhase::Finished)
        })
        .await;

        let (Screen::Playing(h), Screen::Playing(c)) = (host.screen(), client.screen()) else {
            panic!("both should be playing");
        };
        assert_eq!(h.snapshot.results.len(), 2);
        assert_eq!(h.snapshot.results, c.snapshot.results);
        assert_eq!(h.snapshot.results[0].identity, HOST);
        assert_eq!(h.snapshot.results[1].identity, PLAYER);

        host.handle_button(Button::Left).await.unwrap();
        client.handle_button(Button::Left).await.unwrap();
        assert_eq!(host.task_count() + client.task_count(), 0);
    }
}
