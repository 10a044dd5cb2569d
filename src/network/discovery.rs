use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{Config, Error, Identity, Result, RoundError, TransportError};
use crate::protocol::{Message, Outbound, Rendezvous, RendezvousEvent, Room, RoomName};
use crate::util::{backoff, jitter};
use super::{receive_message, send_outbound, Transport};

/// Progress reported by the discovery loops
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// Client: an advertisement was received
    RoomFound(Room),
    /// Host: a new player entered the room
    PlayerJoined { player: Identity, count: usize },
    /// Client: the host acknowledged our join
    Joined(Room),
    /// Client: the host never acknowledged
    JoinFailed { attempts: u32 },
}

/// Async driver for a shared [`Rendezvous`]
///
/// The rendezvous lock is only taken around synchronous state updates and
/// never held while the transport is awaited.
pub struct Discovery<T: Transport> {
    transport: Arc<T>,
    rendezvous: Arc<Mutex<Rendezvous>>,
    config: Config,
    events: mpsc::UnboundedSender<DiscoveryEvent>,
}

impl<T: Transport> Clone for Discovery<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            rendezvous: Arc::clone(&self.rendezvous),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }
}

/// Broadcast failures expected while nobody is listening
fn is_benign(err: &Error) -> bool {
    matches!(
        err,
        Error::Transport(TransportError::NoPeers | TransportError::Timeout)
    )
}

impl<T: Transport> Discovery<T> {
    pub fn new(
        transport: Arc<T>,
        rendezvous: Arc<Mutex<Rendezvous>>,
        config: Config,
        events: mpsc::UnboundedSender<DiscoveryEvent>,
    ) -> Self {
        Discovery {
            transport,
            rendezvous,
            config,
            events,
        }
    }

    pub fn rendezvous(&self) -> Arc<Mutex<Rendezvous>> {
        Arc::clone(&self.rendezvous)
    }

    /// Host: opens `name` and advertises it until the room is committed
    ///
    /// Join requests are answered between advertisement ticks. `NoPeers` on
    /// broadcast is expected before anyone listens and is retried on the
    /// next tick; other broadcast failures back off exponentially.
    pub async fn advertise(&self, name: RoomName, mut rng: StdRng) -> Result<()> {
        self.rendezvous.lock().await.start_advertising(name)?;
        let mut delay = self.config.advertise_interval;

        loop {
            let advertisement = self.rendezvous.lock().await.advertisement();
            let Some(advertisement) = advertisement else {
                info!("Advertising stopped");
                return Ok(());
            };

            match send_outbound(&*self.transport, &advertisement).await {
                Ok(()) => delay = self.config.advertise_interval,
                Err(e) if is_benign(&e) => {
                    debug!("Advertisement not delivered: {}", e);
                    delay = self.config.advertise_interval;
                }
                Err(e) => {
                    delay = backoff(delay, self.config.max_backoff);
                    warn!("Advertisement failed, next attempt in {:?}: {}", delay, e);
                }
            }

            let next_tick = Instant::now() + jitter(delay, self.config.advertise_jitter, &mut rng);
            self.listen_until(next_tick).await?;
        }
    }

    /// Client: listens until an advertisement arrives
    ///
    /// Waits indefinitely; cancel the task to stop searching.
    pub async fn search(&self) -> Result<Room> {
        self.rendezvous.lock().await.start_search()?;

        loop {
            let received = match receive_message(&*self.transport, Some(self.config.search_poll)).await {
                Ok(received) => received,
                Err(e) if is_benign(&e) => None,
                Err(e) => return Err(e),
            };
            let Some((sender, message)) = received else {
                continue;
            };

            if let Some(RendezvousEvent::RoomFound(room)) = self.dispatch(sender, message).await {
                return Ok(room);
            }
        }
    }

    /// Client: joins the found room, re-sending the request until acked
    ///
    /// Gives up with [`RoundError::HostUnreachable`] once the configured
    /// attempts are spent; the rendezvous is then back in `Found`.
    pub async fn join(&self) -> Result<Room> {
        let mut request = self.rendezvous.lock().await.begin_join()?;

        loop {
            if let Err(e) = send_outbound(&*self.transport, &request).await {
                warn!("Join request not sent: {}", e);
            }

            let deadline = Instant::now() + self.config.join_retry_interval;
            if let Some(room) = self.await_ack(deadline).await? {
                return Ok(room);
            }

            let retry = self.rendezvous.lock().await.retry_join();
            request = match retry {
                Ok(request) => request,
                Err(Error::Round(RoundError::HostUnreachable { attempts })) => {
                    self.emit(DiscoveryEvent::JoinFailed { attempts });
                    return Err(RoundError::HostUnreachable { attempts }.into());
                }
                Err(e) => return Err(e),
            };
        }
    }

    async fn await_ack(&self, deadline: Instant) -> Result<Option<Room>> {
        while let Some((sender, message)) = self.receive_before(deadline).await? {
            if let Some(RendezvousEvent::Joined(room)) = self.dispatch(sender, message).await {
                return Ok(Some(room));
            }
        }
        Ok(None)
    }

    async fn listen_until(&self, deadline: Instant) -> Result<()> {
        while let Some((sender, message)) = self.receive_before(deadline).await? {
            self.dispatch(sender, message).await;
        }
        Ok(())
    }

    /// Next protocol message before `deadline`, `None` once it passes
    async fn receive_before(&self, deadline: Instant) -> Result<Option<(Identity, Message)>> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match receive_message(&*self.transport, Some(remaining)).await {
                Ok(Some(received)) => return Ok(Some(received)),
                Ok(None) => continue,
                Err(e) if is_benign(&e) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Feeds one message to the state machine and carries out the result
    async fn dispatch(&self, sender: Identity, message: Message) -> Option<RendezvousEvent> {
        let step = self.rendezvous.lock().await.handle_message(sender, message);

        if let Some(outbound) = &step.outbound {
            if let Err(e) = send_outbound(&*self.transport, outbound).await {
                warn!("Failed to send {}: {}", outbound.message().tag(), e);
            }
        }
        if let Some(event) = &step.event {
            self.emit(match event.clone() {
                RendezvousEvent::PlayerJoined { player, count } => DiscoveryEvent::PlayerJoined { player, count },
                RendezvousEvent::RoomFound(room) => DiscoveryEvent::RoomFound(room),
                RendezvousEvent::Joined(room) => DiscoveryEvent::Joined(room),
            });
        }
        step.event
    }

    fn emit(&self, event: DiscoveryEvent) {
        // Nobody listening is fine, e.g. while the screen is being torn down
        let _ = self.events.send(event);
    }
}

/// Sends an outbound without caring whether anyone hears it
pub(crate) async fn fire_and_forget<T: Transport>(transport: &T, outbound: &Outbound) {
    if let Err(e) = send_outbound(transport, outbound).await {
        if is_benign(&e) {
            debug!("{} not delivered: {}", outbound.message().tag(), e);
        } else {
            warn!("{} not delivered: {}", outbound.message().tag(), e);
        }
    }
}
