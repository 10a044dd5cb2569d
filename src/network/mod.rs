//! Transport adapters and peer communication
//!
//! A [`Transport`] is a best-effort datagram service with a peer
//! allow-list: unicast only reaches identities that were registered first,
//! broadcast reaches whoever is listening. Nothing is ordered, acknowledged
//! or deduplicated.

mod connection;
pub mod discovery;
mod memory;

pub use self::connection::UdpTransport;
pub use self::discovery::{DiscoveryEvent, Discovery};
pub use self::memory::{MemoryMedium, MemoryTransport};

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::core::{Identity, Result, TransportError, MAX_PAYLOAD_SIZE};
use crate::protocol::{Message, MessageCodec, Outbound};

/// A received payload and the identity it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub sender: Identity,
    pub payload: Bytes,
}

/// Operations a datagram transport must expose
///
/// Every method takes `&self` so one adapter can be shared by the tasks
/// of a role. `receive` must be cancel-safe: dropping the future never
/// loses a datagram that was not returned.
pub trait Transport: Send + Sync + 'static {
    /// Identity other devices see as the sender of our datagrams
    fn local_identity(&self) -> Identity;

    /// Adds a peer to the allow-list. Registering twice is not an error.
    fn register_peer(&self, peer: Identity) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;

    /// Sends to one registered peer
    fn send(&self, peer: Identity, payload: &[u8]) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;

    /// Sends to every reachable device
    fn broadcast(&self, payload: &[u8]) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;

    /// Waits for the next datagram, `None` once `timeout` elapses
    ///
    /// A `timeout` of `None` waits indefinitely.
    fn receive(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = std::result::Result<Option<Datagram>, TransportError>> + Send;

    /// Returns the adapter to a clean idle state: no peers, nothing queued
    fn reset(&self) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;
}

/// Rejects payloads above the datagram limit before any I/O
pub(crate) fn check_payload(payload: &[u8]) -> std::result::Result<(), TransportError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(TransportError::OversizedPayload {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}

/// Encodes and sends a message, registering the unicast target first
pub async fn send_outbound<T: Transport>(transport: &T, outbound: &Outbound) -> Result<()> {
    let payload = MessageCodec::new().encode_message(outbound.message())?;
    match outbound {
        Outbound::Broadcast(_) => transport.broadcast(&payload).await?,
        Outbound::Unicast(peer, _) => {
            transport.register_peer(*peer).await?;
            transport.send(*peer, &payload).await?;
        }
    }
    Ok(())
}

/// Receives one datagram and decodes it
///
/// Returns `None` on timeout and for frames that are not protocol messages.
pub async fn receive_message<T: Transport>(
    transport: &T,
    timeout: Option<Duration>,
) -> Result<Option<(Identity, Message)>> {
    let Some(datagram) = transport.receive(timeout).await? else {
        return Ok(None);
    };

    match MessageCodec::new().decode_message(&datagram.payload) {
        Some(message) => {
            trace!("Received {} from {}", message.tag(), datagram.sender);
            Ok(Some((datagram.sender, message)))
        }
        None => Ok(None),
    }
}
