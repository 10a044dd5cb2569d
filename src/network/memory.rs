use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::core::{Identity, TransportError};
use super::{check_payload, Datagram, Transport};

/// Attached endpoint: attach token plus its inbox
type Endpoint = (u64, mpsc::UnboundedSender<Datagram>);

/// One simulated broadcast domain
///
/// Every attached [`MemoryTransport`] hears every broadcast of the others.
/// Cloning yields another handle to the same domain.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    endpoints: Arc<Mutex<HashMap<Identity, Endpoint>>>,
    next_token: Arc<AtomicU64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint with the given identity
    ///
    /// Attaching an identity that is already present replaces the old
    /// endpoint, which then stops receiving.
    pub fn attach(&self, identity: Identity) -> MemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if self.lock().insert(identity, (token, tx)).is_some() {
            warn!("Identity {} re-attached to the medium", identity);
        }

        MemoryTransport {
            identity,
            token,
            medium: self.clone(),
            peers: Mutex::new(HashSet::new()),
            inbox: tokio::sync::Mutex::new(rx),
        }
    }

    /// Removes an endpoint, as if the device vanished
    pub fn detach(&self, identity: &Identity) {
        if self.lock().remove(identity).is_some() {
            debug!("Identity {} detached from the medium", identity);
        }
    }

    pub fn is_attached(&self, identity: &Identity) -> bool {
        self.lock().contains_key(identity)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Identity, Endpoint>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, to: &Identity, datagram: Datagram) -> bool {
        match self.lock().get(to) {
            Some((_, tx)) => tx.send(datagram).is_ok(),
            None => false,
        }
    }
}

/// In-process transport endpoint on a [`MemoryMedium`]
pub struct MemoryTransport {
    identity: Identity,
    token: u64,
    medium: MemoryMedium,
    peers: Mutex<HashSet<Identity>>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
}

impl MemoryTransport {
    /// Whether `peer` is on the allow-list
    pub fn knows_peer(&self, peer: &Identity) -> bool {
        self.peers_lock().contains(peer)
    }

    fn peers_lock(&self) -> std::sync::MutexGuard<'_, HashSet<Identity>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn datagram(&self, payload: &[u8]) -> Datagram {
        Datagram {
            sender: self.identity,
            payload: Bytes::copy_from_slice(payload),
        }
    }
}

impl Transport for MemoryTransport {
    fn local_identity(&self) -> Identity {
        self.identity
    }

    async fn register_peer(&self, peer: Identity) -> Result<(), TransportError> {
        if self.peers_lock().insert(peer) {
            trace!("{} registered peer {}", self.identity, peer);
        }
        Ok(())
    }

    async fn send(&self, peer: Identity, payload: &[u8]) -> Result<(), TransportError> {
        check_payload(payload)?;
        if !self.knows_peer(&peer) {
            return Err(TransportError::NoPeers);
        }

        // Unicast to a vanished device is lost silently, as on the air
        if !self.medium.deliver(&peer, self.datagram(payload)) {
            trace!("Datagram from {} to {} lost", self.identity, peer);
        }
        Ok(())
    }

    async fn broadcast(&self, payload: &[u8]) -> Result<(), TransportError> {
        check_payload(payload)?;

        let receivers: Vec<_> = self
            .medium
            .lock()
            .iter()
            .filter(|(identity, _)| **identity != self.identity)
            .map(|(_, (_, tx))| tx.clone())
            .collect();
        if receivers.is_empty() {
            return Err(TransportError::NoPeers);
        }

        for tx in receivers {
            let _ = tx.send(self.datagram(payload));
        }
        Ok(())
    }

    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Datagram>, TransportError> {
        let mut inbox = self.inbox.lock().await;
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, inbox.recv()).await {
                Ok(Some(datagram)) => Ok(Some(datagram)),
                Ok(None) => Err(TransportError::Closed),
                Err(_) => Ok(None),
            },
            None => inbox.recv().await.map(Some).ok_or(TransportError::Closed),
        }
    }

    async fn reset(&self) -> Result<(), TransportError> {
        self.peers_lock().clear();
        let mut inbox = self.inbox.lock().await;
        let mut dropped = 0;
        while inbox.try_recv().is_ok() {
            dropped += 1;
        }
        debug!("{} reset, {} queued datagram(s) dropped", self.identity, dropped);
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let mut endpoints = self.medium.lock();
        if matches!(endpoints.get(&self.identity), Some((token, _)) if *token == self.token) {
            endpoints.remove(&self.identity);
        }
    }
}
