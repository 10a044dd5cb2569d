use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::core::{Error, Identity, Result, TransportError};
use super::{check_payload, Datagram, Transport};

/// Upper bound on a single `send_to`
const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer size, larger than any valid payload so oversized
/// datagrams arrive whole and are rejected by the codec
const RECV_BUFFER_SIZE: usize = 2048;

/// UDP broadcast rendition of the radio transport
///
/// The identity of a device is its IPv4 address and port. Broadcasts go to
/// a configurable address (usually the subnet broadcast address); our own
/// broadcasts looped back by the OS are dropped on receive.
pub struct UdpTransport {
    socket: UdpSocket,
    identity: Identity,
    broadcast_addr: SocketAddrV4,
    peers: Mutex<HashSet<Identity>>,
}

impl UdpTransport {
    /// Binds a broadcast-capable socket
    ///
    /// Must be called from within a tokio runtime. Binding to the unspecified
    /// address takes the identity from the interface that routes to
    /// `broadcast_addr`.
    pub fn bind(bind_addr: SocketAddrV4, broadcast_addr: SocketAddrV4) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddr::V4(bind_addr).into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        let local = match socket.local_addr()? {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => {
                return Err(Error::config(format!("expected an IPv4 socket, got {addr}")));
            }
        };

        let ip = if local.ip().is_unspecified() {
            route_source(broadcast_addr).unwrap_or(Ipv4Addr::LOCALHOST)
        } else {
            *local.ip()
        };
        let identity = Identity::from(SocketAddrV4::new(ip, local.port()));
        info!("UDP transport bound on {} as {}, broadcasting to {}", local, identity, broadcast_addr);

        Ok(UdpTransport {
            socket,
            identity,
            broadcast_addr,
            peers: Mutex::new(HashSet::new()),
        })
    }

    /// Returns the local socket address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn knows_peer(&self, peer: &Identity) -> bool {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).contains(peer)
    }

    async fn send_to(&self, payload: &[u8], addr: SocketAddrV4) -> std::result::Result<(), TransportError> {
        tokio::time::timeout(SEND_TIMEOUT, self.socket.send_to(payload, addr))
            .await
            .map_err(|_| TransportError::Timeout)??;
        Ok(())
    }

    async fn recv_foreign(&self) -> std::result::Result<Datagram, TransportError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let SocketAddr::V4(from) = from else {
                continue;
            };

            let sender = Identity::from(from);
            if sender == self.identity {
                trace!("Dropping looped-back datagram");
                continue;
            }
            return Ok(Datagram {
                sender,
                payload: Bytes::copy_from_slice(&buf[..len]),
            });
        }
    }
}

/// Source address the OS would use to reach `target`
fn route_source(target: SocketAddrV4) -> Option<Ipv4Addr> {
    let probe = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    probe.set_broadcast(true).ok()?;
    probe.connect(target).ok()?;
    match probe.local_addr().ok()? {
        SocketAddr::V4(addr) if !addr.ip().is_unspecified() => Some(*addr.ip()),
        _ => None,
    }
}

impl Transport for UdpTransport {
    fn local_identity(&self) -> Identity {
        self.identity
    }

    async fn register_peer(&self, peer: Identity) -> std::result::Result<(), TransportError> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).insert(peer);
        Ok(())
    }

    async fn send(&self, peer: Identity, payload: &[u8]) -> std::result::Result<(), TransportError> {
        check_payload(payload)?;
        if !self.knows_peer(&peer) {
            return Err(TransportError::NoPeers);
        }
        self.send_to(payload, SocketAddrV4::from(peer)).await
    }

    async fn broadcast(&self, payload: &[u8]) -> std::result::Result<(), TransportError> {
        check_payload(payload)?;
        self.send_to(payload, self.broadcast_addr).await
    }

    async fn receive(&self, timeout: Option<Duration>) -> std::result::Result<Option<Datagram>, TransportError> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.recv_foreign()).await {
                Ok(datagram) => datagram.map(Some),
                Err(_) => Ok(None),
            },
            None => self.recv_foreign().await.map(Some),
        }
    }

    async fn reset(&self) -> std::result::Result<(), TransportError> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).clear();

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let mut dropped = 0;
        while self.socket.try_recv_from(&mut buf).is_ok() {
            dropped += 1;
        }
        debug!("UDP transport reset, {} queued datagram(s) dropped", dropped);
        Ok(())
    }
}
