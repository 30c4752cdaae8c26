//! Single-peer session tracking
//!
//! The tunnel speaks to exactly one remote endpoint at a time. The server
//! learns its peer from the source address of authenticated datagrams and
//! follows it when the client's NAT binding changes; the client seeds the
//! slot with the configured server address and never expects it to move.

use std::net::SocketAddr;
use std::sync::RwLock;

/// Thread-safe slot holding the current remote endpoint.
///
/// Shared between the two relay pumps behind an `Arc`. All methods take
/// `&self`; writers hold the lock only for the swap.
#[derive(Debug, Default)]
pub struct PeerSession {
    addr: RwLock<Option<SocketAddr>>,
}

impl PeerSession {
    /// Create an empty session with no known peer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session pre-seeded with a peer address (client side)
    pub fn with_peer(addr: SocketAddr) -> Self {
        Self {
            addr: RwLock::new(Some(addr)),
        }
    }

    /// Record the source address of an authenticated datagram.
    ///
    /// Returns `true` when the stored peer changed. Callers must only
    /// invoke this after a frame has passed authentication; an attacker
    /// who can't forge tags must not be able to steer the return path.
    pub fn observe(&self, addr: SocketAddr) -> bool {
        let mut slot = self.addr.write().unwrap_or_else(|e| e.into_inner());
        if *slot == Some(addr) {
            return false;
        }
        *slot = Some(addr);
        true
    }

    /// The current peer address, if one is known
    pub fn current(&self) -> Option<SocketAddr> {
        *self.addr.read().unwrap_or_else(|e| e.into_inner())
    }
}
