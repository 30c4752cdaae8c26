//! Abstract transport layer for the tunnel relay
//!
//! The relay shuttles packets between a TUN interface and a UDP socket.
//! Both sides hide behind async traits so the engine wires in real
//! devices and the tests wire in the [`mock`] implementations instead.
//!
//! - [`TunTransport`]: IP packets to/from the OS network stack
//! - [`UdpTransport`]: encrypted frames to/from the remote endpoint

pub mod mock;

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::Result;

/// Information about a TUN interface
#[derive(Debug, Clone)]
pub struct TunInfo {
    /// Interface name (e.g., "tun0", "utun3")
    pub name: String,
    /// Maximum transmission unit size
    pub mtu: u16,
}

/// Async transport trait for TUN interface operations
///
/// Operates at layer 3: reads and writes are whole IP datagrams with no
/// Ethernet framing. `recv` must be cancel-safe so the relay can select
/// against shutdown without losing a packet.
#[async_trait]
pub trait TunTransport: Send + Sync {
    /// Receive one IP packet from the OS network stack.
    ///
    /// Returns the number of bytes written into `buf`, which should be at
    /// least MTU-sized.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write one IP packet to the OS network stack.
    async fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Get information about the TUN interface
    fn info(&self) -> &TunInfo;

    /// Get the MTU of the interface
    fn mtu(&self) -> u16 {
        self.info().mtu
    }

    /// Get the interface name
    fn name(&self) -> &str {
        &self.info().name
    }
}

/// Async transport trait for UDP socket operations
///
/// Carries sealed frames between the endpoints. Received datagrams include
/// the source address so the relay can track a peer behind a changing NAT
/// binding. `recv_from` must be cancel-safe.
#[async_trait]
pub trait UdpTransport: Send + Sync {
    /// Receive one datagram, returning its length and sender address.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;

    /// Send one datagram to the given address.
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize>;

    /// Get the local address this transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;
}
