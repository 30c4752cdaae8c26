//! Real transport endpoints for the relay
//!
//! Adapters wiring the transport traits onto the actual TUN device and
//! Tokio UDP socket.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use wall_protocol::transport::{TunInfo, TunTransport, UdpTransport};
use wall_protocol::Error as ProtocolError;
use wall_tun::TunDevice;

/// TUN device endpoint
pub struct TunEndpoint {
    device: TunDevice,
    info: TunInfo,
}

impl TunEndpoint {
    /// Wrap a created TUN device
    pub fn new(device: TunDevice) -> Self {
        let info = TunInfo {
            name: device.name().to_string(),
            mtu: device.mtu(),
        };
        Self { device, info }
    }
}

#[async_trait]
impl TunTransport for TunEndpoint {
    async fn recv(&self, buf: &mut [u8]) -> wall_protocol::Result<usize> {
        self.device
            .read(buf)
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))
    }

    async fn send(&self, buf: &[u8]) -> wall_protocol::Result<usize> {
        self.device
            .write(buf)
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))
    }

    fn info(&self) -> &TunInfo {
        &self.info
    }
}

/// UDP socket endpoint
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
}

impl UdpEndpoint {
    /// Wrap a bound UDP socket
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl UdpTransport for UdpEndpoint {
    async fn recv_from(&self, buf: &mut [u8]) -> wall_protocol::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await.map_err(Into::into)
    }

    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> wall_protocol::Result<usize> {
        self.socket.send_to(buf, addr).await.map_err(Into::into)
    }

    fn local_addr(&self) -> wall_protocol::Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }
}
