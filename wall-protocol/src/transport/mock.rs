//! Mock transport implementations for testing
//!
//! In-memory stand-ins for the TUN device and UDP socket so relay logic
//! can be exercised without real interfaces or root privileges. Tests
//! inject packets into the receive queues and inspect what the relay
//! sent back out.
//!
//! Like the real transports, `recv`/`recv_from` copy at most `buf.len()`
//! bytes: an injected datagram larger than the caller's buffer is
//! silently truncated, exactly as a kernel UDP read would.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::{TunInfo, TunTransport, UdpTransport};
use crate::error::Result;
use crate::Error;

/// Mock TUN device for testing
///
/// Packets injected with [`inject_recv_packet`](Self::inject_recv_packet)
/// come out of `recv`; packets the relay writes with `send` are captured
/// for inspection via [`get_sent`](Self::get_sent).
pub struct MockTunDevice {
    info: TunInfo,
    /// Queue of packets to be received (injected by test)
    recv_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Packets written to the device
    sent_packets: Mutex<Vec<Vec<u8>>>,
    /// Whether the device is "up" (active)
    is_up: RwLock<bool>,
}

impl MockTunDevice {
    /// Create a new mock TUN device
    pub fn new(name: &str, mtu: u16) -> Self {
        Self {
            info: TunInfo {
                name: name.to_string(),
                mtu,
            },
            recv_queue: Mutex::new(VecDeque::new()),
            sent_packets: Mutex::new(Vec::new()),
            is_up: RwLock::new(true),
        }
    }

    /// Inject a packet to be read by the relay (simulates the OS routing
    /// a packet into the tunnel)
    pub fn inject_recv_packet(&self, data: Vec<u8>) {
        self.recv_queue.lock().unwrap().push_back(data);
    }

    /// Get all packets the relay wrote to the device
    pub fn get_sent(&self) -> Vec<Vec<u8>> {
        self.sent_packets.lock().unwrap().clone()
    }

    /// Check if there are packets waiting to be received
    pub fn has_pending_recv(&self) -> bool {
        !self.recv_queue.lock().unwrap().is_empty()
    }

    /// Set the device up/down state
    pub fn set_up(&self, up: bool) {
        *self.is_up.write().unwrap() = up;
    }

    /// Check if device is up
    pub fn is_up(&self) -> bool {
        *self.is_up.read().unwrap()
    }
}

#[async_trait]
impl TunTransport for MockTunDevice {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        if !self.is_up() {
            return Err(Error::Transport("device is down".into()));
        }

        let packet = self
            .recv_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("no packets available".into()))?;

        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Ok(len)
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        if !self.is_up() {
            return Err(Error::Transport("device is down".into()));
        }

        if buf.len() > self.info.mtu as usize {
            return Err(Error::Transport(format!(
                "packet size {} exceeds MTU {}",
                buf.len(),
                self.info.mtu
            )));
        }

        self.sent_packets.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn info(&self) -> &TunInfo {
        &self.info
    }
}

/// Mock UDP socket for testing
///
/// Captures sent datagrams and replays injected ones. Two sockets can be
/// wired together with [`connect_pair`](Self::connect_pair) so frames
/// sent from one arrive in the other's receive queue, which is enough to
/// run a full client/server relay exchange in-process.
pub struct MockUdpSocket {
    local_addr: SocketAddr,
    /// Queue of (data, from_addr) to be received
    recv_queue: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    /// Sent datagrams: (data, to_addr)
    sent_packets: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    /// Peer socket wired in by connect_pair
    connected: Mutex<Option<Arc<MockUdpSocket>>>,
}

impl MockUdpSocket {
    /// Create a new mock UDP socket
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            recv_queue: Mutex::new(VecDeque::new()),
            sent_packets: Mutex::new(Vec::new()),
            connected: Mutex::new(None),
        }
    }

    /// Inject a datagram to be received
    pub fn inject_recv(&self, data: Vec<u8>, from: SocketAddr) {
        self.recv_queue.lock().unwrap().push_back((data, from));
    }

    /// Get all sent datagrams
    pub fn get_sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent_packets.lock().unwrap().clone()
    }

    /// Check if there are pending datagrams
    pub fn has_pending(&self) -> bool {
        !self.recv_queue.lock().unwrap().is_empty()
    }

    /// Connect two mock sockets (bidirectional)
    pub fn connect_pair(a: &Arc<Self>, b: &Arc<Self>) {
        *a.connected.lock().unwrap() = Some(b.clone());
        *b.connected.lock().unwrap() = Some(a.clone());
    }
}

#[async_trait]
impl UdpTransport for MockUdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (data, from) = self
            .recv_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Transport("no packets available".into()))?;

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok((len, from))
    }

    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.sent_packets.lock().unwrap().push((buf.to_vec(), addr));

        // If wired to a peer, deliver into its recv queue
        if let Some(ref peer) = *self.connected.lock().unwrap() {
            peer.inject_recv(buf.to_vec(), self.local_addr);
        }

        Ok(buf.len())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_mock_tun_roundtrip() {
        let tun = MockTunDevice::new("tun-test", 1452);
        tun.inject_recv_packet(vec![0x45, 0x00, 0x00, 0x14]);

        let mut buf = [0u8; 2048];
        let n = tun.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x45, 0x00, 0x00, 0x14]);

        tun.send(&[1, 2, 3]).await.unwrap();
        assert_eq!(tun.get_sent(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_mock_tun_down_errors() {
        let tun = MockTunDevice::new("tun-test", 1452);
        tun.set_up(false);

        let mut buf = [0u8; 64];
        assert!(tun.recv(&mut buf).await.is_err());
        assert!(tun.send(&[0]).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_tun_enforces_mtu() {
        let tun = MockTunDevice::new("tun-test", 100);
        assert!(tun.send(&[0u8; 101]).await.is_err());
        assert!(tun.send(&[0u8; 100]).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_udp_pair_delivery() {
        let a = Arc::new(MockUdpSocket::new(addr("127.0.0.1:1000")));
        let b = Arc::new(MockUdpSocket::new(addr("127.0.0.1:2000")));
        MockUdpSocket::connect_pair(&a, &b);

        a.send_to(b"hello", addr("127.0.0.1:2000")).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, addr("127.0.0.1:1000"));
    }

    #[tokio::test]
    async fn test_mock_udp_truncates_to_buffer() {
        let sock = MockUdpSocket::new(addr("127.0.0.1:3000"));
        sock.inject_recv(vec![0xAA; 2000], addr("127.0.0.1:4000"));

        let mut buf = [0u8; 1500];
        let (n, _) = sock.recv_from(&mut buf).await.unwrap();
        assert_eq!(n, 1500);
    }
}
