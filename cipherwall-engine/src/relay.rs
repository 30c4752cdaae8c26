//! The tunnel relay
//!
//! Two pumps shuttle packets between the TUN interface and the UDP
//! socket. Egress reads plaintext IP packets from the TUN device, seals
//! them, and sends the frames to the current peer; ingress opens
//! incoming datagrams, learns the peer from authenticated frames, and
//! writes the plaintext back into the TUN device.
//!
//! Bad frames are dropped and logged at debug level so an attacker
//! flooding garbage cannot fill the logs; transport errors are logged
//! and the pumps keep running.
//!
//! Neither endpoint keeps per-frame state, so there is no replay
//! protection: a captured frame stays valid until the secret changes.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;

use wall_protocol::transport::{TunTransport, UdpTransport};
use wall_protocol::{FrameCodec, PeerSession, BUFFER_SIZE};

use crate::error::Result;

/// Relay between one TUN device and one UDP socket.
///
/// Generic over the transports so tests can drive it with mocks. The
/// per-datagram entry points [`handle_datagram`](Self::handle_datagram)
/// and [`forward_packet`](Self::forward_packet) carry all the protocol
/// logic; [`run`](Self::run) just loops them against the real I/O.
pub struct TunnelRelay<T, U> {
    tun: Arc<T>,
    udp: Arc<U>,
    codec: FrameCodec,
    peer: Arc<PeerSession>,
}

impl<T, U> TunnelRelay<T, U>
where
    T: TunTransport + 'static,
    U: UdpTransport + 'static,
{
    /// Create a relay over the given transports
    pub fn new(tun: Arc<T>, udp: Arc<U>, codec: FrameCodec, peer: Arc<PeerSession>) -> Self {
        Self {
            tun,
            udp,
            codec,
            peer,
        }
    }

    /// The peer session this relay addresses outbound frames to
    pub fn peer(&self) -> &Arc<PeerSession> {
        &self.peer
    }

    /// Seal one plaintext packet and send it to the current peer.
    ///
    /// Returns `true` when a frame went out. Packets are dropped when no
    /// peer is known yet (server before the first client frame arrives).
    pub async fn forward_packet(&self, packet: &[u8]) -> bool {
        let Some(peer_addr) = self.peer.current() else {
            log::debug!("Dropping {} byte packet, no peer known yet", packet.len());
            return false;
        };

        let frame = match self.codec.seal(packet) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Seal error: {}", e);
                return false;
            }
        };

        match self.udp.send_to(&frame, peer_addr).await {
            Ok(_) => true,
            Err(e) => {
                log::error!("UDP send error to {}: {}", peer_addr, e);
                false
            }
        }
    }

    /// Open one incoming datagram and deliver the plaintext to the TUN
    /// device.
    ///
    /// The sender address becomes the current peer only after the frame
    /// authenticates, so forged datagrams cannot steer the return path.
    /// Returns `true` when a packet was written to the device.
    pub async fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) -> bool {
        let packet = match self.codec.open(datagram) {
            Ok(packet) => packet,
            Err(e) if e.is_frame_error() => {
                log::debug!("Dropping bad frame from {}: {}", from, e);
                return false;
            }
            Err(e) => {
                log::error!("Frame open error from {}: {}", from, e);
                return false;
            }
        };

        if self.peer.observe(from) {
            log::info!("Peer endpoint is now {}", from);
        }

        match self.tun.send(&packet).await {
            Ok(_) => true,
            Err(e) => {
                log::error!("TUN write error: {}", e);
                false
            }
        }
    }

    /// Run both pumps until the shutdown signal fires.
    ///
    /// Transport errors are logged and the loops continue; only shutdown
    /// stops them.
    pub async fn run(self: Arc<Self>, shutdown: broadcast::Sender<()>) -> Result<()> {
        let mut egress_shutdown = shutdown.subscribe();
        let mut ingress_shutdown = shutdown.subscribe();

        let egress = {
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                let mut buf = vec![0u8; BUFFER_SIZE];
                loop {
                    tokio::select! {
                        _ = egress_shutdown.recv() => break,
                        result = relay.tun.recv(&mut buf) => match result {
                            Ok(n) if n > 0 => {
                                relay.forward_packet(&buf[..n]).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                log::error!("TUN read error: {}", e);
                            }
                        },
                    }
                }
                log::debug!("Egress pump stopped");
            })
        };

        let ingress = {
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                // A fixed-size buffer: datagrams larger than this are
                // truncated by the kernel and then fail authentication.
                let mut buf = vec![0u8; BUFFER_SIZE];
                loop {
                    tokio::select! {
                        _ = ingress_shutdown.recv() => break,
                        result = relay.udp.recv_from(&mut buf) => match result {
                            Ok((n, from)) => {
                                relay.handle_datagram(&buf[..n], from).await;
                            }
                            Err(e) => {
                                log::error!("UDP receive error: {}", e);
                            }
                        },
                    }
                }
                log::debug!("Ingress pump stopped");
            })
        };

        let _ = tokio::join!(egress, ingress);
        Ok(())
    }
}
