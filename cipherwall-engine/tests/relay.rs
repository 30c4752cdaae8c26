//! Relay behavior tests over mock transports

use std::net::SocketAddr;
use std::sync::Arc;

use cipherwall_engine::TunnelRelay;
use wall_protocol::transport::mock::{MockTunDevice, MockUdpSocket};
use wall_protocol::transport::UdpTransport;
use wall_protocol::{derive_keys, FrameCodec, PeerSession};

const SECRET: [u8; 32] = [0x61; 32];

fn codec() -> FrameCodec {
    FrameCodec::new(derive_keys(&SECRET, b"test-salt", 1000).unwrap())
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn make_relay(
    peer: PeerSession,
) -> (
    Arc<MockTunDevice>,
    Arc<MockUdpSocket>,
    TunnelRelay<MockTunDevice, MockUdpSocket>,
) {
    let tun = Arc::new(MockTunDevice::new("cw-test", 1452));
    let udp = Arc::new(MockUdpSocket::new(addr("127.0.0.1:1194")));
    let relay = TunnelRelay::new(
        Arc::clone(&tun),
        Arc::clone(&udp),
        codec(),
        Arc::new(peer),
    );
    (tun, udp, relay)
}

#[tokio::test]
async fn egress_drops_until_peer_is_known() {
    let (_tun, udp, relay) = make_relay(PeerSession::new());

    // Server side before any client frame arrived
    assert!(!relay.forward_packet(b"orphan packet").await);
    assert!(udp.get_sent().is_empty());
}

#[tokio::test]
async fn egress_seals_to_current_peer() {
    let peer_addr = addr("198.51.100.7:40000");
    let (_tun, udp, relay) = make_relay(PeerSession::with_peer(peer_addr));

    assert!(relay.forward_packet(b"ping").await);

    let sent = udp.get_sent();
    assert_eq!(sent.len(), 1);
    let (frame, to) = &sent[0];
    assert_eq!(*to, peer_addr);
    assert_eq!(frame.len(), 52);
    assert_eq!(codec().open(frame).unwrap(), b"ping");
}

#[tokio::test]
async fn authenticated_frame_learns_and_follows_peer() {
    let (tun, _udp, relay) = make_relay(PeerSession::new());

    let frame = codec().seal(b"from the client").unwrap();

    // First frame sets the peer
    assert!(relay.handle_datagram(&frame, addr("198.51.100.7:40000")).await);
    assert_eq!(relay.peer().current(), Some(addr("198.51.100.7:40000")));

    // NAT rebinding: the peer follows the latest authenticated source
    let frame = codec().seal(b"after rebinding").unwrap();
    assert!(relay.handle_datagram(&frame, addr("198.51.100.7:40017")).await);
    assert_eq!(relay.peer().current(), Some(addr("198.51.100.7:40017")));

    let delivered = tun.get_sent();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0], b"from the client");
    assert_eq!(delivered[1], b"after rebinding");
}

#[tokio::test]
async fn garbage_datagram_does_not_move_peer() {
    let (tun, _udp, relay) = make_relay(PeerSession::new());

    assert!(!relay.handle_datagram(&[0u8; 200], addr("192.0.2.1:9999")).await);
    assert!(!relay.handle_datagram(&[0u8; 10], addr("192.0.2.1:9999")).await);

    assert_eq!(relay.peer().current(), None);
    assert!(tun.get_sent().is_empty());
}

#[tokio::test]
async fn forged_frame_cannot_steal_established_peer() {
    let legit = addr("198.51.100.7:40000");
    let (tun, _udp, relay) = make_relay(PeerSession::new());

    let frame = codec().seal(b"real traffic").unwrap();
    assert!(relay.handle_datagram(&frame, legit).await);

    // Attacker replays a tampered frame from another address
    let mut forged = codec().seal(b"evil").unwrap();
    forged[0] ^= 0xFF;
    assert!(!relay.handle_datagram(&forged, addr("203.0.113.66:666")).await);

    assert_eq!(relay.peer().current(), Some(legit));
    assert_eq!(tun.get_sent(), vec![b"real traffic".to_vec()]);
}

#[tokio::test]
async fn wrong_key_frames_are_dropped() {
    let (tun, _udp, relay) = make_relay(PeerSession::new());

    let other = FrameCodec::new(derive_keys(&[0x62u8; 32], b"test-salt", 1000).unwrap());
    let frame = other.seal(b"wrong universe").unwrap();

    assert!(!relay.handle_datagram(&frame, addr("192.0.2.1:1000")).await);
    assert!(tun.get_sent().is_empty());
}

#[tokio::test]
async fn truncated_datagram_fails_authentication() {
    let (tun, _udp, relay) = make_relay(PeerSession::new());

    // A datagram cut short in flight keeps the tag but loses ciphertext
    let frame = codec().seal(&vec![0xAB; 800]).unwrap();
    assert!(
        !relay
            .handle_datagram(&frame[..frame.len() - 100], addr("192.0.2.1:1000"))
            .await
    );
    assert!(tun.get_sent().is_empty());
}

#[tokio::test]
async fn end_to_end_exchange_over_paired_sockets() {
    let client_addr = addr("127.0.0.1:50000");
    let server_addr = addr("127.0.0.1:1194");

    let client_tun = Arc::new(MockTunDevice::new("cw-client", 1452));
    let server_tun = Arc::new(MockTunDevice::new("cw-server", 1452));
    let client_udp = Arc::new(MockUdpSocket::new(client_addr));
    let server_udp = Arc::new(MockUdpSocket::new(server_addr));
    MockUdpSocket::connect_pair(&client_udp, &server_udp);

    let client = TunnelRelay::new(
        Arc::clone(&client_tun),
        Arc::clone(&client_udp),
        codec(),
        Arc::new(PeerSession::with_peer(server_addr)),
    );
    let server = TunnelRelay::new(
        Arc::clone(&server_tun),
        Arc::clone(&server_udp),
        codec(),
        Arc::new(PeerSession::new()),
    );

    // Client tunnels a packet to the server
    assert!(client.forward_packet(b"request").await);
    let mut buf = [0u8; 1500];
    let (n, from) = server_udp.recv_from(&mut buf).await.unwrap();
    assert!(server.handle_datagram(&buf[..n], from).await);
    assert_eq!(server_tun.get_sent(), vec![b"request".to_vec()]);
    assert_eq!(server.peer().current(), Some(client_addr));

    // Server replies now that it knows the peer
    assert!(server.forward_packet(b"response").await);
    let (n, from) = client_udp.recv_from(&mut buf).await.unwrap();
    assert!(client.handle_datagram(&buf[..n], from).await);
    assert_eq!(client_tun.get_sent(), vec![b"response".to_vec()]);
}
