//! Engine wiring for server and client modes
//!
//! Builds the TUN device, UDP socket, routes, and relay from a
//! [`Config`] and runs until shutdown. Server and client share the same
//! relay; they differ only in how the peer session is seeded and which
//! routes get installed.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use ipnet::{IpNet, Ipv4Net};
use wall_protocol::{FrameCodec, PeerSession};
use wall_tun::{AppliedRoutes, Route, RouteManager, TunConfig, TunDevice};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::netio::{TunEndpoint, UdpEndpoint};
use crate::relay::TunnelRelay;

/// Tunnel role (server or client)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// Tunnel engine for one endpoint
///
/// Owns the configuration and the shutdown channel. `start` blocks until
/// shutdown is signalled, then tears the routes back down.
pub struct Engine {
    config: Config,
    role: Role,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl Engine {
    /// Create a new engine with the given configuration and role
    pub fn new(config: Config, role: Role) -> Result<Self> {
        config.validate()?;

        // The section for the selected role must exist
        match role {
            Role::Server => {
                config.server_config()?;
            }
            Role::Client => {
                config.client_config()?;
            }
        }

        Ok(Self {
            config,
            role,
            shutdown_tx: None,
        })
    }

    /// Create a shutdown handle before starting the engine.
    ///
    /// Lets the caller keep a handle to stop the engine after it has
    /// been moved into a task.
    pub fn create_shutdown_handle(&mut self) -> broadcast::Sender<()> {
        let (shutdown_tx, _) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx.clone());
        shutdown_tx
    }

    /// Stop the engine
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Start the engine and run until shutdown
    pub async fn start(&mut self) -> Result<()> {
        let shutdown_tx = match self.shutdown_tx.clone() {
            Some(tx) => tx,
            None => {
                let (tx, _) = broadcast::channel(1);
                self.shutdown_tx = Some(tx.clone());
                tx
            }
        };

        match self.role {
            Role::Server => self.start_server(shutdown_tx).await,
            Role::Client => self.start_client(shutdown_tx).await,
        }
    }

    async fn start_server(&self, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        let server_config = self.config.server_config()?;
        let common = &self.config.common;

        let keys = self.config.derive_keys()?;
        let codec = FrameCodec::new(keys);

        let tun = self
            .create_tun(server_config.tunnel_ip, server_config.prefix)
            .await?;
        let tun_name = tun.name().to_string();

        let socket = UdpSocket::bind(server_config.bind_addr())
            .await
            .map_err(|e| {
                Error::Connection(format!(
                    "failed to bind UDP socket on {}: {}",
                    server_config.bind_addr(),
                    e
                ))
            })?;
        log::info!(
            "Listening on {} (tunnel {}/{}, MTU {})",
            server_config.bind_addr(),
            server_config.tunnel_ip,
            server_config.prefix,
            common.mtu
        );

        // Route the tunnel network into the interface
        let route_manager = RouteManager::new()?;
        let mut routes = AppliedRoutes::new();
        let tunnel_net = Ipv4Net::new(server_config.tunnel_ip, server_config.prefix)
            .map_err(|e| Error::Config(format!("invalid tunnel network: {}", e)))?
            .trunc();
        routes
            .add(
                &route_manager,
                Route::interface_route(IpNet::V4(tunnel_net), &tun_name),
            )
            .await?;

        // The server waits for the first authenticated frame to learn
        // its peer, so the session starts empty.
        let relay = Arc::new(TunnelRelay::new(
            Arc::new(TunEndpoint::new(tun)),
            Arc::new(UdpEndpoint::new(Arc::new(socket))),
            codec,
            Arc::new(PeerSession::new()),
        ));

        let result = relay.run(shutdown_tx).await;

        routes.cleanup(&route_manager).await?;
        result
    }

    async fn start_client(&self, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        let client_config = self.config.client_config()?;
        let common = &self.config.common;

        let keys = self.config.derive_keys()?;
        let codec = FrameCodec::new(keys);

        let server_addr = client_config.resolve_server()?;
        log::info!("Tunnel endpoint: {}", server_addr);

        let tun = self
            .create_tun(client_config.tunnel_ip, client_config.prefix)
            .await?;
        let tun_name = tun.name().to_string();

        let socket = UdpSocket::bind(unspecified_bind_addr(server_addr))
            .await
            .map_err(|e| Error::Connection(format!("failed to bind UDP socket: {}", e)))?;
        log::info!(
            "Client bound to {} (tunnel {}/{}, MTU {})",
            socket.local_addr()?,
            client_config.tunnel_ip,
            client_config.prefix,
            common.mtu
        );

        let route_manager = RouteManager::new()?;
        let mut routes = AppliedRoutes::new();

        if client_config.route_all_traffic {
            self.setup_client_routes(&route_manager, &mut routes, server_addr, &tun_name)
                .await?;
        }

        let relay = Arc::new(TunnelRelay::new(
            Arc::new(TunEndpoint::new(tun)),
            Arc::new(UdpEndpoint::new(Arc::new(socket))),
            codec,
            Arc::new(PeerSession::with_peer(server_addr)),
        ));

        let result = relay.run(shutdown_tx).await;

        routes.cleanup(&route_manager).await?;
        result
    }

    /// Pin the server onto the physical uplink, then cover 0.0.0.0/0
    /// with two /1 routes through the tunnel. Ordering matters: once the
    /// half-space routes are in, the server's own frames would otherwise
    /// loop back into the tunnel.
    async fn setup_client_routes(
        &self,
        route_manager: &RouteManager,
        routes: &mut AppliedRoutes,
        server_addr: SocketAddr,
        tun_name: &str,
    ) -> Result<()> {
        let server_ip = match server_addr.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => {
                return Err(Error::Config(
                    "route_all_traffic requires an IPv4 server address".into(),
                ));
            }
        };

        let gateway = route_manager.get_default_gateway().await?;
        routes
            .add(route_manager, Route::host_via(server_ip, gateway))
            .await?;

        for route in Route::split_default(tun_name) {
            routes.add(route_manager, route).await?;
        }

        Ok(())
    }

    async fn create_tun(
        &self,
        address: std::net::Ipv4Addr,
        prefix: u8,
    ) -> Result<TunDevice> {
        // On macOS the system assigns utun device names
        #[allow(unused_mut)]
        let mut builder = TunConfig::builder();
        #[cfg(not(target_os = "macos"))]
        {
            let name = self.config.common.tun_device.as_deref().unwrap_or("cw0");
            builder = builder.name(name);
        }

        let tun_config = builder
            .ipv4(address, prefix)
            .mtu(self.config.common.mtu)
            .build()?;

        let device = TunDevice::create(tun_config).await?;
        Ok(device)
    }
}

fn unspecified_bind_addr(server: SocketAddr) -> SocketAddr {
    // Match the server's address family
    match server {
        SocketAddr::V4(_) => "0.0.0.0:0".parse().expect("valid address"),
        SocketAddr::V6(_) => "[::]:0".parse().expect("valid address"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_engine_requires_role_section() {
        let toml = format!(
            r#"
            [common]
            secret = "{SECRET}"

            [server]
            "#
        );
        let config = Config::from_toml(&toml).unwrap();

        assert!(Engine::new(config.clone(), Role::Server).is_ok());
        assert!(Engine::new(config, Role::Client).is_err());
    }

    #[test]
    fn test_bind_addr_family_matches_server() {
        let v4: SocketAddr = "203.0.113.1:1194".parse().unwrap();
        assert!(unspecified_bind_addr(v4).is_ipv4());

        let v6: SocketAddr = "[2001:db8::1]:1194".parse().unwrap();
        assert!(unspecified_bind_addr(v6).is_ipv6());
    }
}
