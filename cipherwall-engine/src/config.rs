//! Configuration types for the tunnel engine
//!
//! The configuration file uses TOML format with sections for both server
//! and client modes; only the section matching the running mode is used.
//!
//! ```toml
//! [common]
//! secret = "0123456789abcdef0123456789abcdef"
//! mtu = 1452
//!
//! [server]
//! listen = "0.0.0.0"
//! port = 1194
//! tunnel_ip = "10.8.0.1"
//!
//! [client]
//! server = "vpn.example.com:1194"
//! tunnel_ip = "10.8.0.2"
//! route_all_traffic = true
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;

use wall_protocol::{
    derive_keys, KeyMaterial, BUFFER_SIZE, DEFAULT_ITERATIONS, DEFAULT_SALT, FRAME_OVERHEAD,
};

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Common settings shared between server and client
    #[serde(default)]
    pub common: CommonConfig,

    /// Server-specific configuration
    pub server: Option<ServerConfig>,

    /// Client-specific configuration
    pub client: Option<ClientConfig>,
}

/// Settings shared between server and client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Pre-shared secret, exactly 32 bytes. Both endpoints must match.
    #[serde(default)]
    pub secret: String,

    /// PBKDF2 salt. Both endpoints must match.
    #[serde(default = "default_salt")]
    pub salt: String,

    /// PBKDF2 iteration count. Both endpoints must match.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// MTU for the tunnel interface
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// TUN device name (optional; system-assigned when unset)
    pub tun_device: Option<String>,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            salt: default_salt(),
            iterations: default_iterations(),
            mtu: default_mtu(),
            tun_device: None,
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to listen on
    #[serde(default = "default_listen")]
    pub listen: IpAddr,

    /// UDP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server's address on the tunnel network
    #[serde(default = "default_server_tunnel_ip")]
    pub tunnel_ip: Ipv4Addr,

    /// Tunnel network prefix length
    #[serde(default = "default_prefix")]
    pub prefix: u8,
}

impl ServerConfig {
    /// The socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.prefix > 32 {
            return Err(Error::Config(format!(
                "tunnel prefix {} is invalid (max 32)",
                self.prefix
            )));
        }
        Ok(())
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint as host:port
    pub server: String,

    /// Client's address on the tunnel network
    #[serde(default = "default_client_tunnel_ip")]
    pub tunnel_ip: Ipv4Addr,

    /// Tunnel network prefix length
    #[serde(default = "default_prefix")]
    pub prefix: u8,

    /// Route all traffic through the tunnel
    #[serde(default = "default_true")]
    pub route_all_traffic: bool,
}

impl ClientConfig {
    /// Resolve the configured server endpoint to a socket address.
    ///
    /// A hostname resolving to several addresses uses the first one.
    pub fn resolve_server(&self) -> Result<SocketAddr> {
        self.server
            .to_socket_addrs()
            .map_err(|e| Error::Connection(format!("cannot resolve '{}': {}", self.server, e)))?
            .next()
            .ok_or_else(|| {
                Error::Connection(format!("'{}' resolved to no addresses", self.server))
            })
    }

    fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(Error::Config("client server address is required".into()));
        }
        if self.prefix > 32 {
            return Err(Error::Config(format!(
                "tunnel prefix {} is invalid (max 32)",
                self.prefix
            )));
        }
        Ok(())
    }
}

fn default_salt() -> String {
    DEFAULT_SALT.to_string()
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_mtu() -> u16 {
    (BUFFER_SIZE - FRAME_OVERHEAD) as u16
}

fn default_listen() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    1194
}

fn default_server_tunnel_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 8, 0, 1)
}

fn default_client_tunnel_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 8, 0, 2)
}

fn default_prefix() -> u8 {
    24
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.common.secret.is_empty() {
            return Err(Error::Config("secret is required".into()));
        }

        if self.common.secret.len() != 32 {
            return Err(Error::Config(format!(
                "secret must be exactly 32 bytes, got {}",
                self.common.secret.len()
            )));
        }

        if self.common.mtu < 576 {
            return Err(Error::Config(format!(
                "MTU {} is too small (minimum 576)",
                self.common.mtu
            )));
        }

        // A full-size packet plus frame overhead must fit the receive buffer
        if self.common.mtu as usize + FRAME_OVERHEAD > BUFFER_SIZE {
            return Err(Error::Config(format!(
                "MTU {} is too large (maximum {})",
                self.common.mtu,
                BUFFER_SIZE - FRAME_OVERHEAD
            )));
        }

        if let Some(ref server) = self.server {
            server.validate()?;
        }

        if let Some(ref client) = self.client {
            client.validate()?;
        }

        Ok(())
    }

    /// Derive the frame keys from the configured secret.
    ///
    /// Fails at startup when the secret has the wrong length.
    pub fn derive_keys(&self) -> Result<KeyMaterial> {
        let keys = derive_keys(
            self.common.secret.as_bytes(),
            self.common.salt.as_bytes(),
            self.common.iterations,
        )?;
        Ok(keys)
    }

    /// Get the server configuration, or error if not present
    pub fn server_config(&self) -> Result<&ServerConfig> {
        self.server
            .as_ref()
            .ok_or_else(|| Error::Config("server configuration is required".into()))
    }

    /// Get the client configuration, or error if not present
    pub fn client_config(&self) -> Result<&ClientConfig> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Config("client configuration is required".into()))
    }

    /// Generate a sample configuration
    pub fn sample() -> String {
        r#"# CipherWall tunnel configuration

# Shared settings used by both server and client
[common]
# Pre-shared secret, exactly 32 bytes (required).
# Both endpoints must use the same value.
secret = "change-me-to-a-32-byte-secret!!!"

# PBKDF2 salt and iteration count. Both endpoints must match.
# salt = "cipherwall-salt-2025"
# iterations = 100000

# MTU for the tunnel interface (default: 1452).
# Leaves room for the 48-byte frame overhead inside a 1500-byte datagram.
mtu = 1452

# TUN device name (optional)
# On macOS the system assigns utun device names and this is ignored.
# tun_device = "cw0"

# Server configuration (used when running as server)
[server]
# IP address to listen on
listen = "0.0.0.0"

# UDP port to listen on
port = 1194

# Server's address on the tunnel network
tunnel_ip = "10.8.0.1"

# Tunnel network prefix length
prefix = 24

# Client configuration (used when running as client)
[client]
# Server endpoint as host:port (required)
server = "vpn.example.com:1194"

# Client's address on the tunnel network
tunnel_ip = "10.8.0.2"

# Tunnel network prefix length (should match server)
prefix = 24

# Route all traffic through the tunnel (default: true).
# The server's address is pinned onto the physical uplink first.
route_all_traffic = true
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn minimal_server_toml() -> String {
        format!(
            r#"
            [common]
            secret = "{SECRET}"

            [server]
            "#
        )
    }

    #[test]
    fn test_parse_minimal_server_config() {
        let config = Config::from_toml(&minimal_server_toml()).unwrap();
        let server = config.server_config().unwrap();

        assert_eq!(server.listen, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(server.port, 1194);
        assert_eq!(server.tunnel_ip, Ipv4Addr::new(10, 8, 0, 1));
        assert_eq!(server.prefix, 24);
        assert_eq!(config.common.mtu, 1452);
        assert_eq!(config.common.salt, DEFAULT_SALT);
        assert_eq!(config.common.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_parse_client_config() {
        let toml = format!(
            r#"
            [common]
            secret = "{SECRET}"

            [client]
            server = "127.0.0.1:1194"
            route_all_traffic = false
            "#
        );
        let config = Config::from_toml(&toml).unwrap();
        let client = config.client_config().unwrap();

        assert_eq!(client.tunnel_ip, Ipv4Addr::new(10, 8, 0, 2));
        assert!(!client.route_all_traffic);
        assert_eq!(
            client.resolve_server().unwrap(),
            "127.0.0.1:1194".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_secret_rejected() {
        let toml = r#"
            [server]
            port = 1194
        "#;
        let err = Config::from_toml(toml).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_wrong_secret_length_rejected() {
        let toml = r#"
            [common]
            secret = "too-short"

            [server]
        "#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_oversized_mtu_rejected() {
        let toml = format!(
            r#"
            [common]
            secret = "{SECRET}"
            mtu = 1453

            [server]
            "#
        );
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        // The sample ships a placeholder secret of the right length
        let config = Config::from_toml(&Config::sample()).unwrap();
        assert!(config.server.is_some());
        assert!(config.client.is_some());
        config.derive_keys().unwrap();
    }

    #[test]
    fn test_derive_keys_from_config() {
        let config = Config::from_toml(&minimal_server_toml()).unwrap();
        let a = config.derive_keys().unwrap();
        let b = config.derive_keys().unwrap();
        assert_eq!(a.encryption_key(), b.encryption_key());
    }
}
