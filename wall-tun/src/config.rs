//! TUN device configuration

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::DEFAULT_MTU;

/// IPv4 address configuration for a TUN device
#[derive(Debug, Clone)]
pub struct Ipv4Config {
    /// The IPv4 address to assign to the interface
    pub address: Ipv4Addr,
    /// Network prefix length (e.g., 24 for /24)
    pub prefix_len: u8,
    /// Optional destination/peer address for point-to-point links
    pub destination: Option<Ipv4Addr>,
}

impl Ipv4Config {
    /// Create a new IPv4 configuration
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address,
            prefix_len,
            destination: None,
        }
    }

    /// Set the destination/peer address
    pub fn with_destination(mut self, dest: Ipv4Addr) -> Self {
        self.destination = Some(dest);
        self
    }
}

/// Configuration for creating a TUN device
#[derive(Debug, Clone)]
pub struct TunConfig {
    /// Interface name (optional, auto-generated if not specified)
    pub name: Option<String>,
    /// IPv4 configuration
    pub ipv4: Option<Ipv4Config>,
    /// Maximum transmission unit
    pub mtu: u16,
}

impl Default for TunConfig {
    fn default() -> Self {
        Self {
            name: None,
            ipv4: None,
            mtu: DEFAULT_MTU,
        }
    }
}

impl TunConfig {
    /// Create a new configuration builder
    pub fn builder() -> TunConfigBuilder {
        TunConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let ipv4 = self
            .ipv4
            .as_ref()
            .ok_or_else(|| Error::Config("an IPv4 address must be configured".into()))?;

        if ipv4.prefix_len > 32 {
            return Err(Error::InvalidPrefix(format!(
                "IPv4 prefix length {} is invalid (max 32)",
                ipv4.prefix_len
            )));
        }

        if self.mtu < 68 {
            return Err(Error::Config(format!(
                "MTU {} is too small (minimum 68)",
                self.mtu
            )));
        }

        Ok(())
    }
}

/// Builder for TunConfig
#[derive(Debug, Default)]
pub struct TunConfigBuilder {
    config: TunConfig,
}

impl TunConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Set the IPv4 address and prefix length
    pub fn ipv4(mut self, address: Ipv4Addr, prefix_len: u8) -> Self {
        self.config.ipv4 = Some(Ipv4Config::new(address, prefix_len));
        self
    }

    /// Set the IPv4 address with a destination for point-to-point
    pub fn ipv4_with_dest(mut self, address: Ipv4Addr, prefix_len: u8, dest: Ipv4Addr) -> Self {
        self.config.ipv4 = Some(Ipv4Config::new(address, prefix_len).with_destination(dest));
        self
    }

    /// Set the MTU
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.config.mtu = mtu;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<TunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_point_to_point() {
        let config = TunConfig::builder()
            .name("cw0")
            .ipv4_with_dest(
                Ipv4Addr::new(10, 8, 0, 2),
                24,
                Ipv4Addr::new(10, 8, 0, 1),
            )
            .mtu(1452)
            .build()
            .unwrap();

        let ipv4 = config.ipv4.unwrap();
        assert_eq!(ipv4.address, Ipv4Addr::new(10, 8, 0, 2));
        assert_eq!(ipv4.destination, Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(config.mtu, 1452);
    }

    #[test]
    fn test_validate_rejects_missing_address() {
        let config = TunConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_prefix() {
        let config = TunConfig {
            ipv4: Some(Ipv4Config::new(Ipv4Addr::new(10, 8, 0, 1), 33)),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_validate_rejects_tiny_mtu() {
        let config = TunConfig {
            ipv4: Some(Ipv4Config::new(Ipv4Addr::new(10, 8, 0, 1), 24)),
            mtu: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
