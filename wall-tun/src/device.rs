//! TUN device abstraction layer
//!
//! A thin wrapper around the `tun-rs` crate. `tun-rs` takes care of the
//! platform-specific parts: interface creation, address assignment, MTU,
//! and bringing the interface up.
//!
//! ```rust,ignore
//! let config = TunConfig::builder()
//!     .name("cw0")
//!     .ipv4_with_dest("10.8.0.2".parse()?, 24, "10.8.0.1".parse()?)
//!     .mtu(1452)
//!     .build()?;
//!
//! let device = TunDevice::create(config).await?;
//! ```
//!
//! Creating a device requires root or `CAP_NET_ADMIN` on Linux, root on
//! macOS, and Administrator plus the WinTun driver on Windows.

use crate::config::TunConfig;
use crate::error::{Error, Result};

/// Information about a TUN device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Interface name
    pub name: String,
    /// MTU
    pub mtu: u16,
}

/// Cross-platform async TUN device wrapper
pub struct TunDevice {
    inner: tun_rs::AsyncDevice,
    info: DeviceInfo,
}

impl TunDevice {
    /// Create a new TUN device with the given configuration
    pub async fn create(config: TunConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = tun_rs::DeviceBuilder::new();

        if let Some(ref name) = config.name {
            builder = builder.name(name);
        }

        if let Some(ref ipv4) = config.ipv4 {
            builder = builder.ipv4(ipv4.address, ipv4.prefix_len, ipv4.destination);
        }

        builder = builder.mtu(config.mtu);

        let device = builder
            .build_async()
            .map_err(|e| Error::DeviceCreation(e.to_string()))?;

        let name = device
            .name()
            .map_err(|e| Error::DeviceCreation(e.to_string()))?;

        log::info!("Created TUN device: {} (MTU: {})", name, config.mtu);

        Ok(Self {
            inner: device,
            info: DeviceInfo {
                name,
                mtu: config.mtu,
            },
        })
    }

    /// Get the device name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get the MTU
    pub fn mtu(&self) -> u16 {
        self.info.mtu
    }

    /// Get device information
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Read one IP packet from the TUN device
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.recv(buf).await.map_err(Error::Io)
    }

    /// Write one IP packet to the TUN device
    pub async fn write(&self, buf: &[u8]) -> Result<usize> {
        self.inner.send(buf).await.map_err(Error::Io)
    }
}

impl std::fmt::Debug for TunDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunDevice")
            .field("info", &self.info)
            .finish()
    }
}
