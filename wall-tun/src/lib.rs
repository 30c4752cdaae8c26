//! TUN device and route management for the CipherWall tunnel
//!
//! Provides a unified API for creating the tunnel's point-to-point TUN
//! interface and steering traffic into it:
//!
//! - **Device management**: create and configure the TUN interface
//! - **Route management**: add/remove routes, discover the default
//!   gateway, and install the split-default routes the client uses to
//!   send all traffic through the tunnel
//!
//! Device creation requires root privileges (or `CAP_NET_ADMIN` on
//! Linux). All I/O is async on the Tokio runtime.
//!
//! ```ignore
//! use wall_tun::{TunConfig, TunDevice};
//!
//! let config = TunConfig::builder()
//!     .name("cw0")
//!     .ipv4_with_dest("10.8.0.2".parse()?, 24, "10.8.0.1".parse()?)
//!     .mtu(1452)
//!     .build()?;
//!
//! let device = TunDevice::create(config).await?;
//! let mut buf = vec![0u8; 2000];
//! let n = device.read(&mut buf).await?;
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod route;

pub use config::{Ipv4Config, TunConfig, TunConfigBuilder};
pub use device::TunDevice;
pub use error::{Error, Result};
pub use route::{AppliedRoutes, Route, RouteManager};

/// Default MTU for tunnel interfaces, leaving room for frame overhead
/// inside a 1500-byte UDP payload
pub const DEFAULT_MTU: u16 = 1452;
