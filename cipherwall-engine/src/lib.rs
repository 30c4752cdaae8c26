//! CipherWall tunnel engine
//!
//! Ties the protocol and TUN layers together into a running endpoint:
//! TOML configuration, the packet relay between the TUN device and the
//! UDP socket, and the server/client wiring including routes.
//!
//! ```ignore
//! use cipherwall_engine::{Config, Engine, Role};
//!
//! let config = Config::load("cipherwall.toml")?;
//! let mut engine = Engine::new(config, Role::Client)?;
//! let shutdown = engine.create_shutdown_handle();
//! engine.start().await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod netio;
pub mod relay;

pub use config::{ClientConfig, CommonConfig, Config, ServerConfig};
pub use engine::{Engine, Role};
pub use error::{Error, Result};
pub use relay::TunnelRelay;
