//! CipherWall tunnel protocol
//!
//! Implements the secure framing used between the two tunnel endpoints:
//! PBKDF2 key stretching of a pre-shared secret, an AES-256-CFB +
//! HMAC-SHA256 seal/open codec, and the single-peer session tracking the
//! relay uses to address outbound frames.
//!
//! Wire format (raw byte concatenation, no length fields):
//!
//! ```text
//! +------------------+------------------+----------------------------+
//! | tag (32 bytes)   | IV (16 bytes)    | ciphertext (plaintext len) |
//! +------------------+------------------+----------------------------+
//! ```
//!
//! The tag is an HMAC-SHA256 over `IV ‖ ciphertext`. The stream cipher
//! preserves the exact plaintext length, so the minimum valid frame is
//! 48 bytes (empty plaintext).

mod error;
mod frame;
mod keys;
mod peer;
pub mod transport;

pub use error::{Error, Result};
pub use frame::FrameCodec;
pub use keys::{derive_keys, KeyMaterial};
pub use peer::PeerSession;

/// HMAC-SHA256 tag length
pub const TAG_LEN: usize = 32;

/// AES-CFB initialization vector length (AES block size)
pub const IV_LEN: usize = 16;

/// Bytes a sealed frame adds on top of the plaintext
pub const FRAME_OVERHEAD: usize = TAG_LEN + IV_LEN;

/// Fixed receive buffer size for whole frames
pub const BUFFER_SIZE: usize = 1500;

/// Largest plaintext packet that round-trips without truncation
pub const MAX_PACKET_LEN: usize = BUFFER_SIZE - FRAME_OVERHEAD;

/// Default PBKDF2 salt. Both endpoints must use the same value.
pub const DEFAULT_SALT: &str = "cipherwall-salt-2025";

/// Default PBKDF2 iteration count. Both endpoints must use the same value.
pub const DEFAULT_ITERATIONS: u32 = 100_000;
