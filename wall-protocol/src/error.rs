//! Error types for the tunnel framing protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum Error {
    /// The pre-shared secret has the wrong length. Fatal at startup.
    #[error("shared secret must be exactly 32 bytes, got {actual}")]
    SecretLength { actual: usize },

    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    /// The authentication tag did not match the frame contents.
    #[error("frame authentication failed")]
    Authentication,

    /// Cipher or random-source failure. Never happens in a healthy environment.
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Frame errors are dropped by the relay pumps; everything else is
    /// surfaced to the caller.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Error::FrameTooShort { .. } | Error::Authentication)
    }
}
