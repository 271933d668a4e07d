//! Shared error type for edgelink.

use thiserror::Error;

/// Result type alias using edgelink's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for edgelink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket read/write, bind, connect).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame failed to decode (bad JSON, truncated body, or a length
    /// prefix that disagrees with the bytes that followed it).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame decoded its length prefix fine but carried a `kind`
    /// discriminator this build doesn't know. Recoverable: callers should
    /// log and skip the frame rather than tear down the connection.
    #[error("unknown message variant: {0}")]
    UnknownVariant(String),

    /// Encoding a message failed (should not happen for valid
    /// `InputMessage` values; kept for serializer failure paths).
    #[error("encode error: {0}")]
    Encode(String),

    /// CLI/config error (bad hotkey syntax, unresolvable address, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// The OS refused to create the input tap or post synthetic events.
    #[error("permission denied: {0}")]
    Permission(String),
}

impl Error {
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    pub fn permission(msg: impl std::fmt::Display) -> Self {
        Self::Permission(msg.to_string())
    }
}
