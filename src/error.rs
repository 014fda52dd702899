//! Error types for the DHCP server.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.
//!
//! Protocol-level drops (malformed datagrams, exhausted pool, policy
//! rejections) are not errors: per DHCP semantics the server says nothing
//! back and the client retries. Those paths are modeled in the engine as
//! [`Discard`](crate::engine::Discard), not here.

/// Errors that can occur during DHCP server operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed DHCP packet.
    ///
    /// Packets that are too short or carry a bad magic cookie. The engine
    /// converts this into a silent discard; it never reaches the wire.
    #[error("Invalid DHCP packet: {0}")]
    InvalidPacket(String),

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate) when the
    /// configuration contains invalid values (e.g., a pool that does not
    /// fit in the last address octet).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without administrator
    /// privileges.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
