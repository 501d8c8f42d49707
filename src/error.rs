//! Error types for the relay.
//!
//! Nothing here is fatal once the listeners are up: message and connection
//! errors are logged by the caller and the relay keeps serving.

use std::net::SocketAddr;

use crate::types::ConnectionId;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Failed to deliver message to connection {connection}: {reason}")]
    SendFailure {
        connection: ConnectionId,
        reason: &'static str,
    },

    #[error("Public address provisioning failed: {0}")]
    Provisioning(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
