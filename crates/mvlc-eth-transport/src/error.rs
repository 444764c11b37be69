use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in datagram transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Host name lookup failed.
    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// Host name lookup succeeded but yielded no IPv4 address.
    #[error("host {host} has no IPv4 address")]
    NoIpv4Address { host: String },

    /// Failed to bind the local end of a socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect the socket to the remote endpoint.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking call exceeded its configured duration.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The socket has been closed.
    #[error("socket closed")]
    Closed,
}

impl TransportError {
    /// Returns true for [`TransportError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
