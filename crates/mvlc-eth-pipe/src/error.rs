use std::time::Duration;

use mvlc_eth_transport::TransportError;

/// Errors that can occur in pipe operations.
#[derive(Debug, thiserror::Error)]
pub enum EthError {
    /// Setting up the connection failed (resolve, bind, connect).
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// A blocking call exceeded the pipe's configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The pipe's socket was closed while the call was in progress.
    #[error("socket closed")]
    Closed,

    /// The transport is not connected.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called on a connected transport.
    #[error("already connected")]
    AlreadyConnected,

    /// Socket error, passed through verbatim.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The outgoing payload does not fit into a single datagram.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl EthError {
    /// Recoverable; the caller decides whether to retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Fatal for the current session; a reconnect is required.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::NotConnected)
    }
}

impl From<TransportError> for EthError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(timeout) => Self::Timeout(timeout),
            TransportError::Closed => Self::Closed,
            TransportError::Io(io) => Self::Io(io),
            other => Self::Transport(other),
        }
    }
}

/// A stream read that stopped early.
///
/// Bytes already copied into the caller's buffer are reported in
/// `bytes_transferred` and are valid.
#[derive(Debug, thiserror::Error)]
#[error("stream read stopped after {bytes_transferred} bytes: {error}")]
pub struct StreamReadError {
    pub bytes_transferred: usize,
    #[source]
    pub error: EthError,
}

impl StreamReadError {
    pub(crate) fn new(bytes_transferred: usize, error: EthError) -> Self {
        Self {
            bytes_transferred,
            error,
        }
    }
}

pub type Result<T> = std::result::Result<T, EthError>;
