use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Options applied when a datagram socket is opened.
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Send timeout. `Duration::ZERO` blocks indefinitely.
    pub write_timeout: Duration,
    /// Requested kernel receive buffer size. `None` keeps the OS default.
    pub receive_buffer_size: Option<usize>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(500),
            receive_buffer_size: None,
        }
    }
}

/// A connected, message-oriented socket bound to exactly one remote endpoint.
///
/// All methods take `&self` so that a receive loop and a closing thread can
/// share one socket. Implementations must make a receive that is blocked in
/// another thread return [`TransportError::Closed`] promptly after
/// [`close`](DatagramSocket::close) is called.
pub trait DatagramSocket: Send + Sync + fmt::Debug {
    /// Send one datagram. Returns the number of bytes sent.
    fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buf`, waiting at most `timeout`.
    ///
    /// Returns the number of bytes written to `buf`. Datagrams larger than
    /// `buf` are truncated. Expiry yields [`TransportError::Timeout`].
    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Update the send timeout.
    fn set_write_timeout(&self, timeout: Duration) -> Result<()>;

    /// Close the socket and wake any blocked receiver.
    fn close(&self);

    /// Whether [`close`](DatagramSocket::close) has been called.
    fn is_closed(&self) -> bool;

    /// Local address of the socket, if known.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Remote address the socket is connected to, if known.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Number of bytes waiting in the receive queue.
    fn pending_bytes(&self) -> Result<usize> {
        Err(TransportError::Io(std::io::Error::from(
            std::io::ErrorKind::Unsupported,
        )))
    }
}

/// Opens datagram sockets to a remote endpoint.
pub trait SocketConnector: Send + Sync {
    /// Open a socket connected to `remote`.
    fn open(&self, remote: SocketAddr, options: &SocketOptions)
        -> Result<Arc<dyn DatagramSocket>>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}
