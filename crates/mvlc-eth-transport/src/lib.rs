//! Datagram socket capability for the MVLC Ethernet transport.
//!
//! Provides a unified interface over message-oriented sockets:
//! - UDP sockets connected to one controller port ([`UdpDatagramSocket`])
//! - In-process socket pairs ([`MemorySocket`])
//!
//! This is the lowest layer of mvlc-eth. Everything else builds on top of
//! the [`DatagramSocket`] trait provided here. Platform differences (socket
//! options, receive-queue queries) stay inside this crate.

pub mod error;
pub mod memory;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemorySocket};
pub use traits::{DatagramSocket, SocketConnector, SocketOptions};
pub use udp::{resolve_host, UdpConnector, UdpDatagramSocket};
