//! UDP transport for mesytec MVLC VME controllers.
//!
//! The controller is reached over two UDP pipes (command and data). This
//! crate receives packets on them, decodes the two packet header words,
//! detects packet loss per packet channel and keeps traffic statistics that
//! can be read while the receive loops run.
//!
//! # Crate Structure
//!
//! - [`transport`]: datagram socket capability (UDP, in-memory pairs)
//! - [`frame`]: packet header decoding, packet channels, loss calculation
//! - [`pipe`]: per-pipe reads, statistics and the [`pipe::EthTransport`] facade
//!
//! ```no_run
//! use mvlc_eth::pipe::{EthTransport, Pipe};
//!
//! let transport = EthTransport::new("mvlc-0042");
//! transport.connect()?;
//! let mut buf = vec![0u8; mvlc_eth::pipe::JUMBO_FRAME_MAX_SIZE];
//! let packet = transport.read_packet(Pipe::Data, &mut buf)?;
//! println!("packet {:?} lost {}", packet.packet_number(), packet.lost_packets());
//! # Ok::<(), mvlc_eth::pipe::EthError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use mvlc_eth_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mvlc_eth_frame::*;
}

/// Re-export pipe and facade types.
pub mod pipe {
    pub use mvlc_eth_pipe::*;
}
