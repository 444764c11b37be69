//! Pipes, statistics and the connection facade for the MVLC Ethernet transport.
//!
//! An MVLC controller is reached over two UDP links, the command pipe and the
//! data pipe. [`EthTransport`] opens both, and per pipe offers:
//! - single-packet reads with header decoding and loss accounting
//! - stream reads that concatenate header-stripped payload across packets
//! - writes of single datagrams
//!
//! Every received packet is counted in a shared [`StatsRegistry`] that
//! monitor threads can snapshot or reset while reads are in progress.

pub mod buffer;
pub mod config;
pub mod error;
pub mod eth;
pub mod packet;
pub mod pipe;
pub mod stats;
pub mod ticket;
pub mod transport;

pub use buffer::{BufferState, ReceiveBuffer};
pub use config::{
    EthConfig, COMMAND_PORT, DATA_PORT, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
    DESIRED_DATA_RECEIVE_BUFFER_SIZE, JUMBO_FRAME_MAX_SIZE, MAX_OUTGOING_PAYLOAD_SIZE,
};
pub use error::{EthError, Result, StreamReadError};
pub use eth::{ConnectionInfo, EthTransport};
pub use mvlc_eth_frame::calc_packet_loss;
pub use packet::PacketReadResult;
pub use pipe::{Pipe, PIPE_COUNT};
pub use stats::{
    HeaderPointer, HeaderTypeMap, PacketChannelStats, PacketRecord, PacketSizeMap, PipeStats,
    StatsRegistry, StatsSnapshot,
};
pub use ticket::{TicketMutex, TicketMutexGuard};
pub use transport::{PipeTimeouts, PipeTransport};
