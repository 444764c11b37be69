use std::time::Duration;

use crate::pipe::Pipe;

/// UDP port of the command pipe.
pub const COMMAND_PORT: u16 = 0x8000;
/// UDP port of the data pipe.
pub const DATA_PORT: u16 = 0x8001;

/// Largest datagram the controller sends; sizes the receive buffers.
pub const JUMBO_FRAME_MAX_SIZE: usize = 9000;

/// 1500 byte MTU minus IPv4 and UDP headers.
pub const MAX_OUTGOING_PAYLOAD_SIZE: usize = 1500 - 20 - 8;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Kernel receive buffer requested for the data socket.
pub const DESIRED_DATA_RECEIVE_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Connection settings for [`EthTransport`](crate::EthTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthConfig {
    pub command_port: u16,
    pub data_port: u16,
    /// Initial read timeout of both pipes.
    pub read_timeout: Duration,
    /// Initial write timeout of both pipes.
    pub write_timeout: Duration,
    /// `None` keeps the OS default for the data socket.
    pub data_receive_buffer_size: Option<usize>,
}

impl Default for EthConfig {
    fn default() -> Self {
        Self {
            command_port: COMMAND_PORT,
            data_port: DATA_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            data_receive_buffer_size: Some(DESIRED_DATA_RECEIVE_BUFFER_SIZE),
        }
    }
}

impl EthConfig {
    pub fn port(&self, pipe: Pipe) -> u16 {
        match pipe {
            Pipe::Command => self.command_port,
            Pipe::Data => self.data_port,
        }
    }

    /// Requested kernel receive buffer size for `pipe`.
    pub fn receive_buffer_size(&self, pipe: Pipe) -> Option<usize> {
        match pipe {
            Pipe::Command => None,
            Pipe::Data => self.data_receive_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller() {
        let config = EthConfig::default();
        assert_eq!(config.port(Pipe::Command), 32768);
        assert_eq!(config.port(Pipe::Data), 32769);
        assert_eq!(config.read_timeout, Duration::from_millis(500));
        assert_eq!(config.receive_buffer_size(Pipe::Command), None);
        assert_eq!(
            config.receive_buffer_size(Pipe::Data),
            Some(10 * 1024 * 1024)
        );
        assert_eq!(MAX_OUTGOING_PAYLOAD_SIZE, 1472);
    }
}
