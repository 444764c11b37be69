//! Connection facade over the command and data pipes.

use std::fmt;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use mvlc_eth_frame::NUM_PACKET_CHANNELS;
use mvlc_eth_transport::{
    resolve_host, DatagramSocket, SocketConnector, SocketOptions, UdpConnector,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{EthConfig, JUMBO_FRAME_MAX_SIZE, MAX_OUTGOING_PAYLOAD_SIZE};
use crate::error::{EthError, Result, StreamReadError};
use crate::packet::PacketReadResult;
use crate::pipe::{Pipe, PIPE_COUNT};
use crate::stats::{PacketChannelStats, PipeStats, StatsRegistry, StatsSnapshot};
use crate::transport::{PipeTimeouts, PipeTransport};

/// Addresses of an established connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub transport: &'static str,
    pub command_remote: SocketAddrV4,
    pub data_remote: SocketAddrV4,
    pub command_local: Option<SocketAddr>,
    pub data_local: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn remote(&self, pipe: Pipe) -> SocketAddrV4 {
        match pipe {
            Pipe::Command => self.command_remote,
            Pipe::Data => self.data_remote,
        }
    }

    pub fn local(&self, pipe: Pipe) -> Option<SocketAddr> {
        match pipe {
            Pipe::Command => self.command_local,
            Pipe::Data => self.data_local,
        }
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mvlc_eth: host={}", self.host)?;
        if self.command_remote.ip().to_string() != self.host {
            write!(f, " ({})", self.command_remote.ip())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Connection {
    info: ConnectionInfo,
    sockets: [Arc<dyn DatagramSocket>; PIPE_COUNT],
}

/// UDP transport to one MVLC controller.
///
/// All methods take `&self`. One thread may read from each pipe while other
/// threads write, query statistics or disconnect. Disconnecting closes both
/// sockets, which makes blocked reads return [`EthError::Closed`].
pub struct EthTransport {
    host: String,
    config: EthConfig,
    connector: Arc<dyn SocketConnector>,
    stats: Arc<StatsRegistry>,
    timeouts: [Arc<PipeTimeouts>; PIPE_COUNT],
    connection: RwLock<Option<Connection>>,
    pipes: [Mutex<Option<PipeTransport>>; PIPE_COUNT],
}

impl EthTransport {
    /// Transport to `host` (name or dotted IPv4) with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_config(host, EthConfig::default())
    }

    pub fn with_config(host: impl Into<String>, config: EthConfig) -> Self {
        Self::with_connector(host, config, Arc::new(UdpConnector))
    }

    /// Transport whose sockets are opened by `connector`.
    pub fn with_connector(
        host: impl Into<String>,
        config: EthConfig,
        connector: Arc<dyn SocketConnector>,
    ) -> Self {
        let timeouts = [
            Arc::new(PipeTimeouts::new(config.read_timeout, config.write_timeout)),
            Arc::new(PipeTimeouts::new(config.read_timeout, config.write_timeout)),
        ];
        Self {
            host: host.into(),
            config,
            connector,
            stats: Arc::new(StatsRegistry::new()),
            timeouts,
            connection: RwLock::new(None),
            pipes: [Mutex::new(None), Mutex::new(None)],
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn config(&self) -> &EthConfig {
        &self.config
    }

    /// Resolve the host and open both pipes.
    ///
    /// Loss tracking starts fresh. Statistics are kept; use
    /// [`reset_pipe_and_channel_stats`](Self::reset_pipe_and_channel_stats)
    /// to clear them.
    pub fn connect(&self) -> Result<()> {
        let mut connection = self.write_connection();
        if connection.is_some() {
            return Err(EthError::AlreadyConnected);
        }

        let ip = *resolve_host(&self.host, self.config.command_port)?.ip();
        let command_remote = SocketAddrV4::new(ip, self.config.command_port);
        let data_remote = SocketAddrV4::new(ip, self.config.data_port);
        debug!(host = %self.host, %ip, transport = self.connector.transport_name(), "resolved controller address");

        let command = self.open_socket(Pipe::Command, command_remote)?;
        let data = match self.open_socket(Pipe::Data, data_remote) {
            Ok(socket) => socket,
            Err(err) => {
                command.close();
                return Err(err);
            }
        };

        let info = ConnectionInfo {
            host: self.host.clone(),
            transport: self.connector.transport_name(),
            command_remote,
            data_remote,
            command_local: command.local_addr(),
            data_local: data.local_addr(),
        };
        let sockets = [command, data];

        for pipe in Pipe::ALL {
            *self.lock_pipe(pipe) = Some(PipeTransport::new(
                pipe,
                Arc::clone(&sockets[pipe.index()]),
                Arc::clone(&self.timeouts[pipe.index()]),
                Arc::clone(&self.stats),
                JUMBO_FRAME_MAX_SIZE,
            ));
        }

        info!(
            host = %self.host,
            command = %command_remote,
            data = %data_remote,
            "connected"
        );
        *connection = Some(Connection { info, sockets });
        Ok(())
    }

    fn open_socket(&self, pipe: Pipe, remote: SocketAddrV4) -> Result<Arc<dyn DatagramSocket>> {
        let options = SocketOptions {
            write_timeout: self.timeouts[pipe.index()].write_timeout(),
            receive_buffer_size: self.config.receive_buffer_size(pipe),
        };
        let socket = self.connector.open(SocketAddr::V4(remote), &options)?;
        debug!(%pipe, %remote, local = ?socket.local_addr(), "pipe socket opened");
        Ok(socket)
    }

    /// Close both pipes. A no-op when not connected.
    pub fn disconnect(&self) -> Result<()> {
        let Some(connection) = self.write_connection().take() else {
            return Ok(());
        };

        // Close first so that readers holding a pipe lock wake up and release it.
        for socket in &connection.sockets {
            socket.close();
        }
        for pipe in Pipe::ALL {
            if let Some(mut transport) = self.lock_pipe(pipe).take() {
                transport.reset();
            }
        }

        info!(host = %self.host, "disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.read_connection().is_some()
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.read_connection().as_ref().map(|c| c.info.clone())
    }

    pub fn remote_address(&self, pipe: Pipe) -> Option<SocketAddrV4> {
        self.read_connection()
            .as_ref()
            .map(|c| c.info.remote(pipe))
    }

    pub fn local_address(&self, pipe: Pipe) -> Option<SocketAddr> {
        self.read_connection()
            .as_ref()
            .and_then(|c| c.info.local(pipe))
    }

    pub fn set_read_timeout(&self, pipe: Pipe, timeout: Duration) {
        self.timeouts[pipe.index()].set_read_timeout(timeout);
    }

    pub fn read_timeout(&self, pipe: Pipe) -> Duration {
        self.timeouts[pipe.index()].read_timeout()
    }

    /// Takes effect on the next `write`.
    pub fn set_write_timeout(&self, pipe: Pipe, timeout: Duration) {
        self.timeouts[pipe.index()].set_write_timeout(timeout);
    }

    pub fn write_timeout(&self, pipe: Pipe) -> Duration {
        self.timeouts[pipe.index()].write_timeout()
    }

    /// Send `payload` as a single datagram on `pipe`.
    pub fn write(&self, pipe: Pipe, payload: &[u8]) -> Result<usize> {
        if payload.len() > MAX_OUTGOING_PAYLOAD_SIZE {
            return Err(EthError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_OUTGOING_PAYLOAD_SIZE,
            });
        }

        let socket = self.socket(pipe)?;
        socket.set_write_timeout(self.write_timeout(pipe))?;
        Ok(socket.send(payload)?)
    }

    /// Stream read of header-stripped payload. See [`PipeTransport::read`].
    pub fn read(&self, pipe: Pipe, dest: &mut [u8]) -> std::result::Result<usize, StreamReadError> {
        let mut guard = self.lock_pipe(pipe);
        let transport = guard
            .as_mut()
            .ok_or_else(|| StreamReadError::new(0, EthError::NotConnected))?;
        transport.read(dest)
    }

    /// Receive one packet on `pipe`. See [`PipeTransport::read_packet`].
    pub fn read_packet<'b>(&self, pipe: Pipe, dest: &'b mut [u8]) -> Result<PacketReadResult<'b>> {
        let mut guard = self.lock_pipe(pipe);
        match guard.as_mut() {
            Some(transport) => transport.read_packet(dest),
            None => {
                self.stats.record_receive_attempt(pipe);
                Err(EthError::NotConnected)
            }
        }
    }

    /// Bytes queued in the kernel receive buffer of `pipe`'s socket.
    pub fn read_queue_size(&self, pipe: Pipe) -> Result<usize> {
        Ok(self.socket(pipe)?.pending_bytes()?)
    }

    pub fn pipe_stats(&self) -> [PipeStats; PIPE_COUNT] {
        self.stats.pipe_stats()
    }

    pub fn packet_channel_stats(&self) -> [PacketChannelStats; NUM_PACKET_CHANNELS] {
        self.stats.packet_channel_stats()
    }

    /// Pipe and channel statistics taken under one lock.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_pipe_and_channel_stats(&self) {
        self.stats.reset();
    }

    /// Shared handle to the statistics, usable after the transport is gone.
    pub fn stats_registry(&self) -> Arc<StatsRegistry> {
        Arc::clone(&self.stats)
    }

    fn socket(&self, pipe: Pipe) -> Result<Arc<dyn DatagramSocket>> {
        self.read_connection()
            .as_ref()
            .map(|c| Arc::clone(&c.sockets[pipe.index()]))
            .ok_or(EthError::NotConnected)
    }

    fn lock_pipe(&self, pipe: Pipe) -> MutexGuard<'_, Option<PipeTransport>> {
        self.pipes[pipe.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_connection(&self) -> RwLockReadGuard<'_, Option<Connection>> {
        self.connection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_connection(&self) -> RwLockWriteGuard<'_, Option<Connection>> {
        self.connection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for EthTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthTransport")
            .field("host", &self.host)
            .field("transport", &self.connector.transport_name())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Drop for EthTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
