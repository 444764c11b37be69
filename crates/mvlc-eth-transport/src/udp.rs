use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{DatagramSocket, SocketConnector, SocketOptions};

/// Resolve `host` to its first IPv4 address and combine it with `port`.
///
/// Accepts dotted IPv4 strings as well as host names.
pub fn resolve_host(host: &str, port: u16) -> Result<SocketAddrV4> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            source,
        })?;

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| TransportError::NoIpv4Address {
            host: host.to_string(),
        })
}

/// UDP socket connected to a single remote endpoint.
///
/// Receives wait in slices of at most [`UdpDatagramSocket::CLOSE_POLL_INTERVAL`]
/// so that [`close`](DatagramSocket::close) is observed even on platforms where
/// shutting down a datagram socket does not wake a blocked `recv`.
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: UdpSocket,
    local: SocketAddr,
    peer: SocketAddr,
    closed: AtomicBool,
    /// Currently armed `SO_RCVTIMEO` in nanoseconds, cached to avoid a syscall per receive.
    armed_read_timeout: AtomicU64,
}

impl UdpDatagramSocket {
    /// Upper bound on a single blocking `recv`.
    pub const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Bind an ephemeral local port and connect it to `remote`.
    pub fn connect(remote: SocketAddr, options: &SocketOptions) -> Result<Self> {
        let bind_addr: SocketAddr = match remote {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(bind_addr).map_err(|source| TransportError::Bind {
            addr: bind_addr,
            source,
        })?;
        socket
            .connect(remote)
            .map_err(|source| TransportError::Connect {
                addr: remote,
                source,
            })?;

        socket.set_read_timeout(Some(Self::CLOSE_POLL_INTERVAL))?;
        socket.set_write_timeout(blocking_timeout(options.write_timeout))?;

        if let Some(requested) = options.receive_buffer_size {
            match set_receive_buffer_size(&socket, requested) {
                Ok(actual) if actual < requested => {
                    warn!(requested, actual, "kernel granted a smaller receive buffer");
                }
                Ok(actual) => debug!(requested, actual, "receive buffer size set"),
                Err(err) => warn!(requested, %err, "failed to set receive buffer size"),
            }
        }

        let local = socket.local_addr()?;
        debug!(%local, %remote, "udp socket connected");

        Ok(Self {
            socket,
            local,
            peer: remote,
            closed: AtomicBool::new(false),
            armed_read_timeout: AtomicU64::new(Self::CLOSE_POLL_INTERVAL.as_nanos() as u64),
        })
    }

    fn arm_read_timeout(&self, wait: Duration) -> Result<()> {
        let nanos = wait.as_nanos() as u64;
        if self.armed_read_timeout.load(Ordering::Relaxed) != nanos {
            self.socket.set_read_timeout(Some(wait))?;
            self.armed_read_timeout.store(nanos, Ordering::Relaxed);
        }
        Ok(())
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        loop {
            match self.socket.send(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::Timeout(
                        self.socket.write_timeout()?.unwrap_or_default(),
                    ));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_closed() {
                return Err(TransportError::Closed);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            // SO_RCVTIMEO rejects zero, a single short wait still polls once.
            let wait = remaining
                .min(Self::CLOSE_POLL_INTERVAL)
                .max(Duration::from_millis(1));
            self.arm_read_timeout(wait)?;

            match self.socket.recv(buf) {
                // A shutdown socket reports an empty read.
                Ok(_) if self.is_closed() => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout(timeout));
                    }
                }
                Err(_) if self.is_closed() => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn set_write_timeout(&self, timeout: Duration) -> Result<()> {
        self.socket
            .set_write_timeout(blocking_timeout(timeout))
            .map_err(Into::into)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        shutdown(&self.socket);
        debug!(local = %self.local, peer = %self.peer, "udp socket closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    fn pending_bytes(&self) -> Result<usize> {
        pending_bytes(&self.socket)
    }
}

/// Opens [`UdpDatagramSocket`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpConnector;

impl SocketConnector for UdpConnector {
    fn open(
        &self,
        remote: SocketAddr,
        options: &SocketOptions,
    ) -> Result<Arc<dyn DatagramSocket>> {
        Ok(Arc::new(UdpDatagramSocket::connect(remote, options)?))
    }

    fn transport_name(&self) -> &'static str {
        "udp"
    }
}

fn blocking_timeout(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

#[cfg(unix)]
fn shutdown(socket: &UdpSocket) {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `socket` and stays open for the
    // duration of the call. shutdown(2) does not invalidate it.
    unsafe {
        libc::shutdown(socket.as_raw_fd(), libc::SHUT_RDWR);
    }
}

#[cfg(not(unix))]
fn shutdown(_socket: &UdpSocket) {}

#[cfg(unix)]
fn set_receive_buffer_size(socket: &UdpSocket, size: usize) -> Result<usize> {
    use std::os::fd::AsRawFd;

    let fd = socket.as_raw_fd();
    let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);

    // SAFETY: `value` is a valid readable c_int for the given length and `fd`
    // is an open socket descriptor owned by this process.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut actual: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `actual` and `len` are valid writable pointers for the provided sizes.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            (&mut actual as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(usize::try_from(actual).unwrap_or(0))
}

#[cfg(not(unix))]
fn set_receive_buffer_size(_socket: &UdpSocket, _size: usize) -> Result<usize> {
    Err(std::io::Error::from(ErrorKind::Unsupported).into())
}

#[cfg(unix)]
fn pending_bytes(socket: &UdpSocket) -> Result<usize> {
    use std::os::fd::AsRawFd;

    let mut available: libc::c_int = 0;

    // SAFETY: FIONREAD writes a single c_int through the provided pointer,
    // which points to a live local.
    let rc = unsafe { libc::ioctl(socket.as_raw_fd(), libc::FIONREAD, &mut available) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(usize::try_from(available).unwrap_or(0))
}

#[cfg(not(unix))]
fn pending_bytes(_socket: &UdpSocket) -> Result<usize> {
    Err(std::io::Error::from(ErrorKind::Unsupported).into())
}
