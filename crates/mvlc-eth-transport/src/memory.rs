//! In-process datagram sockets.
//!
//! [`MemorySocket::pair`] returns two connected endpoints that exchange
//! datagrams through shared queues. [`MemoryConnector`] hands out one end of a
//! fresh pair per `open` and keeps the other end for the caller to play the
//! remote side. Useful for driving the pipe layer without a network.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::traits::{DatagramSocket, SocketConnector, SocketOptions};

#[derive(Debug, Default)]
struct MailboxState {
    datagrams: VecDeque<Bytes>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Mailbox {
    state: Mutex<MailboxState>,
    ready: Condvar,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, MailboxState> {
        // A poisoned queue still holds consistent datagrams.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One end of an in-memory datagram link.
#[derive(Debug)]
pub struct MemorySocket {
    inbox: Arc<Mailbox>,
    outbox: Arc<Mailbox>,
    local: SocketAddr,
    peer: SocketAddr,
}

impl MemorySocket {
    /// Create two connected endpoints with the given nominal addresses.
    pub fn pair_with_addrs(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let a_inbox = Arc::new(Mailbox::default());
        let b_inbox = Arc::new(Mailbox::default());
        (
            Self {
                inbox: Arc::clone(&a_inbox),
                outbox: Arc::clone(&b_inbox),
                local: a,
                peer: b,
            },
            Self {
                inbox: b_inbox,
                outbox: a_inbox,
                local: b,
                peer: a,
            },
        )
    }

    /// Create two connected endpoints on nominal loopback addresses.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_addrs(
            (Ipv4Addr::LOCALHOST, 1).into(),
            (Ipv4Addr::LOCALHOST, 2).into(),
        )
    }

    /// Number of datagrams waiting to be received on this end.
    pub fn queued_datagrams(&self) -> usize {
        self.inbox.lock().datagrams.len()
    }
}

impl DatagramSocket for MemorySocket {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut peer = self.outbox.lock();
        // Like UDP, datagrams sent to a closed peer are silently dropped.
        if !peer.closed {
            peer.datagrams.push_back(Bytes::copy_from_slice(buf));
            self.outbox.ready.notify_all();
        }
        Ok(buf.len())
    }

    fn receive(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inbox.lock();

        loop {
            if state.closed {
                return Err(TransportError::Closed);
            }
            if let Some(datagram) = state.datagrams.pop_front() {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                return Ok(n);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            state = self
                .inbox
                .ready
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    fn set_write_timeout(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        let mut state = self.inbox.lock();
        state.closed = true;
        state.datagrams.clear();
        self.inbox.ready.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.inbox.lock().closed
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    fn pending_bytes(&self) -> Result<usize> {
        Ok(self.inbox.lock().datagrams.iter().map(Bytes::len).sum())
    }
}

/// Connector that opens [`MemorySocket`] pairs.
///
/// The remote end of each opened socket is retained, keyed by the remote port
/// passed to `open`, until taken with [`MemoryConnector::take_remote`].
#[derive(Debug)]
pub struct MemoryConnector {
    remotes: Mutex<HashMap<u16, MemorySocket>>,
    next_local_port: AtomicU16,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            remotes: Mutex::new(HashMap::new()),
            next_local_port: AtomicU16::new(40_000),
        }
    }

    /// Take the remote end of the socket most recently opened to `port`.
    pub fn take_remote(&self, port: u16) -> Option<MemorySocket> {
        self.remotes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&port)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketConnector for MemoryConnector {
    fn open(
        &self,
        remote: SocketAddr,
        _options: &SocketOptions,
    ) -> Result<Arc<dyn DatagramSocket>> {
        let local_port = self.next_local_port.fetch_add(1, Ordering::Relaxed);
        let local = SocketAddr::from((Ipv4Addr::LOCALHOST, local_port));
        let (near, far) = MemorySocket::pair_with_addrs(local, remote);

        self.remotes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(remote.port(), far);

        Ok(Arc::new(near))
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}
