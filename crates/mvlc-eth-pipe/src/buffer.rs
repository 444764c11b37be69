use std::ops::Range;

/// Fill state of a [`ReceiveBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    /// Holds the payload of the last packet; nothing consumed yet.
    FreshlyFilled,
    PartiallyConsumed,
}

/// Per-pipe staging area for stream reads.
///
/// A whole datagram is received into the storage, the readable payload range
/// is remembered, and callers drain it in chunks of any size. Bytes never
/// cross a refill: the buffer must be empty before the next packet lands.
#[derive(Debug)]
pub struct ReceiveBuffer {
    storage: Box<[u8]>,
    start: usize,
    end: usize,
    fresh: bool,
}

impl ReceiveBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
            fresh: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Unconsumed payload bytes.
    pub fn available(&self) -> usize {
        debug_assert!(self.start <= self.end && self.end <= self.storage.len());
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn state(&self) -> BufferState {
        if self.is_empty() {
            BufferState::Empty
        } else if self.fresh {
            BufferState::FreshlyFilled
        } else {
            BufferState::PartiallyConsumed
        }
    }

    /// Copy up to `dest.len()` buffered bytes into `dest` and return the count.
    pub fn consume_into(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.available());
        if n == 0 {
            return 0;
        }
        dest[..n].copy_from_slice(&self.storage[self.start..self.start + n]);
        self.start += n;
        self.fresh = false;
        if self.start == self.end {
            self.reset();
        }
        n
    }

    /// Refill the empty buffer with one packet.
    ///
    /// `receive` gets the whole storage and returns the range of deliverable
    /// payload bytes inside it. An empty range leaves the buffer empty. The
    /// buffer stays empty if `receive` fails.
    pub fn refill<E>(
        &mut self,
        receive: impl FnOnce(&mut [u8]) -> Result<Range<usize>, E>,
    ) -> Result<usize, E> {
        debug_assert!(self.is_empty(), "refill of a non-empty receive buffer");
        self.reset();

        let range = receive(&mut self.storage[..])?;
        debug_assert!(range.start <= range.end && range.end <= self.storage.len());
        let end = range.end.min(self.storage.len());
        let start = range.start.min(end);

        self.start = start;
        self.end = end;
        self.fresh = start < end;
        Ok(end - start)
    }

    /// Drop any buffered bytes.
    pub fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
        self.fresh = false;
    }
}
