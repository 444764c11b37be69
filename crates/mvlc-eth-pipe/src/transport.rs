//! One physical pipe: a socket plus the receive state bound to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mvlc_eth_frame::{PacketChannel, PacketChannelTracker, PayloadHeaderInfo, WORD_SIZE};
use mvlc_eth_transport::DatagramSocket;
use tracing::{debug, trace};

use crate::buffer::ReceiveBuffer;
use crate::error::{Result, StreamReadError};
use crate::packet::PacketReadResult;
use crate::pipe::Pipe;
use crate::stats::{HeaderPointer, PacketRecord, StatsRegistry};

/// Read and write timeouts of one pipe.
///
/// Shared between the facade and the pipe so timeouts can change while a
/// receive loop holds the pipe.
#[derive(Debug)]
pub struct PipeTimeouts {
    read_ms: AtomicU64,
    write_ms: AtomicU64,
}

impl PipeTimeouts {
    pub fn new(read: Duration, write: Duration) -> Self {
        Self {
            read_ms: AtomicU64::new(as_millis(read)),
            write_ms: AtomicU64::new(as_millis(write)),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_ms.load(Ordering::Relaxed))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_ms.load(Ordering::Relaxed))
    }

    /// Applies to the next receive; an in-flight receive keeps its timeout.
    pub fn set_read_timeout(&self, timeout: Duration) {
        self.read_ms.store(as_millis(timeout), Ordering::Relaxed);
    }

    pub fn set_write_timeout(&self, timeout: Duration) {
        self.write_ms.store(as_millis(timeout), Ordering::Relaxed);
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Receives single packets and accounts for them.
#[derive(Debug)]
struct PacketReceiver {
    pipe: Pipe,
    socket: Arc<dyn DatagramSocket>,
    timeouts: Arc<PipeTimeouts>,
    tracker: PacketChannelTracker,
    stats: Arc<StatsRegistry>,
}

impl PacketReceiver {
    fn read_packet<'b>(&mut self, dest: &'b mut [u8]) -> Result<PacketReadResult<'b>> {
        self.stats.record_receive_attempt(self.pipe);

        let n = self.socket.receive(dest, self.timeouts.read_timeout())?;
        let packet: &'b [u8] = &dest[..n];

        let mut record = PacketRecord::new(self.pipe, n);
        record.residue = n % WORD_SIZE != 0;

        match PayloadHeaderInfo::from_bytes(packet) {
            None => record.short = true,
            Some(headers) => {
                let view = PacketReadResult::new(packet, 0);
                record.header_pointer = if !headers.is_next_header_pointer_present() {
                    HeaderPointer::Absent
                } else if !view.is_next_header_pointer_valid() {
                    HeaderPointer::OutOfRange
                } else {
                    view.next_frame_type()
                        .map_or(HeaderPointer::OutOfRange, |frame_type| {
                            HeaderPointer::Valid { frame_type }
                        })
                };

                let raw_channel = headers.packet_channel();
                match PacketChannel::try_from(raw_channel) {
                    Ok(channel) => {
                        let lost = self.tracker.update(channel, headers.packet_number());
                        if lost > 0 {
                            debug!(
                                pipe = %self.pipe,
                                channel = %channel,
                                packet_number = headers.packet_number(),
                                lost,
                                "packet loss detected"
                            );
                        }
                        record.channel = Some(Ok(channel));
                        record.lost_packets = lost;
                    }
                    Err(_) => {
                        trace!(pipe = %self.pipe, raw_channel, "packet channel out of range");
                        record.channel = Some(Err(raw_channel));
                    }
                }
            }
        }

        self.stats.record_packet(&record);
        Ok(PacketReadResult::new(packet, record.lost_packets))
    }
}

/// Socket, loss tracker and receive buffer of one pipe.
///
/// Created on connect and dropped on disconnect. Only one thread reads from a
/// pipe at a time; the facade serializes access.
#[derive(Debug)]
pub struct PipeTransport {
    receiver: PacketReceiver,
    buffer: ReceiveBuffer,
}

impl PipeTransport {
    pub fn new(
        pipe: Pipe,
        socket: Arc<dyn DatagramSocket>,
        timeouts: Arc<PipeTimeouts>,
        stats: Arc<StatsRegistry>,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            receiver: PacketReceiver {
                pipe,
                socket,
                timeouts,
                tracker: PacketChannelTracker::new(),
                stats,
            },
            buffer: ReceiveBuffer::new(buffer_capacity),
        }
    }

    pub fn pipe(&self) -> Pipe {
        self.receiver.pipe
    }

    pub fn socket(&self) -> &Arc<dyn DatagramSocket> {
        &self.receiver.socket
    }

    pub fn timeouts(&self) -> &Arc<PipeTimeouts> {
        &self.receiver.timeouts
    }

    /// Bytes held back from a previous stream read.
    pub fn buffered(&self) -> usize {
        self.buffer.available()
    }

    /// Receive one datagram into `dest` and account for it.
    ///
    /// Malformed packets are counted, never rejected. On timeout only the
    /// receive attempt is counted.
    pub fn read_packet<'b>(&mut self, dest: &'b mut [u8]) -> Result<PacketReadResult<'b>> {
        self.receiver.read_packet(dest)
    }

    /// Fill `dest` with packet payload, stripping the packet headers.
    ///
    /// Buffered bytes from an earlier packet are delivered first. Packets
    /// without payload are skipped. On failure the error carries the number
    /// of bytes already copied into `dest`.
    pub fn read(&mut self, dest: &mut [u8]) -> std::result::Result<usize, StreamReadError> {
        let mut transferred = 0;

        while transferred < dest.len() {
            if self.buffer.is_empty() {
                let receiver = &mut self.receiver;
                self.buffer
                    .refill(|storage| {
                        receiver
                            .read_packet(storage)
                            .map(|packet| packet.payload_range())
                    })
                    .map_err(|err| StreamReadError::new(transferred, err))?;
            }
            transferred += self.buffer.consume_into(&mut dest[transferred..]);
        }

        Ok(transferred)
    }

    pub fn last_packet_number(&self, channel: PacketChannel) -> Option<u16> {
        self.receiver.tracker.last_packet_number(channel)
    }

    /// Forget loss history and buffered bytes.
    pub fn reset(&mut self) {
        self.receiver.tracker.reset();
        self.buffer.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use mvlc_eth_frame::{encode, frame_types, header1::NO_HEADER_POINTER_PRESENT};
    use mvlc_eth_transport::MemorySocket;

    use super::*;
    use crate::error::EthError;
    use crate::stats::PipeStats;

    const TIMEOUT: Duration = Duration::from_millis(100);

    struct Harness {
        pipe: PipeTransport,
        remote: MemorySocket,
        stats: Arc<StatsRegistry>,
    }

    impl Harness {
        fn new(pipe: Pipe) -> Self {
            let (near, remote) = MemorySocket::pair();
            let stats = Arc::new(StatsRegistry::new());
            let pipe = PipeTransport::new(
                pipe,
                Arc::new(near),
                Arc::new(PipeTimeouts::new(TIMEOUT, TIMEOUT)),
                Arc::clone(&stats),
                9000,
            );
            Self {
                pipe,
                remote,
                stats,
            }
        }

        fn send(&self, bytes: &[u8]) {
            self.remote.send(bytes).expect("send should succeed");
        }

        fn pipe_stats(&self) -> PipeStats {
            self.stats.snapshot().pipes[self.pipe.pipe().index()].clone()
        }
    }

    fn packet(channel: u16, number: u16, nhp: u16, payload: &[u8]) -> Vec<u8> {
        let words = (payload.len() / WORD_SIZE) as u16;
        let mut bytes = encode(channel, number, words, 0, nhp).to_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    fn data_packet(number: u16, payload: &[u8]) -> Vec<u8> {
        packet(2, number, NO_HEADER_POINTER_PRESENT, payload)
    }

    #[test]
    fn header_only_packet_is_not_short() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, &[]));

        let mut dest = [0u8; 64];
        let result = h.pipe.read_packet(&mut dest).expect("read should succeed");
        assert_eq!(result.bytes_transferred(), 8);
        assert_eq!(result.available_payload_words(), 0);

        let stats = h.pipe_stats();
        assert_eq!(stats.short_packets, 0);
        assert_eq!(stats.no_header, 1);
        assert_eq!(stats.received_packets, 1);
    }

    #[test]
    fn seven_byte_packet_is_short() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&[0xffu8; 7]);

        let mut dest = [0u8; 64];
        let result = h.pipe.read_packet(&mut dest).expect("read should succeed");
        assert_eq!(result.bytes_transferred(), 7);
        assert!(!result.has_headers());
        assert_eq!(result.packet_channel(), None);

        let stats = h.pipe_stats();
        assert_eq!(stats.short_packets, 1);
        assert_eq!(stats.packets_with_residue, 1);
        assert_eq!(stats.no_header, 0);
        assert_eq!(stats.received_bytes, 7);
        assert_eq!(stats.packet_sizes.get(&7), Some(&1));
        for channel in PacketChannel::ALL {
            assert_eq!(h.stats.snapshot().packet_channel(channel).received_packets, 0);
        }
    }

    #[test]
    fn residue_is_counted_with_full_byte_count() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, &[1, 2, 3, 4, 5, 6]));

        let mut dest = [0u8; 64];
        let result = h.pipe.read_packet(&mut dest).expect("read should succeed");
        assert_eq!(result.bytes_transferred(), 14);
        assert_eq!(result.leftover_bytes(), 2);
        assert_eq!(h.pipe_stats().packets_with_residue, 1);
    }

    #[test]
    fn out_of_range_header_pointer_is_counted() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&packet(2, 0, 2, &[0u8; 8]));

        let mut dest = [0u8; 64];
        let result = h.pipe.read_packet(&mut dest).expect("read should succeed");
        assert!(!result.is_next_header_pointer_valid());
        assert_eq!(result.payload().len(), 8);

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.pipe(Pipe::Data).header_out_of_range, 1);
        assert_eq!(
            snapshot.packet_channel(PacketChannel::Data).header_out_of_range,
            1
        );
        assert!(snapshot.pipe(Pipe::Data).header_types.is_empty());
    }

    #[test]
    fn header_type_histogram_uses_addressed_frame() {
        let mut h = Harness::new(Pipe::Command);
        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&0xf300_0002u32.to_le_bytes());
        h.send(&packet(0, 0, 1, &payload));

        let mut dest = [0u8; 64];
        h.pipe.read_packet(&mut dest).expect("read should succeed");

        let snapshot = h.stats.snapshot();
        assert_eq!(
            snapshot.pipe(Pipe::Command).header_types.get(&frame_types::STACK_FRAME),
            Some(&1)
        );
        assert_eq!(
            snapshot
                .packet_channel(PacketChannel::Command)
                .header_types
                .get(&frame_types::STACK_FRAME),
            Some(&1)
        );
    }

    #[test]
    fn channel_three_counts_only_at_pipe_level() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&packet(3, 10, NO_HEADER_POINTER_PRESENT, &[]));
        h.send(&packet(3, 20, NO_HEADER_POINTER_PRESENT, &[]));

        let mut dest = [0u8; 64];
        for _ in 0..2 {
            let result = h.pipe.read_packet(&mut dest).expect("read should succeed");
            assert_eq!(result.lost_packets(), 0);
        }

        let snapshot = h.stats.snapshot();
        let pipe = snapshot.pipe(Pipe::Data);
        assert_eq!(pipe.packet_channel_out_of_range, 2);
        assert_eq!(pipe.lost_packets, 0);
        assert_eq!(pipe.received_packets, 2);
        for channel in PacketChannel::ALL {
            assert_eq!(snapshot.packet_channel(channel).received_packets, 0);
        }
    }

    #[test]
    fn loss_is_tracked_per_channel() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(4094, &[]));
        h.send(&data_packet(4095, &[]));
        h.send(&data_packet(3, &[]));
        h.send(&packet(1, 100, NO_HEADER_POINTER_PRESENT, &[]));

        let mut dest = [0u8; 64];
        let losses: Vec<u32> = (0..4)
            .map(|_| {
                h.pipe
                    .read_packet(&mut dest)
                    .expect("read should succeed")
                    .lost_packets()
            })
            .collect();
        assert_eq!(losses, vec![0, 0, 3, 0]);

        let snapshot = h.stats.snapshot();
        assert_eq!(snapshot.pipe(Pipe::Data).lost_packets, 3);
        assert_eq!(snapshot.packet_channel(PacketChannel::Data).lost_packets, 3);
        assert_eq!(snapshot.packet_channel(PacketChannel::Stack).lost_packets, 0);
        assert_eq!(h.pipe.last_packet_number(PacketChannel::Data), Some(3));
    }

    #[test]
    fn timeout_only_counts_the_attempt() {
        let mut h = Harness::new(Pipe::Command);
        let mut dest = [0u8; 64];

        let err = h
            .pipe
            .read_packet(&mut dest)
            .expect_err("read should time out");
        assert!(err.is_timeout());

        let expected = PipeStats {
            receive_attempts: 1,
            ..PipeStats::default()
        };
        assert_eq!(h.pipe_stats(), expected);
    }

    #[test]
    fn stream_read_spans_packets() {
        let mut h = Harness::new(Pipe::Data);
        let first: Vec<u8> = (0..40).collect();
        let second: Vec<u8> = (40..100).collect();
        h.send(&data_packet(0, &first));
        h.send(&data_packet(1, &second));

        let mut dest = [0u8; 100];
        let n = h.pipe.read(&mut dest).expect("stream read should succeed");
        assert_eq!(n, 100);
        assert_eq!(dest.to_vec(), (0..100).collect::<Vec<u8>>());
        assert_eq!(h.pipe.buffered(), 0);
    }

    #[test]
    fn stream_read_keeps_leftover_for_next_call() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, b"abcdefgh"));

        let mut dest = [0u8; 3];
        assert_eq!(h.pipe.read(&mut dest).expect("first read"), 3);
        assert_eq!(&dest, b"abc");
        assert_eq!(h.pipe.buffered(), 5);

        let mut rest = [0u8; 5];
        assert_eq!(h.pipe.read(&mut rest).expect("second read"), 5);
        assert_eq!(&rest, b"defgh");
        assert_eq!(h.stats.snapshot().pipe(Pipe::Data).receive_attempts, 1);
    }

    #[test]
    fn stream_read_skips_empty_packets() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, &[]));
        h.send(&[0u8; 5]);
        h.send(&data_packet(1, b"wxyz"));

        let mut dest = [0u8; 4];
        assert_eq!(h.pipe.read(&mut dest).expect("stream read"), 4);
        assert_eq!(&dest, b"wxyz");
        assert_eq!(h.stats.snapshot().pipe(Pipe::Data).receive_attempts, 3);
    }

    #[test]
    fn stream_read_drops_residue_bytes() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, b"abcdXY"));
        h.send(&data_packet(1, b"efgh"));

        let mut dest = [0u8; 8];
        assert_eq!(h.pipe.read(&mut dest).expect("stream read"), 8);
        assert_eq!(&dest, b"abcdefgh");
    }

    #[test]
    fn stream_read_reports_partial_progress_on_timeout() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(0, &[7u8; 40]));

        let mut dest = [0u8; 100];
        let err = h.pipe.read(&mut dest).expect_err("read should time out");
        assert_eq!(err.bytes_transferred, 40);
        assert!(err.error.is_timeout());
        assert!(dest[..40].iter().all(|&b| b == 7));
    }

    #[test]
    fn empty_stream_read_does_not_receive() {
        let mut h = Harness::new(Pipe::Data);
        assert_eq!(h.pipe.read(&mut []).expect("empty read"), 0);
        assert_eq!(h.pipe_stats().receive_attempts, 0);
    }

    #[test]
    fn close_interrupts_blocked_read() {
        let (near, _remote) = MemorySocket::pair();
        let near: Arc<dyn DatagramSocket> = Arc::new(near);
        let mut pipe = PipeTransport::new(
            Pipe::Data,
            Arc::clone(&near),
            Arc::new(PipeTimeouts::new(Duration::from_secs(10), TIMEOUT)),
            Arc::new(StatsRegistry::new()),
            9000,
        );

        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            near.close();
        });

        let started = Instant::now();
        let mut dest = [0u8; 64];
        let err = pipe.read_packet(&mut dest).expect_err("read should fail");
        assert!(matches!(err, EthError::Closed));
        assert!(started.elapsed() < Duration::from_secs(5));
        closer.join().expect("closer should finish");
    }

    #[test]
    fn reset_clears_tracker_and_buffer() {
        let mut h = Harness::new(Pipe::Data);
        h.send(&data_packet(10, b"abcdefgh"));
        let mut dest = [0u8; 2];
        h.pipe.read(&mut dest).expect("stream read");
        assert_eq!(h.pipe.buffered(), 6);

        h.pipe.reset();
        assert_eq!(h.pipe.buffered(), 0);
        assert_eq!(h.pipe.last_packet_number(PacketChannel::Data), None);
    }

    #[test]
    fn timeouts_are_independent() {
        let timeouts = PipeTimeouts::new(Duration::from_millis(500), Duration::from_millis(500));
        timeouts.set_read_timeout(Duration::from_millis(20));
        assert_eq!(timeouts.read_timeout(), Duration::from_millis(20));
        assert_eq!(timeouts.write_timeout(), Duration::from_millis(500));
    }
}
