//! Per-pipe and per-packet-channel traffic counters.
//!
//! The receive loops write through a shared [`StatsRegistry`]; monitor threads
//! take snapshots or reset. Everything learned from one packet is applied
//! under a single lock acquisition, so a snapshot never shows a packet count
//! without its histogram entries.

use std::collections::BTreeMap;

use mvlc_eth_frame::{PacketChannel, NUM_PACKET_CHANNELS};
use serde::Serialize;

use crate::pipe::{Pipe, PIPE_COUNT};
use crate::ticket::TicketMutex;

/// Packet size in bytes -> count.
pub type PacketSizeMap = BTreeMap<usize, u64>;
/// Frame type byte -> count.
pub type HeaderTypeMap = BTreeMap<u8, u64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipeStats {
    /// Calls to `read_packet` on this pipe.
    pub receive_attempts: u64,
    pub received_packets: u64,
    /// Sum of datagram sizes including the packet headers.
    pub received_bytes: u64,
    /// Packets shorter than the two header words.
    pub short_packets: u64,
    /// Packets whose length is not a multiple of the word size.
    pub packets_with_residue: u64,
    /// Packets whose next header pointer is the "none present" value.
    pub no_header: u64,
    /// Packets whose next header pointer points past the payload.
    pub header_out_of_range: u64,
    pub packet_channel_out_of_range: u64,
    pub lost_packets: u64,
    pub packet_sizes: PacketSizeMap,
    pub header_types: HeaderTypeMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PacketChannelStats {
    pub received_packets: u64,
    pub received_bytes: u64,
    pub lost_packets: u64,
    pub no_header: u64,
    pub header_out_of_range: u64,
    pub packet_sizes: PacketSizeMap,
    pub header_types: HeaderTypeMap,
}

/// Independent copy of every counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub pipes: [PipeStats; PIPE_COUNT],
    pub packet_channels: [PacketChannelStats; NUM_PACKET_CHANNELS],
}

impl StatsSnapshot {
    pub fn pipe(&self, pipe: Pipe) -> &PipeStats {
        &self.pipes[pipe.index()]
    }

    pub fn packet_channel(&self, channel: PacketChannel) -> &PacketChannelStats {
        &self.packet_channels[channel.index()]
    }
}

/// How a packet's next header pointer classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPointer {
    /// The packet was too short to carry headers.
    Unavailable,
    /// Pointer has the "none present" value.
    Absent,
    /// Pointer addresses a word beyond the received payload.
    OutOfRange,
    /// Pointer addresses a frame header with this type byte.
    Valid { frame_type: u8 },
}

/// Everything `read_packet` learned about one received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub pipe: Pipe,
    pub bytes: usize,
    pub short: bool,
    pub residue: bool,
    pub header_pointer: HeaderPointer,
    /// `Err` carries the raw out-of-range channel value.
    pub channel: Option<Result<PacketChannel, u16>>,
    pub lost_packets: u32,
}

impl PacketRecord {
    /// A record with only the size filled in.
    pub fn new(pipe: Pipe, bytes: usize) -> Self {
        Self {
            pipe,
            bytes,
            short: false,
            residue: false,
            header_pointer: HeaderPointer::Unavailable,
            channel: None,
            lost_packets: 0,
        }
    }
}

/// Shared counters guarded by a [`TicketMutex`].
///
/// Readers queue behind the writer in arrival order and are never starved by
/// a receive loop that records packets back to back.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    inner: TicketMutex<StatsSnapshot>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_receive_attempt(&self, pipe: Pipe) {
        self.inner.lock().pipes[pipe.index()].receive_attempts += 1;
    }

    /// Apply every counter affected by one packet as a single update.
    pub fn record_packet(&self, record: &PacketRecord) {
        let mut stats = self.inner.lock();
        let StatsSnapshot {
            pipes,
            packet_channels,
        } = &mut *stats;

        let pipe_stats = &mut pipes[record.pipe.index()];
        pipe_stats.received_packets += 1;
        pipe_stats.received_bytes += record.bytes as u64;
        *pipe_stats.packet_sizes.entry(record.bytes).or_default() += 1;

        if record.short {
            pipe_stats.short_packets += 1;
        }
        if record.residue {
            pipe_stats.packets_with_residue += 1;
        }
        apply_header_pointer(
            record.header_pointer,
            &mut pipe_stats.no_header,
            &mut pipe_stats.header_out_of_range,
            &mut pipe_stats.header_types,
        );

        match record.channel {
            Some(Ok(channel)) => {
                pipe_stats.lost_packets += u64::from(record.lost_packets);

                let channel_stats = &mut packet_channels[channel.index()];
                channel_stats.received_packets += 1;
                channel_stats.received_bytes += record.bytes as u64;
                channel_stats.lost_packets += u64::from(record.lost_packets);
                *channel_stats.packet_sizes.entry(record.bytes).or_default() += 1;
                apply_header_pointer(
                    record.header_pointer,
                    &mut channel_stats.no_header,
                    &mut channel_stats.header_out_of_range,
                    &mut channel_stats.header_types,
                );
            }
            Some(Err(_)) => pipe_stats.packet_channel_out_of_range += 1,
            None => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }

    pub fn pipe_stats(&self) -> [PipeStats; PIPE_COUNT] {
        self.inner.lock().pipes.clone()
    }

    pub fn packet_channel_stats(&self) -> [PacketChannelStats; NUM_PACKET_CHANNELS] {
        self.inner.lock().packet_channels.clone()
    }

    /// Zero every pipe and channel counter.
    pub fn reset(&self) {
        let fresh = StatsSnapshot::default();
        *self.inner.lock() = fresh;
    }
}

fn apply_header_pointer(
    header_pointer: HeaderPointer,
    no_header: &mut u64,
    header_out_of_range: &mut u64,
    header_types: &mut HeaderTypeMap,
) {
    match header_pointer {
        HeaderPointer::Unavailable => {}
        HeaderPointer::Absent => *no_header += 1,
        HeaderPointer::OutOfRange => *header_out_of_range += 1,
        HeaderPointer::Valid { frame_type } => *header_types.entry(frame_type).or_default() += 1,
    }
}
