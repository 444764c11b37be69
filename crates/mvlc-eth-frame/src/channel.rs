//! Packet channels and frame type bytes.
//!
//! Packet channels are logical sub-streams multiplexed inside packets. The
//! 2 bit channel field can encode four values, only the first three are used.

use std::fmt;

use crate::error::FrameError;

/// Number of packet channels known to the protocol.
pub const NUM_PACKET_CHANNELS: usize = 3;

/// Logical channel a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketChannel {
    /// Command responses.
    Command = 0,
    /// Stack error notifications and stack responses.
    Stack = 1,
    /// Readout data.
    Data = 2,
}

impl PacketChannel {
    pub const ALL: [PacketChannel; NUM_PACKET_CHANNELS] =
        [PacketChannel::Command, PacketChannel::Stack, PacketChannel::Data];

    /// Index into per-channel arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketChannel::Command => "COMMAND",
            PacketChannel::Stack => "STACK",
            PacketChannel::Data => "DATA",
        }
    }
}

impl TryFrom<u16> for PacketChannel {
    type Error = FrameError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketChannel::Command),
            1 => Ok(PacketChannel::Stack),
            2 => Ok(PacketChannel::Data),
            other => Err(FrameError::ChannelOutOfRange(other)),
        }
    }
}

impl fmt::Display for PacketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns a human-readable name for a raw channel value.
pub fn channel_name(id: u16) -> &'static str {
    PacketChannel::try_from(id)
        .map(PacketChannel::name)
        .unwrap_or("OUT_OF_RANGE")
}

/// Frame type bytes found in the top byte of MVLC frame headers.
pub mod frame_types {
    pub const SUPER_FRAME: u8 = 0xF1;
    pub const SUPER_CONTINUATION: u8 = 0xF2;
    pub const STACK_FRAME: u8 = 0xF3;
    pub const BLOCK_READ: u8 = 0xF5;
    pub const STACK_ERROR: u8 = 0xF7;
    pub const STACK_CONTINUATION: u8 = 0xF9;
    pub const SYSTEM_EVENT: u8 = 0xFA;
}

/// Returns a human-readable name for a frame type byte.
pub fn frame_type_name(frame_type: u8) -> &'static str {
    match frame_type {
        frame_types::SUPER_FRAME => "SuperFrame",
        frame_types::SUPER_CONTINUATION => "SuperContinuation",
        frame_types::STACK_FRAME => "StackFrame",
        frame_types::BLOCK_READ => "BlockRead",
        frame_types::STACK_ERROR => "StackError",
        frame_types::STACK_CONTINUATION => "StackContinuation",
        frame_types::SYSTEM_EVENT => "SystemEvent",
        _ => "Unknown",
    }
}
