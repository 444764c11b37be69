//! Packet loss accounting based on the 12 bit packet number.

use crate::channel::{PacketChannel, NUM_PACKET_CHANNELS};
use crate::codec::PACKET_NUMBER_MODULUS;

/// Number of packets lost between `last_packet_number` and `packet_number`.
///
/// Arithmetic is modulo [`PACKET_NUMBER_MODULUS`], so `0xfff` followed by `0`
/// is not a loss. A repeated packet number reports `PACKET_NUMBER_MODULUS - 1`
/// lost packets: pure modular accounting cannot tell a duplicate from a full
/// wrap.
pub fn calc_packet_loss(last_packet_number: u16, packet_number: u16) -> u32 {
    let last = u32::from(last_packet_number) % PACKET_NUMBER_MODULUS;
    let current = u32::from(packet_number) % PACKET_NUMBER_MODULUS;
    (current + PACKET_NUMBER_MODULUS - last - 1) % PACKET_NUMBER_MODULUS
}

/// Last seen packet number per packet channel.
#[derive(Debug, Clone, Default)]
pub struct PacketChannelTracker {
    last_packet_numbers: [Option<u16>; NUM_PACKET_CHANNELS],
}

impl PacketChannelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `packet_number` on `channel` and return the loss since the
    /// previous packet on that channel. The first packet reports 0.
    pub fn update(&mut self, channel: PacketChannel, packet_number: u16) -> u32 {
        let slot = &mut self.last_packet_numbers[channel.index()];
        let lost = slot.map_or(0, |last| calc_packet_loss(last, packet_number));
        *slot = Some(packet_number);
        lost
    }

    pub fn last_packet_number(&self, channel: PacketChannel) -> Option<u16> {
        self.last_packet_numbers[channel.index()]
    }

    /// Forget all packet numbers.
    pub fn reset(&mut self) {
        self.last_packet_numbers = [None; NUM_PACKET_CHANNELS];
    }
}
