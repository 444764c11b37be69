use std::ops::Range;

use mvlc_eth_frame::{
    frame_type, read_word, PacketChannel, PayloadHeaderInfo, HEADER_SIZE, HEADER_WORDS,
    WORD_SIZE,
};

/// One received datagram, borrowed from the caller's buffer.
///
/// Every accessor is safe to call on short packets: header fields come back
/// as `None` and payload views are empty.
#[derive(Debug, Clone, Copy)]
pub struct PacketReadResult<'a> {
    packet: &'a [u8],
    lost_packets: u32,
}

impl<'a> PacketReadResult<'a> {
    pub(crate) fn new(packet: &'a [u8], lost_packets: u32) -> Self {
        Self {
            packet,
            lost_packets,
        }
    }

    /// The whole datagram as received, headers included.
    pub fn bytes(&self) -> &'a [u8] {
        self.packet
    }

    pub fn bytes_transferred(&self) -> usize {
        self.packet.len()
    }

    /// Packets lost on this packet's channel since the previous one.
    pub fn lost_packets(&self) -> u32 {
        self.lost_packets
    }

    pub fn has_headers(&self) -> bool {
        self.packet.len() >= HEADER_SIZE
    }

    pub fn headers(&self) -> Option<PayloadHeaderInfo> {
        PayloadHeaderInfo::from_bytes(self.packet)
    }

    /// Raw channel value, which may be out of range.
    pub fn packet_channel(&self) -> Option<u16> {
        self.headers().map(|h| h.packet_channel())
    }

    /// The channel if the raw value names a known one.
    pub fn channel(&self) -> Option<PacketChannel> {
        self.packet_channel()
            .and_then(|raw| PacketChannel::try_from(raw).ok())
    }

    pub fn packet_number(&self) -> Option<u16> {
        self.headers().map(|h| h.packet_number())
    }

    pub fn data_word_count(&self) -> Option<u16> {
        self.headers().map(|h| h.data_word_count())
    }

    pub fn udp_timestamp(&self) -> Option<u32> {
        self.headers().map(|h| h.udp_timestamp())
    }

    pub fn next_header_pointer(&self) -> Option<u16> {
        self.headers().map(|h| h.next_header_pointer())
    }

    /// Whole payload words following the header.
    pub fn available_payload_words(&self) -> usize {
        self.packet.len().saturating_sub(HEADER_SIZE) / WORD_SIZE
    }

    /// Trailing bytes that do not form a whole word.
    pub fn leftover_bytes(&self) -> usize {
        self.packet.len() % WORD_SIZE
    }

    /// False for short packets and for pointers past the payload.
    pub fn is_next_header_pointer_valid(&self) -> bool {
        self.headers()
            .is_some_and(|h| h.is_next_header_pointer_valid(self.available_payload_words()))
    }

    /// Byte range of the whole payload words inside the datagram.
    pub fn payload_range(&self) -> Range<usize> {
        if !self.has_headers() {
            return 0..0;
        }
        HEADER_SIZE..HEADER_SIZE + self.available_payload_words() * WORD_SIZE
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.packet[self.payload_range()]
    }

    /// Payload word at `index`, counted from the first word after the header.
    pub fn payload_word(&self, index: usize) -> Option<u32> {
        if index >= self.available_payload_words() {
            return None;
        }
        read_word(self.packet, HEADER_WORDS + index)
    }

    /// Type byte of the frame header the next header pointer addresses.
    pub fn next_frame_type(&self) -> Option<u8> {
        let headers = self.headers()?;
        if !headers.is_next_header_pointer_present() {
            return None;
        }
        self.payload_word(usize::from(headers.next_header_pointer()))
            .map(frame_type)
    }
}

#[cfg(test)]
mod tests {
    use mvlc_eth_frame::{encode, header1::NO_HEADER_POINTER_PRESENT};

    use super::*;

    fn packet(channel: u16, number: u16, nhp: u16, payload_words: &[u32]) -> Vec<u8> {
        let mut bytes = encode(channel, number, payload_words.len() as u16, 0x1234, nhp)
            .to_bytes()
            .to_vec();
        for word in payload_words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn short_packet_has_no_header_fields() {
        let bytes = [0u8; 7];
        let result = PacketReadResult::new(&bytes, 0);
        assert!(!result.has_headers());
        assert_eq!(result.packet_channel(), None);
        assert_eq!(result.packet_number(), None);
        assert_eq!(result.available_payload_words(), 0);
        assert_eq!(result.leftover_bytes(), 3);
        assert!(result.payload().is_empty());
        assert!(!result.is_next_header_pointer_valid());
        assert_eq!(result.next_frame_type(), None);
    }

    #[test]
    fn header_only_packet() {
        let bytes = packet(2, 17, NO_HEADER_POINTER_PRESENT, &[]);
        let result = PacketReadResult::new(&bytes, 0);
        assert!(result.has_headers());
        assert_eq!(result.channel(), Some(PacketChannel::Data));
        assert_eq!(result.packet_number(), Some(17));
        assert_eq!(result.udp_timestamp(), Some(0x1234));
        assert_eq!(result.available_payload_words(), 0);
        assert_eq!(result.payload_range(), 8..8);
        assert!(result.is_next_header_pointer_valid());
    }

    #[test]
    fn payload_excludes_residue() {
        let mut bytes = packet(0, 1, 0, &[0xf300_0001, 0xdead_beef]);
        bytes.extend_from_slice(&[1, 2]);
        let result = PacketReadResult::new(&bytes, 2);

        assert_eq!(result.bytes_transferred(), 18);
        assert_eq!(result.available_payload_words(), 2);
        assert_eq!(result.leftover_bytes(), 2);
        assert_eq!(result.payload().len(), 8);
        assert_eq!(result.payload_word(1), Some(0xdead_beef));
        assert_eq!(result.payload_word(2), None);
        assert_eq!(result.lost_packets(), 2);
    }

    #[test]
    fn next_frame_type_follows_pointer() {
        let bytes = packet(2, 0, 1, &[0x0000_0001, 0xf500_0010]);
        let result = PacketReadResult::new(&bytes, 0);
        assert!(result.is_next_header_pointer_valid());
        assert_eq!(result.next_frame_type(), Some(0xf5));

        let bytes = packet(2, 0, 5, &[0xf500_0010]);
        let result = PacketReadResult::new(&bytes, 0);
        assert!(!result.is_next_header_pointer_valid());
        assert_eq!(result.next_frame_type(), None);
    }

    #[test]
    fn out_of_range_channel_is_raw_only() {
        let bytes = packet(3, 0, NO_HEADER_POINTER_PRESENT, &[]);
        let result = PacketReadResult::new(&bytes, 0);
        assert_eq!(result.packet_channel(), Some(3));
        assert_eq!(result.channel(), None);
    }
}
