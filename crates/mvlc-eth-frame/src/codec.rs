//! Decoding of the two header words that start every received packet.
//!
//! Wire layout (both words little-endian, word 0 at payload offset 0):
//! ```text
//! header0:  31 30 | 29 28   | 27 ........ 16 | 15 14 13 | 12 ............ 0
//!           --    | channel | packet number  |   --     | data word count
//!
//! header1:  31 ........................... 12 | 11 ..................... 0
//!           udp timestamp                     | next header pointer
//! ```
//! A next header pointer of [`header1::NO_HEADER_POINTER_PRESENT`] means the
//! packet carries no frame header. Otherwise it is the word offset of the
//! first frame header, counted from the first word after the packet header.

/// Bit layout of the first header word.
pub mod header0 {
    /// 2 bit packet channel.
    pub const PACKET_CHANNEL_MASK: u32 = 0b11;
    pub const PACKET_CHANNEL_SHIFT: u32 = 28;

    /// 12 bit packet number.
    pub const PACKET_NUMBER_MASK: u32 = 0xfff;
    pub const PACKET_NUMBER_SHIFT: u32 = 16;

    /// 13 bit number of data words.
    pub const NUM_DATA_WORDS_MASK: u32 = 0x1fff;
    pub const NUM_DATA_WORDS_SHIFT: u32 = 0;
}

/// Bit layout of the second header word.
pub mod header1 {
    /// 20 bit udp timestamp.
    pub const TIMESTAMP_MASK: u32 = 0xfffff;
    pub const TIMESTAMP_SHIFT: u32 = 12;

    /// 12 bit next header pointer.
    pub const HEADER_POINTER_MASK: u32 = 0xfff;
    pub const HEADER_POINTER_SHIFT: u32 = 0;

    pub const NO_HEADER_POINTER_PRESENT: u16 = 0xfff;
}

/// Size of one wire word in bytes.
pub const WORD_SIZE: usize = 4;

/// Number of header words in front of the payload.
pub const HEADER_WORDS: usize = 2;

/// Header size in bytes.
pub const HEADER_SIZE: usize = HEADER_WORDS * WORD_SIZE;

/// Packet numbers wrap modulo this value.
pub const PACKET_NUMBER_MODULUS: u32 = header0::PACKET_NUMBER_MASK + 1;

/// Decoded view of the two packet header words.
///
/// Decoding never fails. Garbage words produce garbage fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadHeaderInfo {
    pub header0: u32,
    pub header1: u32,
}

impl PayloadHeaderInfo {
    /// Read both header words from the front of `packet`.
    ///
    /// Returns `None` if `packet` is shorter than [`HEADER_SIZE`].
    pub fn from_bytes(packet: &[u8]) -> Option<Self> {
        Some(decode(read_word(packet, 0)?, read_word(packet, 1)?))
    }

    pub fn packet_channel(&self) -> u16 {
        ((self.header0 >> header0::PACKET_CHANNEL_SHIFT) & header0::PACKET_CHANNEL_MASK) as u16
    }

    pub fn packet_number(&self) -> u16 {
        ((self.header0 >> header0::PACKET_NUMBER_SHIFT) & header0::PACKET_NUMBER_MASK) as u16
    }

    pub fn data_word_count(&self) -> u16 {
        ((self.header0 >> header0::NUM_DATA_WORDS_SHIFT) & header0::NUM_DATA_WORDS_MASK) as u16
    }

    pub fn udp_timestamp(&self) -> u32 {
        (self.header1 >> header1::TIMESTAMP_SHIFT) & header1::TIMESTAMP_MASK
    }

    pub fn next_header_pointer(&self) -> u16 {
        ((self.header1 >> header1::HEADER_POINTER_SHIFT) & header1::HEADER_POINTER_MASK) as u16
    }

    pub fn is_next_header_pointer_present(&self) -> bool {
        self.next_header_pointer() != header1::NO_HEADER_POINTER_PRESENT
    }

    /// True if the pointer is absent or addresses one of the
    /// `available_payload_words` words following the header.
    pub fn is_next_header_pointer_valid(&self, available_payload_words: usize) -> bool {
        !self.is_next_header_pointer_present()
            || usize::from(self.next_header_pointer()) < available_payload_words
    }
}

/// Decode two raw header words.
pub fn decode(header0: u32, header1: u32) -> PayloadHeaderInfo {
    PayloadHeaderInfo { header0, header1 }
}

/// Build header words from field values. Values wider than their field are masked.
pub fn encode(
    packet_channel: u16,
    packet_number: u16,
    data_word_count: u16,
    udp_timestamp: u32,
    next_header_pointer: u16,
) -> PayloadHeaderInfo {
    let header0 = ((u32::from(packet_channel) & header0::PACKET_CHANNEL_MASK)
        << header0::PACKET_CHANNEL_SHIFT)
        | ((u32::from(packet_number) & header0::PACKET_NUMBER_MASK)
            << header0::PACKET_NUMBER_SHIFT)
        | ((u32::from(data_word_count) & header0::NUM_DATA_WORDS_MASK)
            << header0::NUM_DATA_WORDS_SHIFT);
    let header1 = ((udp_timestamp & header1::TIMESTAMP_MASK) << header1::TIMESTAMP_SHIFT)
        | ((u32::from(next_header_pointer) & header1::HEADER_POINTER_MASK)
            << header1::HEADER_POINTER_SHIFT);
    decode(header0, header1)
}

impl PayloadHeaderInfo {
    /// Wire representation of the two header words.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..WORD_SIZE].copy_from_slice(&self.header0.to_le_bytes());
        out[WORD_SIZE..].copy_from_slice(&self.header1.to_le_bytes());
        out
    }
}

/// Read the little-endian word at `index` (in words) from `bytes`.
pub fn read_word(bytes: &[u8], index: usize) -> Option<u32> {
    let start = index.checked_mul(WORD_SIZE)?;
    let word = bytes.get(start..start.checked_add(WORD_SIZE)?)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

/// Frame type byte of an MVLC frame header word.
pub fn frame_type(frame_header: u32) -> u8 {
    (frame_header >> 24) as u8
}
