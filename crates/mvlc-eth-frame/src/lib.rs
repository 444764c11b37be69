//! MVLC Ethernet packet header decoding and packet-loss accounting.
//!
//! Every UDP packet sent by the controller starts with two 32 bit header words:
//! - the packet channel, a 12 bit packet number and the data word count
//! - a 20 bit timestamp and a pointer to the first frame header in the payload
//!
//! Decoding is pure and never fails; validity checks are left to the caller.

pub mod channel;
pub mod codec;
pub mod error;
pub mod loss;

pub use channel::{
    channel_name, frame_type_name, frame_types, PacketChannel, NUM_PACKET_CHANNELS,
};
pub use codec::{
    decode, encode, frame_type, header0, header1, read_word, PayloadHeaderInfo, HEADER_SIZE,
    HEADER_WORDS, PACKET_NUMBER_MODULUS, WORD_SIZE,
};
pub use error::{FrameError, Result};
pub use loss::{calc_packet_loss, PacketChannelTracker};
