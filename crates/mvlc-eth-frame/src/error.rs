/// Errors that can occur when interpreting header fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The packet channel field does not name a known channel.
    #[error("packet channel {0} out of range (max {max})", max = crate::NUM_PACKET_CHANNELS - 1)]
    ChannelOutOfRange(u16),
}

pub type Result<T> = std::result::Result<T, FrameError>;
