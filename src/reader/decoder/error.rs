//! ZLE decode errors

use thiserror::Error;

/// Errors raised while decoding a ZLE event stream
///
/// Offsets are word indices into the buffer being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZleError {
    #[error("Buffer length {len} bytes is not a multiple of the 4-byte word size")]
    Misaligned { len: usize },

    #[error("Event at word {offset} declares {size} words, above the sanity limit of {limit}")]
    CorruptEventSize { offset: usize, size: u32, limit: u32 },

    #[error("Event at word {offset} declares {size} words, shorter than the {min}-word header")]
    UndersizedEvent { offset: usize, size: u32, min: u32 },

    #[error("Event header truncated: word {offset} needed but buffer holds {available} words")]
    Truncated { offset: usize, available: usize },

    #[error("Reserved control tag 0b10 in word 0x{word:08x} at word {offset}")]
    ReservedControlWord { offset: usize, word: u32 },

    #[error("Event at word {offset} consumed {consumed} words but declares {declared}")]
    BoundaryMismatch {
        offset: usize,
        consumed: u32,
        declared: u32,
    },

    #[error("Event at word {offset}: channels {channels:?} not fully accounted for")]
    IncompleteChannels { offset: usize, channels: Vec<u8> },

    #[error("Event index {index} out of range: buffer holds {available} events")]
    EventNotFound { index: usize, available: usize },
}

impl ZleError {
    /// True when the event size can no longer be trusted to find the next event.
    ///
    /// A cursor that hits a fatal error stops; later events in the same
    /// buffer are not decoded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ZleError::Misaligned { .. }
                | ZleError::CorruptEventSize { .. }
                | ZleError::UndersizedEvent { .. }
                | ZleError::Truncated { .. }
        )
    }
}
