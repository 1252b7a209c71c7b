//! Common types for decoder module

/// Size of one digitizer word in bytes
pub const WORD_SIZE: usize = 4;

/// Raw data from digitizer
#[derive(Debug, Clone)]
pub struct RawData {
    pub data: Vec<u8>,
    pub size: usize,
    pub n_events: u32,
}

impl RawData {
    /// Create RawData from a byte vector
    pub fn new(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            size,
            n_events: 0,
        }
    }

    /// Create RawData from 32-bit words (serialized Little-Endian)
    pub fn from_words(words: &[u32], n_events: u32) -> Self {
        let mut data = Vec::with_capacity(words.len() * WORD_SIZE);
        for w in words {
            data.extend_from_slice(&w.to_le_bytes());
        }
        let size = data.len();
        Self {
            data,
            size,
            n_events,
        }
    }

    /// Valid bytes of this buffer
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size.min(self.data.len())]
    }
}

/// Read-only view of a byte buffer as 32-bit Little-Endian words
///
/// Out-of-range reads return `None` instead of panicking, so a corrupted
/// size field can never index past the buffer.
#[derive(Debug, Clone, Copy)]
pub struct WordBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> WordBuffer<'a> {
    /// Wrap a byte slice; `None` if the length is not a whole number of words
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() % WORD_SIZE != 0 {
            return None;
        }
        Some(Self { bytes })
    }

    /// Number of whole words in the buffer
    pub fn len(&self) -> usize {
        self.bytes.len() / WORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Word at the given word index
    #[inline]
    pub fn word(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(WORD_SIZE)?;
        let end = start.checked_add(WORD_SIZE)?;
        let chunk = self.bytes.get(start..end)?;
        Some(read_u32(chunk, 0))
    }
}

/// Read a u32 from data at given byte offset (Little-Endian)
#[inline]
pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
