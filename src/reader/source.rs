//! Raw buffer sources
//!
//! A [`RawSource`] plays the role of the digitizer's `ReadData` call: each
//! read returns a buffer of whole events, never a partial one.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use super::decoder::common::WORD_SIZE;
use super::decoder::zle::constants;
use super::decoder::RawData;

/// Raw source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Acquisition finished, no more data will come
    #[error("Source stopped")]
    Stop,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt event header at byte {offset}: size {size} words")]
    CorruptEvent { offset: u64, size: u32 },

    #[error("Truncated event at byte {offset}: {missing} bytes missing")]
    Truncated { offset: u64, missing: usize },
}

/// Producer of raw digitizer buffers
pub trait RawSource: Send {
    /// Read the next buffer of at most `buffer_size` bytes
    ///
    /// `Ok(None)` means no data arrived within `timeout_ms`.
    /// `Err(SourceError::Stop)` ends the acquisition.
    fn read_data(
        &mut self,
        timeout_ms: i32,
        buffer_size: usize,
    ) -> Result<Option<RawData>, SourceError>;
}

impl<S: RawSource + ?Sized> RawSource for Box<S> {
    fn read_data(
        &mut self,
        timeout_ms: i32,
        buffer_size: usize,
    ) -> Result<Option<RawData>, SourceError> {
        (**self).read_data(timeout_ms, buffer_size)
    }
}

/// Replays a raw capture file (events as delivered by `ReadData`)
///
/// Events are read one at a time from their size word so that a buffer
/// always ends on an event boundary.
pub struct FileSource<R> {
    reader: R,
    max_event_words: u32,
    events_per_read: usize,
    offset: u64,
    finished: bool,
}

impl FileSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_event_words: u32,
        events_per_read: usize,
    ) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened raw capture file");
        Ok(Self::new(BufReader::new(file), max_event_words, events_per_read))
    }
}

impl<R: Read> FileSource<R> {
    pub fn new(reader: R, max_event_words: u32, events_per_read: usize) -> Self {
        Self {
            reader,
            max_event_words,
            events_per_read: events_per_read.max(1),
            offset: 0,
            finished: false,
        }
    }

    /// Byte offset of the next unread event
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append one event to `data`; false at a clean end of file
    fn read_event(&mut self, data: &mut Vec<u8>) -> Result<bool, SourceError> {
        let mut first = [0u8; WORD_SIZE];
        let got = read_full(&mut self.reader, &mut first)?;
        if got == 0 {
            return Ok(false);
        }
        if got < WORD_SIZE {
            return Err(SourceError::Truncated {
                offset: self.offset,
                missing: WORD_SIZE - got,
            });
        }

        let size = u32::from_le_bytes(first) & constants::header::EVENT_SIZE_MASK;
        if size > self.max_event_words || (size as usize) < constants::HEADER_SIZE_WORDS {
            return Err(SourceError::CorruptEvent {
                offset: self.offset,
                size,
            });
        }

        let rest = (size as usize - 1) * WORD_SIZE;
        let start = data.len();
        data.extend_from_slice(&first);
        data.resize(start + WORD_SIZE + rest, 0);
        let got = read_full(&mut self.reader, &mut data[start + WORD_SIZE..])?;
        if got < rest {
            data.truncate(start);
            return Err(SourceError::Truncated {
                offset: self.offset,
                missing: rest - got,
            });
        }

        self.offset += (WORD_SIZE + rest) as u64;
        Ok(true)
    }
}

impl<R: Read + Send> RawSource for FileSource<R> {
    fn read_data(
        &mut self,
        _timeout_ms: i32,
        buffer_size: usize,
    ) -> Result<Option<RawData>, SourceError> {
        if self.finished {
            return Err(SourceError::Stop);
        }

        let mut data = Vec::new();
        let mut n_events = 0u32;
        while (n_events as usize) < self.events_per_read && data.len() < buffer_size {
            match self.read_event(&mut data) {
                Ok(true) => n_events += 1,
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    if n_events == 0 {
                        return Err(e);
                    }
                    // Hand out the good events first; the error is lost with the stream end
                    debug!(error = %e, "Raw file ended with a damaged event");
                    break;
                }
            }
        }

        if n_events == 0 {
            return Err(SourceError::Stop);
        }
        let size = data.len();
        Ok(Some(RawData {
            data,
            size,
            n_events,
        }))
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
