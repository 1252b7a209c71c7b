//! ZLE Decoder for CAEN waveform digitizers (zero-length encoding)
//!
//! Decodes RAW buffers read from x720/x724-class digitizers running with
//! zero suppression enabled. Samples below threshold are elided by the
//! hardware and replaced with a "skip" marker.
//!
//! # Data Format
//!
//! 32-bit Little-Endian words, events concatenated back to back:
//!
//! ```text
//! Event Header (4 words)
//!   w0  [27:0] event size in words (incl. header), [24] readout flag
//!   w1  [31:27] board id, [26] board fail, [7:0] channel mask
//!   w2  [23:0] event counter
//!   w3  trigger time tag
//! Channel block (one per selected channel)
//!   size word: nominal samples in the acquisition window
//!   control/data words:
//!     [31:30] = 11  good: [19:0] data words that follow
//!     [31:30] = 01  skip: [19:0] suppressed words (sample pairs)
//!     [31:30] = 00  data: [15:0] sample N, [31:16] sample N+1
//!     [31:30] = 10  reserved (see ReservedTagPolicy)
//! ```
//!
//! A channel block ends once its emitted samples plus twice its skipped
//! words cover the nominal window, or when the event runs out of words.
//!
//! Parsing is a single state machine ([`EventCursor`]) that reports what it
//! sees to a [`ZleVisitor`]. The waveform collector and the diagnostic
//! printer are both visitors.

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::common::{RawData, WordBuffer};
use super::dump;
use super::error::ZleError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub mod constants {
    pub const HEADER_SIZE_WORDS: usize = 4;

    /// Events above this size are treated as corrupted
    ///
    /// Some firmware revisions emit garbage sizes with large acquisition
    /// windows.
    pub const DEFAULT_MAX_EVENT_WORDS: u32 = 100_000;

    pub const DEFAULT_NUM_CHANNELS: u8 = 8;

    pub mod header {
        // Word 0
        pub const TYPE_SHIFT: u32 = 28;
        pub const TYPE_DATA: u32 = 0xA;
        pub const EVENT_SIZE_MASK: u32 = 0x0FFF_FFFF;
        pub const READOUT_FLAG_SHIFT: u32 = 24;

        // Word 1
        pub const BOARD_ID_SHIFT: u32 = 27;
        pub const BOARD_ID_MASK: u32 = 0x1F;
        pub const BOARD_FAIL_SHIFT: u32 = 26;
        pub const CHANNEL_MASK: u32 = 0xFF;

        // Word 2
        pub const EVENT_COUNTER_MASK: u32 = 0xFF_FFFF;
    }

    pub mod control {
        pub const TAG_SHIFT: u32 = 30;
        pub const TAG_MASK: u32 = 0b11;
        pub const TAG_GOOD: u32 = 0b11;
        pub const TAG_SKIP: u32 = 0b01;
        pub const TAG_RESERVED: u32 = 0b10;
        pub const COUNT_MASK: u32 = 0x000F_FFFF;
    }

    pub mod data {
        pub const SAMPLE_MASK: u32 = 0xFFFF;
        pub const SECOND_SAMPLE_SHIFT: u32 = 16;
        pub const SAMPLES_PER_WORD: u64 = 2;
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which channels own a block in each event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelection {
    /// Channels `0..num_channels`, all present in every event
    #[default]
    All,
    /// Channels set in the header channel mask (word 1, bits 7:0)
    Header,
}

/// Handling of control words tagged `0b10`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservedTagPolicy {
    /// Treat the word as a data word
    #[default]
    Data,
    /// Fail the event with `ReservedControlWord`
    Reject,
}

/// Handling of events whose consumed words differ from the declared size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    Ignore,
    /// Log a warning and keep the event
    #[default]
    Warn,
    /// Fail the event (the cursor still moves on to the next one)
    Reject,
}

/// ZLE decoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZleConfig {
    /// Number of logical channels of the digitizer model
    pub num_channels: u8,
    /// Sanity bound on the declared event size in words
    pub max_event_words: u32,
    pub channel_selection: ChannelSelection,
    pub reserved_tag: ReservedTagPolicy,
    pub boundary_check: BoundaryPolicy,
    /// Enable debug dump output
    pub dump_enabled: bool,
}

impl Default for ZleConfig {
    fn default() -> Self {
        Self {
            num_channels: constants::DEFAULT_NUM_CHANNELS,
            max_event_words: constants::DEFAULT_MAX_EVENT_WORDS,
            channel_selection: ChannelSelection::All,
            reserved_tag: ReservedTagPolicy::Data,
            boundary_check: BoundaryPolicy::Warn,
            dump_enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Word-level types
// ---------------------------------------------------------------------------

/// A word of the ZLE stream classified by its tag bits [31:30]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlWord {
    Good { words: u32 },
    Skip { words: u32 },
    Data(u32),
    Reserved(u32),
}

impl ControlWord {
    pub fn classify(word: u32) -> Self {
        use constants::control::*;

        let count = word & COUNT_MASK;
        match (word >> TAG_SHIFT) & TAG_MASK {
            TAG_GOOD => ControlWord::Good { words: count },
            TAG_SKIP => ControlWord::Skip { words: count },
            TAG_RESERVED => ControlWord::Reserved(word),
            _ => ControlWord::Data(word),
        }
    }

    /// Encode a "good" control word announcing `words` data words
    pub fn good(words: u32) -> u32 {
        use constants::control::*;
        (TAG_GOOD << TAG_SHIFT) | (words & COUNT_MASK)
    }

    /// Encode a "skip" control word for `words` suppressed sample pairs
    pub fn skip(words: u32) -> u32 {
        use constants::control::*;
        (TAG_SKIP << TAG_SHIFT) | (words & COUNT_MASK)
    }
}

/// Split a data word into (sample N, sample N+1)
#[inline]
pub fn unpack_samples(word: u32) -> [u16; 2] {
    use constants::data::*;
    [
        (word & SAMPLE_MASK) as u16,
        ((word >> SECOND_SAMPLE_SHIFT) & SAMPLE_MASK) as u16,
    ]
}

/// Pack two samples into a data word
#[inline]
pub fn pack_samples(first: u16, second: u16) -> u32 {
    (first as u32) | ((second as u32) << constants::data::SECOND_SAMPLE_SHIFT)
}

/// Event Header (4 words)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventHeader {
    pub size_words: u32,
    /// Bit 24 of word 0: board-aggregate vs per-channel readout
    pub readout_flag: bool,
    pub board_id: u8,
    pub board_fail: bool,
    pub channel_mask: u8,
    pub event_counter: u32,
    pub trigger_time_tag: u32,
}

impl EventHeader {
    pub fn from_words(words: [u32; 4]) -> Self {
        use constants::header::*;

        let [w0, w1, w2, w3] = words;
        Self {
            size_words: w0 & EVENT_SIZE_MASK,
            readout_flag: ((w0 >> READOUT_FLAG_SHIFT) & 1) != 0,
            board_id: ((w1 >> BOARD_ID_SHIFT) & BOARD_ID_MASK) as u8,
            board_fail: ((w1 >> BOARD_FAIL_SHIFT) & 1) != 0,
            channel_mask: (w1 & CHANNEL_MASK) as u8,
            event_counter: w2 & EVENT_COUNTER_MASK,
            trigger_time_tag: w3,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded output
// ---------------------------------------------------------------------------

/// Good/skip run marker with its position in the logical window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Good { position: u64, words: u32 },
    Skip { position: u64, words: u32 },
}

/// Samples of one channel in one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelWaveform {
    pub channel: u8,
    /// Samples in the acquisition window before suppression
    pub nominal_samples: u32,
    /// Samples present in the stream, in order
    pub samples: Vec<u16>,
    pub segments: Vec<Segment>,
    /// False if the event ended before the window was accounted for
    pub complete: bool,
}

impl ChannelWaveform {
    /// Total suppressed words (sample pairs)
    pub fn skipped_words(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Skip { words, .. } => u64::from(*words),
                Segment::Good { .. } => 0,
            })
            .sum()
    }

    /// Emitted samples plus suppressed samples
    pub fn accounted_samples(&self) -> u64 {
        self.samples.len() as u64 + constants::data::SAMPLES_PER_WORD * self.skipped_words()
    }

    /// Rebuild the full window, filling suppressed regions with `fill`
    pub fn reconstruct(&self, fill: u16) -> Vec<u16> {
        let nominal = self.nominal_samples as u64;
        let mut out = Vec::with_capacity(self.nominal_samples as usize);
        let mut emitted = self.samples.iter().copied();

        for segment in &self.segments {
            if let Segment::Skip { position, words } = *segment {
                while (out.len() as u64) < position {
                    match emitted.next() {
                        Some(s) => out.push(s),
                        None => break,
                    }
                }
                let room = nominal.saturating_sub(out.len() as u64);
                let n = (constants::data::SAMPLES_PER_WORD * u64::from(words)).min(room);
                out.extend(std::iter::repeat(fill).take(n as usize));
            }
        }
        out.extend(emitted);
        out.resize(self.nominal_samples as usize, fill);
        out
    }
}

/// Word accounting for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventIntegrity {
    pub declared_words: u32,
    pub consumed_words: u32,
    /// Channels whose block was missing or cut short
    pub incomplete_channels: Vec<u8>,
}

impl EventIntegrity {
    pub fn is_consistent(&self) -> bool {
        self.declared_words == self.consumed_words && self.incomplete_channels.is_empty()
    }
}

/// One decoded ZLE event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZleEvent {
    /// Position of the event in its buffer (0-based)
    pub index: usize,
    /// Word offset of the event header
    pub offset: usize,
    pub header: EventHeader,
    pub channels: Vec<ChannelWaveform>,
    pub integrity: EventIntegrity,
}

impl ZleEvent {
    pub fn channel(&self, channel: u8) -> Option<&ChannelWaveform> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    pub fn samples(&self, channel: u8) -> Option<&[u16]> {
        self.channel(channel).map(|c| c.samples.as_slice())
    }

    /// Channel index → samples
    pub fn waveforms(&self) -> BTreeMap<u8, &[u16]> {
        self.channels
            .iter()
            .map(|c| (c.channel, c.samples.as_slice()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scanning state machine
// ---------------------------------------------------------------------------

/// Receives the parse events of one ZLE event, in stream order
///
/// Offsets are word indices into the buffer. `position` is the logical
/// sample position in the channel window at which a control word occurs.
pub trait ZleVisitor {
    fn event_header(&mut self, _index: usize, _offset: usize, _header: &EventHeader) {}
    fn channel_start(&mut self, _channel: u8, _offset: usize, _nominal_samples: u32) {}
    fn control(&mut self, _offset: usize, _word: u32, _control: ControlWord, _position: u64) {}
    fn data(&mut self, _offset: usize, _word: u32, _samples: [u16; 2]) {}
    fn channel_end(&mut self, _channel: u8, _complete: bool) {}
    fn event_end(&mut self, _integrity: &EventIntegrity) {}
}

/// Forward-only read position over a buffer of concatenated events
///
/// Events can only be reached by walking every earlier event's size, so
/// the cursor is strictly sequential. After a fatal error it stays
/// finished.
pub struct EventCursor<'a> {
    words: WordBuffer<'a>,
    config: &'a ZleConfig,
    position: usize,
    index: usize,
    fused: bool,
}

impl<'a> EventCursor<'a> {
    pub fn new(data: &'a [u8], config: &'a ZleConfig) -> Result<Self, ZleError> {
        let words = WordBuffer::new(data).ok_or(ZleError::Misaligned { len: data.len() })?;
        Ok(Self {
            words,
            config,
            position: 0,
            index: 0,
            fused: false,
        })
    }

    /// Word offset where the next event starts
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of event headers consumed so far
    pub fn events_visited(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.fused || self.position >= self.words.len()
    }

    /// Parse the next event, reporting it to `visitor`
    pub fn visit_next<V: ZleVisitor>(
        &mut self,
        visitor: &mut V,
    ) -> Option<Result<EventIntegrity, ZleError>> {
        let (start, index, header) = match self.advance()? {
            Ok(next) => next,
            Err(e) => return Some(Err(e)),
        };

        visitor.event_header(index, start, &header);
        let result = scan_body(&self.words, start, &header, self.config, visitor);
        if let Err(e) = &result {
            if e.is_fatal() {
                self.fused = true;
            }
        }
        Some(result)
    }

    /// Step over the next event reading only its header
    pub fn skip_next(&mut self) -> Option<Result<EventHeader, ZleError>> {
        Some(self.advance()?.map(|(_, _, header)| header))
    }

    fn advance(&mut self) -> Option<Result<(usize, usize, EventHeader), ZleError>> {
        if self.is_finished() {
            return None;
        }

        let start = self.position;
        match read_header(&self.words, start, self.config) {
            Ok(header) => {
                self.position = start + header.size_words as usize;
                let index = self.index;
                self.index += 1;
                Some(Ok((start, index, header)))
            }
            Err(e) => {
                // Size is untrusted: do not guess where the next event begins
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

fn read_header(
    words: &WordBuffer<'_>,
    start: usize,
    config: &ZleConfig,
) -> Result<EventHeader, ZleError> {
    let available = words.len();
    let w0 = words.word(start).ok_or(ZleError::Truncated {
        offset: start,
        available,
    })?;

    let size = w0 & constants::header::EVENT_SIZE_MASK;
    if size > config.max_event_words {
        return Err(ZleError::CorruptEventSize {
            offset: start,
            size,
            limit: config.max_event_words,
        });
    }
    if (size as usize) < constants::HEADER_SIZE_WORDS {
        return Err(ZleError::UndersizedEvent {
            offset: start,
            size,
            min: constants::HEADER_SIZE_WORDS as u32,
        });
    }

    let mut raw = [w0, 0, 0, 0];
    for (i, slot) in raw.iter_mut().enumerate().skip(1) {
        *slot = words.word(start + i).ok_or(ZleError::Truncated {
            offset: start + i,
            available,
        })?;
    }
    Ok(EventHeader::from_words(raw))
}

fn selected_channels(header: &EventHeader, config: &ZleConfig) -> impl Iterator<Item = u8> {
    let selection = config.channel_selection;
    let mask = u32::from(header.channel_mask);
    (0..config.num_channels).filter(move |&ch| match selection {
        ChannelSelection::All => true,
        ChannelSelection::Header => ch < 8 && (mask >> ch) & 1 != 0,
    })
}

fn scan_body<V: ZleVisitor>(
    words: &WordBuffer<'_>,
    start: usize,
    header: &EventHeader,
    config: &ZleConfig,
    visitor: &mut V,
) -> Result<EventIntegrity, ZleError> {
    // A short buffer ends the scan like the declared size does; the
    // shortfall shows up in the integrity record.
    let scan_end = (start + header.size_words as usize).min(words.len());
    let mut pos = start + constants::HEADER_SIZE_WORDS;
    let mut incomplete = Vec::new();

    for channel in selected_channels(header, config) {
        let Some(nominal) = words.word(pos).filter(|_| pos < scan_end) else {
            incomplete.push(channel);
            continue;
        };
        visitor.channel_start(channel, pos, nominal);
        pos += 1;

        let mut accounted: u64 = 0;
        while accounted < u64::from(nominal) {
            let Some(word) = words.word(pos).filter(|_| pos < scan_end) else {
                break;
            };

            match ControlWord::classify(word) {
                control @ ControlWord::Good { .. } => {
                    visitor.control(pos, word, control, accounted);
                }
                control @ ControlWord::Skip { words: n } => {
                    visitor.control(pos, word, control, accounted);
                    accounted += constants::data::SAMPLES_PER_WORD * u64::from(n);
                }
                ControlWord::Data(_) => {
                    visitor.data(pos, word, unpack_samples(word));
                    accounted += constants::data::SAMPLES_PER_WORD;
                }
                ControlWord::Reserved(_) => match config.reserved_tag {
                    ReservedTagPolicy::Data => {
                        visitor.data(pos, word, unpack_samples(word));
                        accounted += constants::data::SAMPLES_PER_WORD;
                    }
                    ReservedTagPolicy::Reject => {
                        return Err(ZleError::ReservedControlWord { offset: pos, word });
                    }
                },
            }
            pos += 1;
        }

        let complete = accounted >= u64::from(nominal);
        if !complete {
            incomplete.push(channel);
        }
        visitor.channel_end(channel, complete);
    }

    let integrity = EventIntegrity {
        declared_words: header.size_words,
        consumed_words: (pos - start) as u32,
        incomplete_channels: incomplete,
    };
    visitor.event_end(&integrity);
    check_integrity(start, &integrity, config.boundary_check)?;
    Ok(integrity)
}

fn check_integrity(
    offset: usize,
    integrity: &EventIntegrity,
    policy: BoundaryPolicy,
) -> Result<(), ZleError> {
    if integrity.is_consistent() {
        return Ok(());
    }

    match policy {
        BoundaryPolicy::Ignore => Ok(()),
        BoundaryPolicy::Warn => {
            warn!(
                offset,
                consumed = integrity.consumed_words,
                declared = integrity.declared_words,
                incomplete = ?integrity.incomplete_channels,
                "ZLE event word count does not match its header"
            );
            Ok(())
        }
        BoundaryPolicy::Reject => {
            if integrity.consumed_words != integrity.declared_words {
                Err(ZleError::BoundaryMismatch {
                    offset,
                    consumed: integrity.consumed_words,
                    declared: integrity.declared_words,
                })
            } else {
                Err(ZleError::IncompleteChannels {
                    offset,
                    channels: integrity.incomplete_channels.clone(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Waveform collection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WaveformCollector {
    index: usize,
    offset: usize,
    header: EventHeader,
    channels: Vec<ChannelWaveform>,
}

impl WaveformCollector {
    fn finish(self, integrity: EventIntegrity) -> ZleEvent {
        ZleEvent {
            index: self.index,
            offset: self.offset,
            header: self.header,
            channels: self.channels,
            integrity,
        }
    }
}

impl ZleVisitor for WaveformCollector {
    fn event_header(&mut self, index: usize, offset: usize, header: &EventHeader) {
        self.index = index;
        self.offset = offset;
        self.header = *header;
    }

    fn channel_start(&mut self, channel: u8, _offset: usize, nominal_samples: u32) {
        self.channels.push(ChannelWaveform {
            channel,
            nominal_samples,
            samples: Vec::new(),
            segments: Vec::new(),
            complete: false,
        });
    }

    fn control(&mut self, _offset: usize, _word: u32, control: ControlWord, position: u64) {
        let segment = match control {
            ControlWord::Good { words } => Segment::Good { position, words },
            ControlWord::Skip { words } => Segment::Skip { position, words },
            ControlWord::Data(_) | ControlWord::Reserved(_) => return,
        };
        if let Some(ch) = self.channels.last_mut() {
            ch.segments.push(segment);
        }
    }

    fn data(&mut self, _offset: usize, _word: u32, samples: [u16; 2]) {
        if let Some(ch) = self.channels.last_mut() {
            ch.samples.extend_from_slice(&samples);
        }
    }

    fn channel_end(&mut self, _channel: u8, complete: bool) {
        if let Some(ch) = self.channels.last_mut() {
            ch.complete = complete;
        }
    }
}

/// Iterator over the decoded events of one buffer
pub struct ZleEvents<'a> {
    cursor: EventCursor<'a>,
}

impl ZleEvents<'_> {
    /// Word offset where the next event starts
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn events_read(&self) -> usize {
        self.cursor.events_visited()
    }
}

impl Iterator for ZleEvents<'_> {
    type Item = Result<ZleEvent, ZleError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut collector = WaveformCollector::default();
        let result = self.cursor.visit_next(&mut collector)?;
        Some(result.map(|integrity| collector.finish(integrity)))
    }
}

impl FusedIterator for ZleEvents<'_> {}

// ---------------------------------------------------------------------------
// ZLE Decoder
// ---------------------------------------------------------------------------

/// Events and per-event errors from one raw buffer
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub events: Vec<ZleEvent>,
    pub errors: Vec<ZleError>,
}

impl DecodeReport {
    pub fn inconsistent_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !e.integrity.is_consistent())
            .count()
    }
}

/// ZLE decoder
pub struct ZleDecoder {
    config: ZleConfig,
}

impl ZleDecoder {
    /// Create a new ZLE decoder with given configuration
    pub fn new(config: ZleConfig) -> Self {
        Self { config }
    }

    /// Create a decoder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ZleConfig::default())
    }

    pub fn config(&self) -> &ZleConfig {
        &self.config
    }

    /// Enable or disable dump output
    pub fn set_dump_enabled(&mut self, enabled: bool) {
        self.config.dump_enabled = enabled;
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Cursor positioned at the first event of `data`
    pub fn cursor<'a>(&'a self, data: &'a [u8]) -> Result<EventCursor<'a>, ZleError> {
        EventCursor::new(data, &self.config)
    }

    /// Decode events of `data` in order
    pub fn events<'a>(&'a self, data: &'a [u8]) -> Result<ZleEvents<'a>, ZleError> {
        Ok(ZleEvents {
            cursor: self.cursor(data)?,
        })
    }

    /// Decode the event at `index`, walking the headers of the events before it
    pub fn decode_event(&self, data: &[u8], index: usize) -> Result<ZleEvent, ZleError> {
        let mut cursor = self.cursor(data)?;
        for skipped in 0..index {
            match cursor.skip_next() {
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ZleError::EventNotFound {
                        index,
                        available: skipped,
                    })
                }
            }
        }

        let mut collector = WaveformCollector::default();
        match cursor.visit_next(&mut collector) {
            Some(result) => result.map(|integrity| collector.finish(integrity)),
            None => Err(ZleError::EventNotFound {
                index,
                available: index,
            }),
        }
    }

    /// Headers of all events in `data`, without scanning sample words
    pub fn event_headers(&self, data: &[u8]) -> Result<Vec<EventHeader>, ZleError> {
        let mut cursor = self.cursor(data)?;
        let mut headers = Vec::new();
        while let Some(header) = cursor.skip_next() {
            headers.push(header?);
        }
        Ok(headers)
    }

    pub fn count_events(&self, data: &[u8]) -> Result<usize, ZleError> {
        Ok(self.event_headers(data)?.len())
    }

    /// Decode every event of a raw buffer
    ///
    /// Recoverable per-event errors are logged and collected; decoding stops
    /// at the first fatal one.
    pub fn decode(&self, raw: &RawData) -> DecodeReport {
        let mut report = DecodeReport::default();

        let events = match self.events(raw.bytes()) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, size = raw.size, "Cannot decode raw buffer");
                report.errors.push(e);
                return report;
            }
        };

        for result in events {
            match result {
                Ok(event) => report.events.push(event),
                Err(e) => {
                    warn!(error = %e, fatal = e.is_fatal(), "ZLE event decode error");
                    report.errors.push(e);
                }
            }
        }

        if raw.n_events != 0 && report.events.len() + report.errors.len() != raw.n_events as usize
        {
            warn!(
                reported = raw.n_events,
                decoded = report.events.len(),
                errors = report.errors.len(),
                "Event count differs from source report"
            );
        }

        if self.config.dump_enabled {
            println!("{}", dump::dump_all(self, raw.bytes()));
        }

        debug!(
            events = report.events.len(),
            errors = report.errors.len(),
            bytes = raw.size,
            "Decoded ZLE buffer"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
