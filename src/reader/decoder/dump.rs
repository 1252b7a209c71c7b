//! Text dump of ZLE events for interactive debugging
//!
//! [`EventPrinter`] is a [`ZleVisitor`], so it sees exactly the words the
//! waveform decoder sees. Malformed input never aborts a dump: the printer
//! writes what was parsed, then the error.

use std::fmt::Write;

use super::error::ZleError;
use super::zle::{ControlWord, EventHeader, EventIntegrity, ZleDecoder, ZleVisitor};

/// Renders parse events as text lines
#[derive(Debug, Default)]
pub struct EventPrinter {
    out: String,
    /// Print every data word (otherwise only control words)
    show_data: bool,
}

impl EventPrinter {
    pub fn new(show_data: bool) -> Self {
        Self {
            out: String::new(),
            show_data,
        }
    }

    pub fn error(&mut self, error: &ZleError) {
        let _ = writeln!(self.out, "  !! {}", error);
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl ZleVisitor for EventPrinter {
    fn event_header(&mut self, index: usize, offset: usize, header: &EventHeader) {
        let _ = writeln!(self.out, "--- ZLE Event {} (word {}) ---", index, offset);
        let _ = writeln!(self.out, "  Size:          {} words", header.size_words);
        let _ = writeln!(self.out, "  Readout flag:  {}", header.readout_flag as u8);
        let _ = writeln!(
            self.out,
            "  Board:         id={} fail={}",
            header.board_id, header.board_fail
        );
        let _ = writeln!(self.out, "  Channel mask:  0x{:02x}", header.channel_mask);
        let _ = writeln!(self.out, "  Event counter: {}", header.event_counter);
        let _ = writeln!(self.out, "  Trigger time:  0x{:08x}", header.trigger_time_tag);
    }

    fn channel_start(&mut self, channel: u8, offset: usize, nominal_samples: u32) {
        let _ = writeln!(
            self.out,
            "  [{:6}] Ch {:2} window {} samples",
            offset, channel, nominal_samples
        );
    }

    fn control(&mut self, offset: usize, word: u32, control: ControlWord, position: u64) {
        let (tag, count) = match control {
            ControlWord::Good { words } => ("GOOD", words),
            ControlWord::Skip { words } => ("SKIP", words),
            ControlWord::Data(_) | ControlWord::Reserved(_) => return,
        };
        let _ = writeln!(
            self.out,
            "  [{:6}] 0x{:08x} {} {:6} words @ sample {}",
            offset, word, tag, count, position
        );
    }

    fn data(&mut self, offset: usize, word: u32, samples: [u16; 2]) {
        if self.show_data {
            let _ = writeln!(
                self.out,
                "  [{:6}] 0x{:08x} DATA {:6} {:6}",
                offset, word, samples[0], samples[1]
            );
        }
    }

    fn channel_end(&mut self, channel: u8, complete: bool) {
        if !complete {
            let _ = writeln!(self.out, "  Ch {:2} window not fully accounted for", channel);
        }
    }

    fn event_end(&mut self, integrity: &EventIntegrity) {
        let status = if integrity.is_consistent() {
            "OK"
        } else {
            "MISMATCH"
        };
        let _ = writeln!(
            self.out,
            "  Words: {} consumed / {} declared  {}",
            integrity.consumed_words, integrity.declared_words, status
        );
    }
}

/// Dump the event at `index`
pub fn dump_event(decoder: &ZleDecoder, data: &[u8], index: usize) -> String {
    let mut printer = EventPrinter::new(true);
    let mut cursor = match decoder.cursor(data) {
        Ok(cursor) => cursor,
        Err(e) => {
            printer.error(&e);
            return printer.into_string();
        }
    };

    for _ in 0..index {
        match cursor.skip_next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                printer.error(&e);
                return printer.into_string();
            }
            None => break,
        }
    }

    match cursor.visit_next(&mut printer) {
        Some(Ok(_)) => {}
        Some(Err(e)) => printer.error(&e),
        None => printer.error(&ZleError::EventNotFound {
            index,
            available: cursor.events_visited(),
        }),
    }
    printer.into_string()
}

/// Dump every event of `data`
pub fn dump_all(decoder: &ZleDecoder, data: &[u8]) -> String {
    dump_events(decoder, data, usize::MAX, true)
}

/// Dump up to `max_events` events
pub fn dump_events(decoder: &ZleDecoder, data: &[u8], max_events: usize, show_data: bool) -> String {
    let mut printer = EventPrinter::new(show_data);
    let mut cursor = match decoder.cursor(data) {
        Ok(cursor) => cursor,
        Err(e) => {
            printer.error(&e);
            return printer.into_string();
        }
    };

    for _ in 0..max_events {
        match cursor.visit_next(&mut printer) {
            Some(Ok(_)) => {}
            Some(Err(e)) => printer.error(&e),
            None => break,
        }
    }
    printer.into_string()
}
