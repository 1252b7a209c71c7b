//! Decoder module for CAEN digitizer raw data
//!
//! Converts zero-length-encoded raw buffers into per-channel waveforms.

pub mod common;
pub mod dump;
pub mod error;
pub mod zle;

pub use common::{RawData, WordBuffer};
pub use error::ZleError;
pub use zle::{
    BoundaryPolicy, ChannelSelection, ChannelWaveform, ControlWord, DecodeReport, EventCursor,
    EventHeader, EventIntegrity, ReservedTagPolicy, Segment, ZleConfig, ZleDecoder, ZleEvent,
    ZleEvents, ZleVisitor,
};
