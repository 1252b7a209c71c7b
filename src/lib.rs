//! adaq-rs - ZLE event decoding for CAEN waveform digitizers
//!
//! Decodes zero-length-encoded raw buffers into per-channel waveforms,
//! prints them for debugging, and runs a small acquisition pipeline over a
//! raw capture file or a built-in emulator.

pub mod common;
pub mod config;
pub mod data_source_emulator;
pub mod reader;
