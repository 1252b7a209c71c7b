//! CLI argument parsing for adaq-rs binaries
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Common arguments shared via composition, not inheritance
//! - Each binary has its own Args struct that embeds CommonArgs

use clap::{ArgGroup, Parser};

use crate::reader::decoder::ZleConfig;

/// Common arguments shared across all binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,
}

/// Decoder overrides applied on top of the `[decoder]` section
#[derive(Parser, Debug, Clone, Default)]
pub struct DecoderArgs {
    /// Number of channels of the digitizer model
    #[arg(long = "channels")]
    pub channels: Option<u8>,

    /// Sanity bound on the declared event size in words
    #[arg(long = "max-event-words")]
    pub max_event_words: Option<u32>,
}

impl DecoderArgs {
    pub fn apply(&self, config: &mut ZleConfig) {
        if let Some(channels) = self.channels {
            config.num_channels = channels;
        }
        if let Some(max) = self.max_event_words {
            config.max_event_words = max;
        }
    }
}

/// Arguments for zle_dump (offline inspection of a raw capture)
#[derive(Parser, Debug, Clone)]
#[command(name = "zle_dump", about = "Print ZLE events from a raw capture file")]
pub struct ZleDumpArgs {
    /// Raw capture file
    pub file: String,

    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub decoder: DecoderArgs,

    /// Dump only the event at this index
    #[arg(short = 'e', long = "event")]
    pub event: Option<usize>,

    /// Dump at most this many events
    #[arg(short = 'n', long = "max")]
    pub max: Option<usize>,

    /// Print decoded events as JSON lines instead of text
    #[arg(long, conflicts_with = "summary")]
    pub json: bool,

    /// Print only per-file totals
    #[arg(long)]
    pub summary: bool,

    /// Hide data words in the text dump
    #[arg(long = "no-data")]
    pub no_data: bool,
}

/// Arguments for the emulator (writes a raw capture file)
#[derive(Parser, Debug, Clone)]
#[command(name = "emulator", about = "Generate a synthetic ZLE raw capture")]
pub struct EmulatorArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output file
    #[arg(short = 'o', long = "output")]
    pub output: String,

    /// Number of events to write
    #[arg(short = 'n', long = "events", default_value = "1000")]
    pub events: u64,

    /// RNG seed (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Channels per event (overrides config)
    #[arg(long = "channels")]
    pub channels: Option<u8>,
}

/// Arguments for the reader pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "reader", about = "Run the acquisition pipeline on a file or the emulator")]
#[command(group(ArgGroup::new("source").required(true).args(["input", "emulate"])))]
pub struct ReaderArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub decoder: DecoderArgs,

    /// Replay a raw capture file
    #[arg(short = 'i', long = "input")]
    pub input: Option<String>,

    /// Read this many buffers from the built-in emulator
    #[arg(long = "emulate")]
    pub emulate: Option<u64>,
}
