//! Emulator binary - writes a synthetic ZLE raw capture file
//!
//! Usage:
//!   emulator -o run.bin
//!   emulator -o run.bin --events 10000 --seed 42 --channels 4
//!   emulator -o run.bin -f config.toml

use std::fs::File;
use std::io::{BufWriter, Write};

use adaq_rs::common::EmulatorArgs;
use adaq_rs::config::Config;
use adaq_rs::data_source_emulator::Emulator;
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adaq_rs=info".parse()?))
        .init();

    let args = EmulatorArgs::parse();

    let mut config = Config::load_or_default(&args.common.config_file)?;
    if let Some(seed) = args.seed {
        config.emulator.seed = Some(seed);
    }
    if let Some(channels) = args.channels {
        config.emulator.num_channels = channels;
    }
    config.validate()?;

    let mut emulator = Emulator::new(config.emulator.clone())?;
    let file = File::create(&args.output).with_context(|| format!("creating {}", args.output))?;
    let mut writer = BufWriter::new(file);

    info!(
        output = %args.output,
        events = args.events,
        channels = config.emulator.num_channels,
        window = config.emulator.window_samples,
        seed = ?config.emulator.seed,
        "Emulator starting"
    );

    let mut total_words = 0u64;
    for n in 0..args.events {
        let words = emulator.next_event();
        for word in &words {
            writer.write_all(&word.to_le_bytes())?;
        }
        total_words += words.len() as u64;

        if (n + 1) % 10_000 == 0 {
            info!(events = n + 1, "Progress");
        }
    }
    writer.flush()?;

    let raw_words = args.events
        * u64::from(config.emulator.num_channels)
        * (u64::from(config.emulator.window_samples) / 2 + 1);
    info!(
        events = args.events,
        bytes = total_words * 4,
        compression = %format!("{:.1}%", 100.0 * total_words as f64 / raw_words.max(1) as f64),
        "Emulator finished"
    );
    Ok(())
}
