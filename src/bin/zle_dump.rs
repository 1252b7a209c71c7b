//! zle_dump - inspect a raw ZLE capture file
//!
//! Usage:
//!   zle_dump run.bin                      - Text dump of every event
//!   zle_dump run.bin --event 12           - Text dump of one event
//!   zle_dump run.bin --max 5 --no-data    - Control words of the first 5 events
//!   zle_dump run.bin --json               - One JSON object per decoded event
//!   zle_dump run.bin --summary            - Per-file totals

use std::collections::BTreeMap;

use adaq_rs::common::ZleDumpArgs;
use adaq_rs::config::Config;
use adaq_rs::reader::decoder::dump::{dump_event, dump_events};
use adaq_rs::reader::ZleDecoder;
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adaq_rs=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = ZleDumpArgs::parse();

    let mut config = Config::load_or_default(&args.common.config_file)?;
    args.decoder.apply(&mut config.decoder);
    config.validate()?;

    let data = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file))?;
    info!(file = %args.file, bytes = data.len(), "Loaded raw capture");

    let decoder = ZleDecoder::new(config.decoder);

    if args.summary {
        print_summary(&decoder, &data)?;
    } else if args.json {
        print_json(&decoder, &data, args.max.unwrap_or(usize::MAX))?;
    } else if let Some(index) = args.event {
        print!("{}", dump_event(&decoder, &data, index));
    } else {
        let max = args.max.unwrap_or(usize::MAX);
        print!("{}", dump_events(&decoder, &data, max, !args.no_data));
    }

    Ok(())
}

fn print_json(decoder: &ZleDecoder, data: &[u8], max: usize) -> anyhow::Result<()> {
    for result in decoder.events(data)?.take(max) {
        match result {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}

#[derive(Default)]
struct ChannelTotals {
    events: u64,
    samples: u64,
    skipped_words: u64,
}

fn print_summary(decoder: &ZleDecoder, data: &[u8]) -> anyhow::Result<()> {
    let mut events = 0u64;
    let mut errors = 0u64;
    let mut inconsistent = 0u64;
    let mut channels: BTreeMap<u8, ChannelTotals> = BTreeMap::new();

    let mut iter = decoder.events(data)?;
    for result in iter.by_ref() {
        match result {
            Ok(event) => {
                events += 1;
                if !event.integrity.is_consistent() {
                    inconsistent += 1;
                }
                for ch in &event.channels {
                    let totals = channels.entry(ch.channel).or_default();
                    totals.events += 1;
                    totals.samples += ch.samples.len() as u64;
                    totals.skipped_words += ch.skipped_words();
                }
            }
            Err(e) => {
                errors += 1;
                eprintln!("error: {}", e);
            }
        }
    }

    let total_words = data.len() / 4;
    println!("File:         {} bytes ({} words)", data.len(), total_words);
    println!("Events:       {}", events);
    println!("Errors:       {}", errors);
    println!("Inconsistent: {}", inconsistent);
    if iter.position() < total_words {
        println!(
            "Stopped at word {} of {} (unreadable event header)",
            iter.position(),
            total_words
        );
    }
    println!();
    println!("{:>4} {:>8} {:>12} {:>12} {:>8}", "Ch", "Events", "Samples", "Suppressed", "Kept%");
    for (channel, t) in &channels {
        let suppressed = 2 * t.skipped_words;
        let total = t.samples + suppressed;
        let kept = if total > 0 {
            100.0 * t.samples as f64 / total as f64
        } else {
            0.0
        };
        println!(
            "{:>4} {:>8} {:>12} {:>12} {:>7.1}%",
            channel, t.events, t.samples, suppressed, kept
        );
    }
    Ok(())
}
