//! Reader binary - runs the acquisition pipeline
//!
//! Usage:
//!   reader --input run.bin
//!   reader --emulate 100 --channels 4
//!   reader -f config.toml --input run.bin

use adaq_rs::common::{setup_shutdown, ReaderArgs};
use adaq_rs::config::Config;
use adaq_rs::data_source_emulator::Emulator;
use adaq_rs::reader::{DecodedBatch, FileSource, RawSource, Reader};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("adaq_rs=info".parse()?))
        .init();

    let args = ReaderArgs::parse();

    let mut config = Config::load_or_default(&args.common.config_file)?;
    args.decoder.apply(&mut config.decoder);
    if let Some(buffers) = args.emulate {
        config.emulator.max_buffers = Some(buffers);
        if let Some(channels) = args.decoder.channels {
            config.emulator.num_channels = channels;
        }
    }
    config.validate()?;

    let source: Box<dyn RawSource> = match &args.input {
        Some(path) => Box::new(FileSource::open(
            path,
            config.decoder.max_event_words,
            config.reader.events_per_read,
        )?),
        None => Box::new(Emulator::new(config.emulator.clone())?),
    };

    let reader = Reader::new(config.reader.clone(), config.decoder.clone())?;
    let metrics = reader.metrics().clone();

    let (batch_tx, batch_rx) = mpsc::channel::<DecodedBatch>(config.reader.output_capacity);
    let consumer = tokio::spawn(consume(batch_rx));

    let (_shutdown_tx, shutdown_rx) = setup_shutdown();
    reader.run(source, batch_tx, shutdown_rx).await?;
    let events = consumer.await?;

    let m = metrics.snapshot();
    println!("Buffers:      {}", m.buffers_read);
    println!("Bytes:        {}", m.bytes_read);
    println!("Events:       {}", events);
    println!("Errors:       {}", m.decode_errors);
    println!("Inconsistent: {}", m.inconsistent_events);
    Ok(())
}

/// Drain decoded batches; returns the number of events seen
async fn consume(mut rx: mpsc::Receiver<DecodedBatch>) -> u64 {
    let mut events = 0u64;
    while let Some(batch) = rx.recv().await {
        events += batch.events.len() as u64;
        for error in &batch.errors {
            warn!(seq = batch.sequence_number, error = %error, "Event dropped");
        }
        debug!(
            seq = batch.sequence_number,
            events = batch.events.len(),
            "Batch received"
        );
    }
    info!(events, "Consumer finished");
    events
}
