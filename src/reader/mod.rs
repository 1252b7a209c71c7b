//! Reader module for digitizer data acquisition
//!
//! This module provides:
//! - Raw buffer sources (source)
//! - ZLE decoder and diagnostic printer (decoder)
//! - Reader pipeline with two-task architecture

pub mod decoder;
pub mod source;

// Re-exports
pub use decoder::{DecodeReport, RawData, ZleConfig, ZleDecoder, ZleError, ZleEvent};
pub use source::{FileSource, RawSource, SourceError};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Decode error: {0}")]
    Decode(#[from] ZleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Task error: {0}")]
    Task(String),
}

/// Reader configuration (`[reader]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Timeout passed to each `read_data` call
    pub read_timeout_ms: i32,
    /// Upper bound on a single raw buffer in bytes
    pub buffer_size: usize,
    /// Events per buffer when replaying a file
    pub events_per_read: usize,
    /// Capacity of the decoded batch channel
    pub output_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 100,
            buffer_size: 1024 * 1024, // 1MB
            events_per_read: 64,
            output_capacity: 16,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.buffer_size == 0 {
            return Err(ReaderError::Config("buffer_size must be non-zero".into()));
        }
        if self.events_per_read == 0 {
            return Err(ReaderError::Config(
                "events_per_read must be non-zero".into(),
            ));
        }
        if self.output_capacity == 0 {
            return Err(ReaderError::Config(
                "output_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Metrics for monitoring
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    /// Raw buffers received from the source
    pub buffers_read: AtomicU64,
    /// Total bytes read from the source
    pub bytes_read: AtomicU64,
    /// Read errors other than end of data
    pub read_errors: AtomicU64,
    /// Total events decoded
    pub events_decoded: AtomicU64,
    /// Per-event decode errors
    pub decode_errors: AtomicU64,
    /// Decoded events whose word accounting did not match
    pub inconsistent_events: AtomicU64,
    /// Total batches published
    pub batches_published: AtomicU64,
    /// Current decode queue length (approximate)
    pub queue_length: AtomicU64,
}

/// Point-in-time copy of [`ReaderMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub buffers_read: u64,
    pub bytes_read: u64,
    pub read_errors: u64,
    pub events_decoded: u64,
    pub decode_errors: u64,
    pub inconsistent_events: u64,
    pub batches_published: u64,
    pub queue_length: u64,
}

impl ReaderMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buffers_read: self.buffers_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            events_decoded: self.events_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            inconsistent_events: self.inconsistent_events.load(Ordering::Relaxed),
            batches_published: self.batches_published.load(Ordering::Relaxed),
            queue_length: self.queue_length.load(Ordering::Relaxed),
        }
    }
}

/// Events decoded from one raw buffer
#[derive(Debug, Clone)]
pub struct DecodedBatch {
    pub sequence_number: u64,
    /// Event count reported by the source for this buffer
    pub n_events_reported: u32,
    pub events: Vec<ZleEvent>,
    pub errors: Vec<ZleError>,
}

/// Reader pipeline
///
/// Uses two-task architecture:
/// - ReadLoop: Blocking reads from a [`RawSource`] (spawn_blocking)
/// - DecodeLoop: Async ZLE decoding, forwards [`DecodedBatch`]es
pub struct Reader {
    config: ReaderConfig,
    decoder: ZleConfig,
    metrics: Arc<ReaderMetrics>,
}

impl Reader {
    /// Create a new Reader with the given configuration
    pub fn new(config: ReaderConfig, decoder: ZleConfig) -> Result<Self, ReaderError> {
        config.validate()?;
        info!(
            buffer_size = config.buffer_size,
            channels = decoder.num_channels,
            "Reader configured"
        );
        Ok(Self {
            config,
            decoder,
            metrics: Arc::new(ReaderMetrics::default()),
        })
    }

    pub fn metrics(&self) -> &Arc<ReaderMetrics> {
        &self.metrics
    }

    /// ReadLoop task - runs in spawn_blocking to avoid blocking tokio runtime
    fn read_loop<S: RawSource>(
        mut source: S,
        config: ReaderConfig,
        tx: mpsc::UnboundedSender<RawData>,
        metrics: Arc<ReaderMetrics>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(), ReaderError> {
        info!("ReadLoop starting");

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("ReadLoop received shutdown signal");
                break;
            }

            match source.read_data(config.read_timeout_ms, config.buffer_size) {
                Ok(Some(raw)) => {
                    metrics.buffers_read.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .bytes_read
                        .fetch_add(raw.size as u64, Ordering::Relaxed);
                    metrics.queue_length.fetch_add(1, Ordering::Relaxed);

                    if tx.send(raw).is_err() {
                        warn!("Decode channel closed, stopping read loop");
                        break;
                    }
                }
                Ok(None) => {
                    // Timeout - no data available, continue
                }
                Err(SourceError::Stop) => {
                    info!("Source reported end of data");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Read error");
                    metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                    // Continue on non-fatal errors
                }
            }
        }

        info!("ReadLoop stopped");
        Ok(())
    }

    /// DecodeLoop task - decodes raw buffers and forwards batches
    ///
    /// Runs until the raw channel closes, so buffers already read are
    /// drained after shutdown.
    async fn decode_loop(
        decoder: ZleDecoder,
        mut rx: mpsc::UnboundedReceiver<RawData>,
        out: mpsc::Sender<DecodedBatch>,
        metrics: Arc<ReaderMetrics>,
    ) -> Result<(), ReaderError> {
        info!("DecodeLoop starting");
        let mut sequence_number: u64 = 0;

        while let Some(raw) = rx.recv().await {
            metrics.queue_length.fetch_sub(1, Ordering::Relaxed);

            let report = decoder.decode(&raw);
            metrics
                .events_decoded
                .fetch_add(report.events.len() as u64, Ordering::Relaxed);
            metrics
                .decode_errors
                .fetch_add(report.errors.len() as u64, Ordering::Relaxed);
            metrics
                .inconsistent_events
                .fetch_add(report.inconsistent_events() as u64, Ordering::Relaxed);

            if report.events.is_empty() && report.errors.is_empty() {
                continue;
            }

            let batch = DecodedBatch {
                sequence_number,
                n_events_reported: raw.n_events,
                events: report.events,
                errors: report.errors,
            };
            let n_events = batch.events.len();

            if out.send(batch).await.is_err() {
                warn!("Batch consumer dropped, stopping decode loop");
                return Err(ReaderError::ChannelSend);
            }
            metrics.batches_published.fetch_add(1, Ordering::Relaxed);
            debug!(seq = sequence_number, events = n_events, "Published batch");
            sequence_number += 1;
        }

        info!(
            total_batches = sequence_number,
            total_events = metrics.events_decoded.load(Ordering::Relaxed),
            "DecodeLoop stopped"
        );
        Ok(())
    }

    /// Run the pipeline until the source ends or shutdown is signalled
    ///
    /// Spawns two tasks:
    /// - ReadLoop task: reads from the source (blocking)
    /// - DecodeLoop task: decodes and sends batches to `out` (async)
    pub async fn run<S: RawSource + 'static>(
        self,
        source: S,
        out: mpsc::Sender<DecodedBatch>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ReaderError> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawData>();

        // Shutdown flag for ReadLoop (it runs in spawn_blocking, can't use async channel)
        let read_shutdown = Arc::new(AtomicBool::new(false));

        let read_config = self.config.clone();
        let read_metrics = self.metrics.clone();
        let read_flag = read_shutdown.clone();
        let read_handle = tokio::task::spawn_blocking(move || {
            Self::read_loop(source, read_config, raw_tx, read_metrics, read_flag)
        });

        let decoder = ZleDecoder::new(self.decoder.clone());
        let decode_metrics = self.metrics.clone();
        let mut decode_handle =
            tokio::spawn(Self::decode_loop(decoder, raw_rx, out, decode_metrics));

        let decode_result = tokio::select! {
            result = &mut decode_handle => result,
            _ = shutdown.recv() => {
                info!("Reader received shutdown signal");
                read_shutdown.store(true, Ordering::Relaxed);
                (&mut decode_handle).await
            }
        };

        // Decode side may have finished first (consumer gone)
        read_shutdown.store(true, Ordering::Relaxed);
        let read_result = read_handle
            .await
            .map_err(|e| ReaderError::Task(e.to_string()))?;
        let decode_result = decode_result.map_err(|e| ReaderError::Task(e.to_string()))?;

        let m = self.metrics.snapshot();
        info!(
            total_buffers = m.buffers_read,
            total_bytes = m.bytes_read,
            total_events = m.events_decoded,
            decode_errors = m.decode_errors,
            inconsistent = m.inconsistent_events,
            "Reader stopped"
        );

        read_result?;
        decode_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source_emulator::{Emulator, EmulatorConfig};
    use std::io::Cursor;

    fn emulator(buffers: u64, events: usize) -> Emulator {
        Emulator::new(EmulatorConfig {
            num_channels: 2,
            window_samples: 64,
            events_per_buffer: events,
            max_buffers: Some(buffers),
            seed: Some(7),
            ..Default::default()
        })
        .unwrap()
    }

    fn decoder_config() -> ZleConfig {
        ZleConfig {
            num_channels: 2,
            ..Default::default()
        }
    }

    async fn collect(mut rx: mpsc::Receiver<DecodedBatch>) -> Vec<DecodedBatch> {
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        batches
    }

    /// Source that never has data
    struct IdleSource;

    impl RawSource for IdleSource {
        fn read_data(&mut self, _: i32, _: usize) -> Result<Option<RawData>, SourceError> {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(None)
        }
    }

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.buffer_size, 1024 * 1024);
        assert_eq!(config.read_timeout_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = ReaderConfig {
            buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Reader::new(config, ZleConfig::default()),
            Err(ReaderError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_pipeline_over_emulator() {
        let reader = Reader::new(ReaderConfig::default(), decoder_config()).unwrap();
        let metrics = reader.metrics().clone();
        let (out_tx, out_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let consumer = tokio::spawn(collect(out_rx));
        reader
            .run(emulator(3, 5), out_tx, shutdown_rx)
            .await
            .unwrap();
        let batches = consumer.await.unwrap();

        assert_eq!(batches.len(), 3);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.sequence_number, i as u64);
            assert_eq!(batch.n_events_reported, 5);
            assert_eq!(batch.events.len(), 5);
            assert!(batch.errors.is_empty());
            for event in &batch.events {
                assert!(event.integrity.is_consistent());
                assert_eq!(event.channels.len(), 2);
            }
        }

        let m = metrics.snapshot();
        assert_eq!(m.buffers_read, 3);
        assert_eq!(m.events_decoded, 15);
        assert_eq!(m.batches_published, 3);
        assert_eq!(m.decode_errors, 0);
        assert_eq!(m.queue_length, 0);
    }

    #[tokio::test]
    async fn test_pipeline_over_file_counts_bad_events() {
        // Two good single-channel events, then one with a reserved control word
        let mut words = Vec::new();
        for i in 0..2 {
            words.extend([0xA000_0008, 0x01, i, 0, 4, 0xC000_0002, 0x0002_0001, 0x0004_0003]);
        }
        words.extend([0xA000_0007, 0x01, 2, 0, 4, 0x8000_0000, 0x4000_0001]);
        let bytes = RawData::from_words(&words, 0).data;

        let decoder = ZleConfig {
            num_channels: 1,
            reserved_tag: decoder::ReservedTagPolicy::Reject,
            ..Default::default()
        };
        let reader = Reader::new(ReaderConfig::default(), decoder).unwrap();
        let metrics = reader.metrics().clone();
        let (out_tx, out_rx) = mpsc::channel(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let consumer = tokio::spawn(collect(out_rx));
        let source = FileSource::new(Cursor::new(bytes), 100_000, 64);
        reader.run(source, out_tx, shutdown_rx).await.unwrap();
        let batches = consumer.await.unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].events.len(), 2);
        assert_eq!(batches[0].errors.len(), 1);
        assert_eq!(metrics.snapshot().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_reader() {
        let reader = Reader::new(ReaderConfig::default(), decoder_config()).unwrap();
        let (out_tx, out_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(reader.run(IdleSource, out_tx, shutdown_rx));
        shutdown_tx.send(()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(collect(out_rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_consumer_stops_pipeline() {
        let reader = Reader::new(ReaderConfig::default(), decoder_config()).unwrap();
        let (out_tx, out_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        drop(out_rx);

        let source = Emulator::new(EmulatorConfig {
            num_channels: 2,
            window_samples: 64,
            events_per_buffer: 2,
            seed: Some(1),
            ..Default::default()
        })
        .unwrap();
        let result = reader.run(source, out_tx, shutdown_rx).await;
        assert!(matches!(result, Err(ReaderError::ChannelSend)));
    }
}
