//! Emulator data source - generates zero-length-encoded digitizer buffers
//!
//! Produces bit-exact ZLE events the way a x720/x724-class board would:
//! a noisy baseline with occasional pulses, suppressed below a threshold.
//! The emulator is a [`RawSource`], so it can stand in for hardware in the
//! reader pipeline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::reader::decoder::zle::{constants, pack_samples, ControlWord};
use crate::reader::decoder::RawData;
use crate::reader::source::{RawSource, SourceError};

/// Full scale of the emulated 14-bit ADC
///
/// Keeping samples below 0x4000 leaves bits 31:30 of every data word clear.
pub const ADC_MAX: u16 = 0x3FFF;

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Number of channels per event
    pub num_channels: u8,
    /// Samples per acquisition window (must be even)
    pub window_samples: u32,
    /// Events per buffer returned by `read_data`
    pub events_per_buffer: usize,
    /// Stop after this many buffers (None = run forever)
    pub max_buffers: Option<u64>,
    pub board_id: u8,
    pub baseline: u16,
    /// Gaussian noise sigma in ADC counts
    pub noise_sigma: f64,
    /// Pairs with a sample at or above this value are kept
    pub threshold: u16,
    /// Extra pairs kept before a pair over threshold
    pub lookback_words: u32,
    /// Extra pairs kept after a pair over threshold
    pub lookahead_words: u32,
    /// Probability that a channel carries a pulse in a given event
    pub pulse_probability: f64,
    /// Largest pulse amplitude above baseline
    pub max_amplitude: u16,
    /// RNG seed for reproducible streams
    pub seed: Option<u64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            num_channels: 8,
            window_samples: 512,
            events_per_buffer: 100,
            max_buffers: None,
            board_id: 0,
            baseline: 200,
            noise_sigma: 2.0,
            threshold: 260,
            lookback_words: 2,
            lookahead_words: 4,
            pulse_probability: 0.5,
            max_amplitude: 8000,
            seed: None,
        }
    }
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), EmulatorError> {
        if self.num_channels == 0 {
            return Err(EmulatorError::Config("num_channels must be at least 1".into()));
        }
        if self.window_samples == 0 || self.window_samples % 2 != 0 {
            return Err(EmulatorError::Config(format!(
                "window_samples must be even and non-zero, got {}",
                self.window_samples
            )));
        }
        if !(0.0..=1.0).contains(&self.pulse_probability) {
            return Err(EmulatorError::Config(format!(
                "pulse_probability must be within [0, 1], got {}",
                self.pulse_probability
            )));
        }
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(EmulatorError::Config(format!(
                "noise_sigma must be finite and non-negative, got {}",
                self.noise_sigma
            )));
        }
        let max_words = self.max_event_words();
        if max_words > u64::from(constants::header::EVENT_SIZE_MASK) {
            return Err(EmulatorError::Config(format!(
                "events of up to {} words do not fit the 28-bit size field",
                max_words
            )));
        }
        Ok(())
    }

    /// Largest event the encoder can produce with this configuration
    ///
    /// Worst case per channel is alternating single-pair good/skip runs:
    /// one control word per run plus the kept data words.
    pub fn max_event_words(&self) -> u64 {
        let pairs = u64::from(self.window_samples).div_ceil(2);
        let run_splits = pairs / u64::from(constants::control::COUNT_MASK);
        let per_channel = 1 + pairs + pairs / 2 + 1 + run_splits;
        constants::HEADER_SIZE_WORDS as u64 + u64::from(self.num_channels) * per_channel
    }
}

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// ZLE encoder
// ---------------------------------------------------------------------------

/// Zero-suppresses a channel waveform into a good/skip/data word stream
#[derive(Debug, Clone, Copy)]
pub struct ZleEncoder {
    pub threshold: u16,
    pub lookback_words: u32,
    pub lookahead_words: u32,
}

impl ZleEncoder {
    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self {
            threshold: config.threshold,
            lookback_words: config.lookback_words,
            lookahead_words: config.lookahead_words,
        }
    }

    /// Encode one channel window (without its size word)
    ///
    /// Samples must not exceed [`ADC_MAX`]; larger values would alias the
    /// control tag bits of their data word. An odd trailing sample is paired
    /// with itself.
    pub fn encode_channel(&self, samples: &[u16]) -> Vec<u32> {
        let pairs: Vec<u32> = samples
            .chunks(2)
            .map(|p| pack_samples(p[0], p.get(1).copied().unwrap_or(p[0])))
            .collect();
        let n = pairs.len();
        if n == 0 {
            return Vec::new();
        }

        let mut keep = vec![false; n];
        for (i, pair) in samples.chunks(2).enumerate() {
            if pair.iter().any(|&s| s >= self.threshold) {
                let lo = i.saturating_sub(self.lookback_words as usize);
                let hi = (i + self.lookahead_words as usize).min(n - 1);
                keep[lo..=hi].fill(true);
            }
        }

        let max_run = constants::control::COUNT_MASK as usize;
        let mut out = Vec::new();
        let mut i = 0;
        while i < n {
            let kept = keep[i];
            let mut j = i;
            while j < n && keep[j] == kept && j - i < max_run {
                j += 1;
            }
            let run = (j - i) as u32;
            if kept {
                out.push(ControlWord::good(run));
                out.extend_from_slice(&pairs[i..j]);
            } else {
                out.push(ControlWord::skip(run));
            }
            i = j;
        }
        out
    }
}

/// Assemble a full event: header plus one block per channel
///
/// The caller keeps the event within the 28-bit size field; see
/// [`EmulatorConfig::max_event_words`].
pub fn build_event(
    board_id: u8,
    event_counter: u32,
    trigger_time_tag: u32,
    channels: &[Vec<u16>],
    encoder: &ZleEncoder,
) -> Vec<u32> {
    use constants::header::*;

    let mut body = Vec::new();
    let mut mask = 0u32;
    for (ch, samples) in channels.iter().enumerate() {
        if ch < 8 {
            mask |= 1 << ch;
        }
        body.push(samples.len() as u32);
        body.extend(encoder.encode_channel(samples));
    }

    let size = (constants::HEADER_SIZE_WORDS + body.len()) as u32;
    let mut words = Vec::with_capacity(size as usize);
    words.push((TYPE_DATA << TYPE_SHIFT) | (size & EVENT_SIZE_MASK));
    words.push((((board_id as u32) & BOARD_ID_MASK) << BOARD_ID_SHIFT) | (mask & CHANNEL_MASK));
    words.push(event_counter & EVENT_COUNTER_MASK);
    words.push(trigger_time_tag);
    words.extend(body);
    words
}

// ---------------------------------------------------------------------------
// Emulator
// ---------------------------------------------------------------------------

/// Synthetic ZLE digitizer
pub struct Emulator {
    config: EmulatorConfig,
    encoder: ZleEncoder,
    noise: Normal<f64>,
    rng: StdRng,
    event_counter: u32,
    trigger_time_tag: u32,
    buffers_sent: u64,
}

impl Emulator {
    /// Create a new emulator with the given configuration
    pub fn new(config: EmulatorConfig) -> Result<Self, EmulatorError> {
        config.validate()?;
        let noise = Normal::new(0.0, config.noise_sigma)
            .map_err(|e| EmulatorError::Config(e.to_string()))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            channels = config.num_channels,
            window = config.window_samples,
            threshold = config.threshold,
            "Emulator configured"
        );

        Ok(Self {
            encoder: ZleEncoder::from_config(&config),
            config,
            noise,
            rng,
            event_counter: 0,
            trigger_time_tag: 0,
            buffers_sent: 0,
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn buffers_sent(&self) -> u64 {
        self.buffers_sent
    }

    /// Generate one channel window
    ///
    /// Baseline with Gaussian noise; with `pulse_probability` a pulse with a
    /// fast linear rise and exponential decay starts somewhere in the first
    /// half of the window.
    pub fn generate_waveform(&mut self) -> Vec<u16> {
        let n = self.config.window_samples as usize;
        let baseline = self.config.baseline as f64;

        let pulse = if self.rng.gen_bool(self.config.pulse_probability) {
            let amplitude = self.rng.gen_range(50.0..=self.config.max_amplitude.max(51) as f64);
            let start = self.rng.gen_range(n / 4..(n / 2).max(n / 4 + 1));
            Some((amplitude, start))
        } else {
            None
        };

        let rise_time = 5; // samples
        let decay_tau = 50.0; // samples

        (0..n)
            .map(|i| {
                let mut value = baseline + self.noise.sample(&mut self.rng);
                if let Some((amplitude, start)) = pulse {
                    if i >= start && i < start + rise_time {
                        value += amplitude * (i - start) as f64 / rise_time as f64;
                    } else if i >= start + rise_time {
                        let t = (i - start - rise_time) as f64;
                        value += amplitude * (-t / decay_tau).exp();
                    }
                }
                value.round().clamp(0.0, ADC_MAX as f64) as u16
            })
            .collect()
    }

    /// Next event together with the unsuppressed waveforms it encodes
    pub fn next_event_with_waveforms(&mut self) -> (Vec<u32>, Vec<Vec<u16>>) {
        let waveforms: Vec<Vec<u16>> = (0..self.config.num_channels)
            .map(|_| self.generate_waveform())
            .collect();

        self.trigger_time_tag = self
            .trigger_time_tag
            .wrapping_add(self.rng.gen_range(100..10_000));
        let words = build_event(
            self.config.board_id,
            self.event_counter,
            self.trigger_time_tag,
            &waveforms,
            &self.encoder,
        );
        self.event_counter = self.event_counter.wrapping_add(1) & constants::header::EVENT_COUNTER_MASK;
        (words, waveforms)
    }

    pub fn next_event(&mut self) -> Vec<u32> {
        self.next_event_with_waveforms().0
    }

    /// Next buffer of up to `events_per_buffer` events, stopping early at `buffer_size` bytes
    pub fn next_buffer(&mut self, buffer_size: usize) -> RawData {
        let mut words = Vec::new();
        let mut n_events = 0u32;
        while n_events == 0
            || ((n_events as usize) < self.config.events_per_buffer && words.len() * 4 < buffer_size)
        {
            words.extend(self.next_event());
            n_events += 1;
        }
        self.buffers_sent += 1;
        debug!(events = n_events, words = words.len(), "Generated buffer");
        RawData::from_words(&words, n_events)
    }
}

impl RawSource for Emulator {
    fn read_data(
        &mut self,
        _timeout_ms: i32,
        buffer_size: usize,
    ) -> Result<Option<RawData>, SourceError> {
        if let Some(max) = self.config.max_buffers {
            if self.buffers_sent >= max {
                return Err(SourceError::Stop);
            }
        }
        Ok(Some(self.next_buffer(buffer_size)))
    }
}
