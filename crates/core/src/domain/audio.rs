//! Audio stream abstractions and domain models
//!
//! This module defines the platform-agnostic description of the audio the
//! equalizer is asked to process. Device access lives in the `infra` crate.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Error in audio stream creation or processing
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid configuration for the processor or a stream
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input/Output error at the OS level
    #[error("OS error: {0}")]
    OsError(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Hz192000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Hz192000 => 192000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            96000 => SampleRate::Hz96000,
            192000 => SampleRate::Hz192000,
            hz => SampleRate::Custom(hz),
        }
    }

    /// Nyquist frequency (half the sample rate)
    pub fn nyquist(&self) -> f64 {
        self.hz() as f64 / 2.0
    }
}

/// Number of audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Surround(n) => *n,
        }
    }
}

/// Configuration for an audio stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            channels: ChannelCount::Stereo,
            buffer_size: 512,
        }
    }
}

/// What the processor is told before audio starts flowing
///
/// A new spec means a new `prepare` call: coefficients depend on the
/// sample rate and must be designed again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub maximum_block_size: u32,
    pub num_channels: u32,
}

impl ProcessSpec {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.maximum_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "maximum block size must be non-zero".to_string(),
            ));
        }
        if self.num_channels == 0 {
            return Err(AudioError::InvalidConfiguration(
                "channel count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&StreamConfig> for ProcessSpec {
    fn from(config: &StreamConfig) -> Self {
        Self {
            sample_rate: config.sample_rate.hz() as f64,
            maximum_block_size: config.buffer_size,
            num_channels: config.channels.count() as u32,
        }
    }
}

/// Sample rate published by the processor for other threads
///
/// Holds the f64 bits in an atomic; `0.0` means "not prepared yet".
#[derive(Debug, Clone, Default)]
pub struct SharedSampleRate(Arc<AtomicU64>);

impl SharedSampleRate {
    pub fn new(sample_rate: f64) -> Self {
        Self(Arc::new(AtomicU64::new(sample_rate.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, sample_rate: f64) {
        self.0.store(sample_rate.to_bits(), Ordering::Release);
    }

    pub fn is_known(&self) -> bool {
        self.get() > 0.0
    }
}
