//! Platform-specific audio backend implementations using CPAL
//!
//! This module provides cross-platform audio support through CPAL, which abstracts
//! platform-specific APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod devices;
pub mod queue;
pub mod stream;

pub use devices::{device_names, find_device, Direction};
pub use queue::{block_queue, BlockConsumer, BlockProducer};
pub use stream::{EqStream, StreamStats};
