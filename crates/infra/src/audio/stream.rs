//! Real-time duplex stream running the equalizer
//!
//! The input callback copies captured frames into a [`block_queue`]; the
//! output callback drains the queue into the device buffer and runs the
//! [`EqProcessor`] over it in place. The processor is moved into the output
//! callback and never leaves it: parameter changes reach it through the
//! shared [`ParameterStore`](trieq_core::domain::ParameterStore). When the
//! stream stops and cpal drops the callback, the processor is released.

use crate::audio::devices::{find_device, name_of, Direction};
use crate::audio::queue::{block_queue, QueueCounters};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use tracing::{error, info};
use trieq_core::domain::audio::{AudioError, ProcessSpec, Result, SharedSampleRate, StreamConfig};
use trieq_core::domain::processor::{AudioProcessor, EqProcessor};

/// Blocks of latency the queue may hold between capture and playback
const QUEUE_BLOCKS: usize = 8;

/// Running totals for an [`EqStream`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Captured blocks dropped because playback fell behind
    pub overruns: u64,
    /// Playback callbacks padded with silence
    pub underruns: u64,
}

/// Owns a prepared processor for the lifetime of an output callback
///
/// Calls [`AudioProcessor::release`] when dropped.
struct Hosted<P: AudioProcessor>(P);

impl<P: AudioProcessor> Hosted<P> {
    fn process(&mut self, data: &mut [f32], channels: usize) {
        self.0.process_interleaved(data, channels);
    }
}

impl<P: AudioProcessor> Drop for Hosted<P> {
    fn drop(&mut self) {
        info!(processor = self.0.name(), "Releasing processor");
        self.0.release();
    }
}

/// Capture → equalizer → playback
pub struct EqStream {
    _input: Stream,
    _output: Stream,
    config: StreamConfig,
    sample_rate: SharedSampleRate,
    counters: QueueCounters,
    input_name: String,
    output_name: String,
}

impl EqStream {
    /// Open and start a duplex stream
    ///
    /// `processor` is prepared for `config` before either stream starts.
    /// Device names select devices; `None` picks the host default.
    pub fn open(
        mut processor: EqProcessor,
        config: &StreamConfig,
        input_device: Option<&str>,
        output_device: Option<&str>,
    ) -> Result<Self> {
        info!(
            input = input_device.unwrap_or("<default>"),
            output = output_device.unwrap_or("<default>"),
            "Creating equalizer stream: config={:?}",
            config
        );

        let host = cpal::default_host();
        let input = find_device(&host, Direction::Input, input_device)?;
        let output = find_device(&host, Direction::Output, output_device)?;

        let channels = config.channels.count() as usize;
        if channels == 0 {
            return Err(AudioError::InvalidConfiguration("stream has no channels".to_string()));
        }

        let spec = ProcessSpec::from(config);
        processor.prepare(spec)?;
        let sample_rate = processor.sample_rate_handle();
        let mut hosted = Hosted(processor);

        // Convert to CPAL config
        let cpal_config = CpalStreamConfig {
            channels: config.channels.count(),
            sample_rate: config.sample_rate.hz(),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let block_len = config.buffer_size as usize * channels;
        let (producer, mut consumer) = block_queue(QUEUE_BLOCKS, block_len);
        let counters = consumer.counters();

        let input_stream = input
            .build_input_stream(
                &cpal_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    producer.push(data);
                },
                |err| error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build input stream: {}", e)))?;

        let output_stream = output
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    consumer.fill(data);
                    hosted.process(data, channels);
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))?;

        output_stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;
        input_stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start input stream: {}", e)))?;

        let input_name = name_of(&input);
        let output_name = name_of(&output);
        info!(
            input = %input_name,
            output = %output_name,
            sample_rate = spec.sample_rate,
            "Equalizer stream started"
        );

        Ok(Self {
            _input: input_stream,
            _output: output_stream,
            config: config.clone(),
            sample_rate,
            counters,
            input_name,
            output_name,
        })
    }

    /// Get stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Sample rate the processor was prepared with
    pub fn sample_rate(&self) -> SharedSampleRate {
        self.sample_rate.clone()
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            overruns: self.counters.overruns(),
            underruns: self.counters.underruns(),
        }
    }
}

impl Drop for EqStream {
    fn drop(&mut self) {
        let stats = self.stats();
        info!(
            overruns = stats.overruns,
            underruns = stats.underruns,
            "Equalizer stream stopped"
        );
    }
}
