//! The equalizer as an audio processor
//!
//! [`EqProcessor`] owns the live [`StereoChain`]. The host calls
//! [`AudioProcessor::prepare`] whenever sample rate or block size change,
//! then hands blocks to one of the `process_*` methods on the audio thread.
//! Each block starts with [`EqProcessor::update_filters`], which reads the
//! parameter store and reinstalls coefficients only when something changed:
//! a steady-state block performs no allocation and takes no lock.

use crate::domain::audio::{ProcessSpec, Result, SharedSampleRate};
use crate::domain::chain::{ChainConfiguration, StereoChain};
use crate::domain::params::ParameterStore;
use crate::domain::settings::ChainSettings;
use crate::domain::updater::update_chain;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Host-facing processor lifecycle
///
/// `process_*` methods run on the real-time thread: they must not block,
/// allocate or fail.
pub trait AudioProcessor: Send {
    /// Allocate state for `spec`; called before the first block and again
    /// whenever the spec changes
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()>;

    /// Process interleaved frames in place
    fn process_interleaved(&mut self, data: &mut [f32], channels: usize);

    /// Clear filter history without touching the configuration
    fn reset(&mut self);

    /// Playback stopped; drop transient state
    fn release(&mut self);

    fn name(&self) -> &str;
}

/// Three-band equalizer: low cut → peak → high cut, stereo
pub struct EqProcessor {
    store: Arc<ParameterStore>,
    chain: Option<StereoChain>,
    spec: Option<ProcessSpec>,
    sample_rate: SharedSampleRate,
    applied: Option<(ChainSettings, f64)>,
}

impl EqProcessor {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            chain: None,
            spec: None,
            sample_rate: SharedSampleRate::default(),
            applied: None,
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    /// Sample rate as seen by other threads; `0.0` until prepared
    pub fn sample_rate_handle(&self) -> SharedSampleRate {
        self.sample_rate.clone()
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.spec.map(|spec| spec.sample_rate)
    }

    pub fn is_prepared(&self) -> bool {
        self.chain.is_some()
    }

    /// Live configuration, for observers on other threads
    pub fn chain_configuration(&self) -> Option<Arc<ChainConfiguration>> {
        self.chain.as_ref().map(|chain| Arc::clone(chain.configuration()))
    }

    /// Settings installed by the last update, if any
    pub fn applied_settings(&self) -> Option<ChainSettings> {
        self.applied.map(|(settings, _)| settings)
    }

    /// Read the current parameters and install them into the chain
    ///
    /// Cheap when nothing changed: one snapshot and a comparison. Returns
    /// whether coefficients were recomputed.
    pub fn update_filters(&mut self) -> bool {
        let (Some(chain), Some(spec)) = (self.chain.as_ref(), self.spec) else {
            return false;
        };

        let settings = ChainSettings::from_store(&self.store);
        if self.applied == Some((settings, spec.sample_rate)) {
            return false;
        }

        update_chain(chain.configuration(), &settings, spec.sample_rate);
        self.applied = Some((settings, spec.sample_rate));
        trace!(?settings, "Filters updated");
        true
    }

    /// Process split left/right buffers in place
    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.update_filters();
        if let Some(chain) = self.chain.as_mut() {
            chain.process_stereo(left, right);
        }
    }

    /// Process a mono buffer through the left channel
    pub fn process_mono(&mut self, buffer: &mut [f32]) {
        self.update_filters();
        if let Some(chain) = self.chain.as_mut() {
            chain.process_mono(buffer);
        }
    }
}

impl AudioProcessor for EqProcessor {
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;

        info!(
            sample_rate = spec.sample_rate,
            block_size = spec.maximum_block_size,
            channels = spec.num_channels,
            "Preparing equalizer"
        );

        self.chain = Some(StereoChain::new());
        self.spec = Some(spec);
        self.applied = None;
        self.sample_rate.set(spec.sample_rate);
        self.update_filters();

        Ok(())
    }

    fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        self.update_filters();
        if let Some(chain) = self.chain.as_mut() {
            chain.process_interleaved(data, channels);
        }
    }

    fn reset(&mut self) {
        if let Some(chain) = self.chain.as_mut() {
            chain.reset();
        }
    }

    fn release(&mut self) {
        debug!("Releasing equalizer resources");
        self.reset();
    }

    fn name(&self) -> &str {
        "Equalizer"
    }
}
