//! Fixed-topology stereo filter chain
//!
//! The chain is always low-cut cascade → peak → high-cut cascade:
//!
//! ```text
//!  in ─► [LC0][LC1][LC2][LC3] ─► [PEAK] ─► [HC0][HC1][HC2][HC3] ─► out
//! ```
//!
//! Configuration (coefficients and bypass flags) lives in one
//! [`ChainConfiguration`] shared by both channels, so left and right can
//! never be observed configured differently. Each channel only owns its
//! biquad history ([`ChannelState`]).
//!
//! Every stage holds its coefficients in a [`CoefficientSlot`]: an
//! epoch-protected atomic pointer. Replacing coefficients is a single
//! pointer swap; the previous set is reclaimed only once no reader can
//! still be looking at it.

use crate::domain::dsp::{BiquadCoeffs, BiquadFilter, Coefficients};
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Biquad slots per cut band
pub const CUT_SLOTS: usize = 4;

/// Total biquad stages in one channel (4 + 1 + 4)
pub const STAGE_COUNT: usize = CUT_SLOTS * 2 + 1;

const PEAK_STAGE: usize = CUT_SLOTS;
const HIGH_CUT_FIRST_STAGE: usize = CUT_SLOTS + 1;

/// Bands of the chain, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

// ============================================================================
// COEFFICIENT SLOT
// ============================================================================

/// One stage's coefficients plus its bypass flag
pub struct CoefficientSlot {
    coefficients: Atomic<Coefficients>,
    bypassed: AtomicBool,
}

impl CoefficientSlot {
    pub fn new(coefficients: Coefficients, bypassed: bool) -> Self {
        Self {
            coefficients: Atomic::new(coefficients),
            bypassed: AtomicBool::new(bypassed),
        }
    }

    /// Unity coefficients, pass-through
    pub fn unity(bypassed: bool) -> Self {
        Self::new(BiquadCoeffs::default().into_shared(), bypassed)
    }

    fn current<'g>(&self, guard: &'g Guard) -> &'g Coefficients {
        let shared = self.coefficients.load(Ordering::Acquire, guard);
        // SAFETY: the pointer is never null (set in `new`, only ever swapped
        // for another non-null value) and the pointee is not destroyed
        // before `guard` is dropped.
        unsafe { shared.deref() }
    }

    /// Shared handle to the installed coefficients
    ///
    /// The handle stays valid however many replacements happen afterwards.
    pub fn load(&self) -> Coefficients {
        let guard = epoch::pin();
        Arc::clone(self.current(&guard))
    }

    /// Copy of the installed coefficients
    pub fn read(&self) -> BiquadCoeffs {
        let guard = epoch::pin();
        **self.current(&guard)
    }

    fn read_with(&self, guard: &Guard) -> BiquadCoeffs {
        **self.current(guard)
    }

    /// Install new coefficients with one atomic pointer swap
    ///
    /// Returns `false` without touching the slot when the installed set is
    /// already equal to `replacement`.
    pub fn replace(&self, replacement: &Coefficients) -> bool {
        let guard = epoch::pin();
        let installed = self.current(&guard);
        if Arc::ptr_eq(installed, replacement) || **installed == **replacement {
            return false;
        }

        let previous = self.coefficients.swap(
            Owned::new(Arc::clone(replacement)),
            Ordering::AcqRel,
            &guard,
        );
        // SAFETY: `previous` is no longer reachable from the slot; readers
        // that loaded it are pinned, so destruction waits for them.
        unsafe { guard.defer_destroy(previous) };
        true
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Release);
    }
}

impl Drop for CoefficientSlot {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach this slot.
        unsafe {
            let guard = epoch::unprotected();
            let last = self.coefficients.swap(Shared::null(), Ordering::Relaxed, guard);
            if !last.is_null() {
                drop(last.into_owned());
            }
        }
    }
}

impl fmt::Debug for CoefficientSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoefficientSlot")
            .field("coefficients", &self.read())
            .field("bypassed", &self.is_bypassed())
            .finish()
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Four cascaded slots plus a band-level bypass
#[derive(Debug)]
pub struct CutFilter {
    slots: [CoefficientSlot; CUT_SLOTS],
    bypassed: AtomicBool,
}

impl CutFilter {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| CoefficientSlot::unity(true)),
            bypassed: AtomicBool::new(false),
        }
    }

    pub fn slot(&self, index: usize) -> Option<&CoefficientSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[CoefficientSlot; CUT_SLOTS] {
        &self.slots
    }

    /// Slots currently contributing to the cascade
    pub fn active_len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_bypassed()).count()
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Release);
    }
}

impl Default for CutFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Coefficients and bypass pattern of the whole chain
///
/// Passes audio through unchanged until the first update.
#[derive(Debug)]
pub struct ChainConfiguration {
    pub low_cut: CutFilter,
    pub peak: CoefficientSlot,
    pub high_cut: CutFilter,
}

impl ChainConfiguration {
    pub fn new() -> Self {
        Self {
            low_cut: CutFilter::new(),
            peak: CoefficientSlot::unity(false),
            high_cut: CutFilter::new(),
        }
    }

    pub fn is_bypassed(&self, position: ChainPosition) -> bool {
        match position {
            ChainPosition::LowCut => self.low_cut.is_bypassed(),
            ChainPosition::Peak => self.peak.is_bypassed(),
            ChainPosition::HighCut => self.high_cut.is_bypassed(),
        }
    }

    pub fn set_bypassed(&self, position: ChainPosition, bypassed: bool) {
        match position {
            ChainPosition::LowCut => self.low_cut.set_bypassed(bypassed),
            ChainPosition::Peak => self.peak.set_bypassed(bypassed),
            ChainPosition::HighCut => self.high_cut.set_bypassed(bypassed),
        }
    }

    /// Copy out every stage that currently contributes, in processing order
    ///
    /// Pins the epoch once for the whole chain. Allocation free.
    pub fn resolve(&self) -> ActiveStages {
        let guard = epoch::pin();
        let mut active = ActiveStages::default();

        if !self.low_cut.is_bypassed() {
            for (i, slot) in self.low_cut.slots.iter().enumerate() {
                if !slot.is_bypassed() {
                    active.push(i, slot.read_with(&guard));
                }
            }
        }

        if !self.peak.is_bypassed() {
            active.push(PEAK_STAGE, self.peak.read_with(&guard));
        }

        if !self.high_cut.is_bypassed() {
            for (i, slot) in self.high_cut.slots.iter().enumerate() {
                if !slot.is_bypassed() {
                    active.push(HIGH_CUT_FIRST_STAGE + i, slot.read_with(&guard));
                }
            }
        }

        active
    }

    /// Combined linear magnitude of all active stages at `freq`
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        self.resolve().magnitude_for_frequency(freq, sample_rate)
    }
}

impl Default for ChainConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

/// Stages resolved for one block: stage index and a copy of its coefficients
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActiveStages {
    stages: [(usize, BiquadCoeffs); STAGE_COUNT],
    len: usize,
}

impl ActiveStages {
    fn push(&mut self, stage: usize, coeffs: BiquadCoeffs) {
        if self.len < STAGE_COUNT {
            self.stages[self.len] = (stage, coeffs);
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, BiquadCoeffs)> {
        self.stages[..self.len].iter()
    }

    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        self.iter()
            .map(|(_, coeffs)| coeffs.magnitude_for_frequency(freq, sample_rate))
            .product()
    }
}

// ============================================================================
// PER-CHANNEL STATE
// ============================================================================

/// Biquad history for every stage of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelState {
    stages: [BiquadFilter; STAGE_COUNT],
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process_sample(&mut self, active: &ActiveStages, sample: f32) -> f32 {
        let mut y = sample;
        for (stage, coeffs) in active.iter() {
            y = self.stages[*stage].process_sample(coeffs, y);
        }
        y
    }

    /// Run the active stages over `buffer` in place
    pub fn process(&mut self, active: &ActiveStages, buffer: &mut [f32]) {
        if active.is_empty() {
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(active, *sample);
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

// ============================================================================
// STEREO CHAIN
// ============================================================================

/// Left and right channels sharing one configuration
#[derive(Debug)]
pub struct StereoChain {
    configuration: Arc<ChainConfiguration>,
    left: ChannelState,
    right: ChannelState,
}

impl StereoChain {
    pub fn new() -> Self {
        Self::with_configuration(Arc::new(ChainConfiguration::new()))
    }

    pub fn with_configuration(configuration: Arc<ChainConfiguration>) -> Self {
        Self {
            configuration,
            left: ChannelState::new(),
            right: ChannelState::new(),
        }
    }

    /// Configuration handle, shareable with observers on other threads
    pub fn configuration(&self) -> &Arc<ChainConfiguration> {
        &self.configuration
    }

    /// Process split left/right buffers in place
    pub fn process_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let active = self.configuration.resolve();
        self.left.process(&active, left);
        self.right.process(&active, right);
    }

    /// Process one mono buffer through the left channel
    pub fn process_mono(&mut self, buffer: &mut [f32]) {
        let active = self.configuration.resolve();
        self.left.process(&active, buffer);
    }

    /// Process interleaved frames in place
    ///
    /// Channel 0 goes through the left chain and channel 1 through the
    /// right chain. Further channels are left untouched.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        let active = self.configuration.resolve();
        if active.is_empty() {
            return;
        }

        for frame in data.chunks_mut(channels) {
            frame[0] = self.left.process_sample(&active, frame[0]);
            if let Some(right) = frame.get_mut(1) {
                *right = self.right.process_sample(&active, *right);
            }
        }
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

impl Default for StereoChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gain_coeffs(gain: f32) -> Coefficients {
        BiquadCoeffs {
            b0: gain,
            ..BiquadCoeffs::default()
        }
        .into_shared()
    }

    #[test]
    fn test_new_chain_passes_audio_through() {
        let mut chain = StereoChain::new();
        let mut left = vec![0.5, -0.25, 0.75];
        let mut right = vec![0.1, 0.2, 0.3];

        chain.process_stereo(&mut left, &mut right);

        assert_eq!(left, vec![0.5, -0.25, 0.75]);
        assert_eq!(right, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_slot_replace_swaps_and_skips_equal() {
        let slot = CoefficientSlot::unity(false);
        let held = slot.load();

        assert!(slot.replace(&gain_coeffs(0.5)));
        assert!(!slot.replace(&gain_coeffs(0.5)));

        // A handle taken before the swap is unaffected.
        assert_eq!(held.b0, 1.0);
        assert_eq!(slot.read().b0, 0.5);
    }

    #[test]
    fn test_resolve_orders_stages() {
        let config = ChainConfiguration::new();
        config.low_cut.slots[1].replace(&gain_coeffs(2.0));
        config.low_cut.slots[1].set_bypassed(false);
        config.high_cut.slots[0].replace(&gain_coeffs(3.0));
        config.high_cut.slots[0].set_bypassed(false);
        config.peak.replace(&gain_coeffs(4.0));

        let active = config.resolve();
        let order: Vec<(usize, f32)> = active.iter().map(|(i, c)| (*i, c.b0)).collect();
        assert_eq!(order, vec![(1, 2.0), (PEAK_STAGE, 4.0), (HIGH_CUT_FIRST_STAGE, 3.0)]);
    }

    #[test]
    fn test_band_bypass_skips_all_slots() {
        let config = ChainConfiguration::new();
        for slot in config.low_cut.slots() {
            slot.replace(&gain_coeffs(0.5));
            slot.set_bypassed(false);
        }
        assert_eq!(config.low_cut.active_len(), 4);

        config.set_bypassed(ChainPosition::LowCut, true);
        config.set_bypassed(ChainPosition::Peak, true);
        assert!(config.resolve().is_empty());
        assert_eq!(config.magnitude_for_frequency(1000.0, 48000.0), 1.0);
    }

    #[test]
    fn test_interleaved_matches_split() {
        let config = Arc::new(ChainConfiguration::new());
        config.peak.replace(&BiquadCoeffs::peaking(48000.0, 1000.0, 1.0, 2.0).into_shared());

        let left: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();
        let right: Vec<f32> = (0..64).map(|i| (i as f32 * 0.07).cos()).collect();

        let mut split = StereoChain::with_configuration(Arc::clone(&config));
        let (mut l, mut r) = (left.clone(), right.clone());
        split.process_stereo(&mut l, &mut r);

        let mut interleaved: Vec<f32> = left
            .iter()
            .zip(right.iter())
            .flat_map(|(a, b)| [*a, *b])
            .collect();
        let mut inter = StereoChain::with_configuration(config);
        inter.process_interleaved(&mut interleaved, 2);

        for (i, frame) in interleaved.chunks(2).enumerate() {
            assert_eq!(frame[0], l[i]);
            assert_eq!(frame[1], r[i]);
        }
    }

    #[test]
    fn test_interleaved_leaves_extra_channels() {
        let mut chain = StereoChain::new();
        chain
            .configuration()
            .peak
            .replace(&gain_coeffs(0.5));

        let mut data = vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        chain.process_interleaved(&mut data, 3);

        assert_eq!(data, vec![0.5, 0.5, 1.0, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut chain = StereoChain::new();
        chain
            .configuration()
            .peak
            .replace(&BiquadCoeffs::peaking(48000.0, 100.0, 1.0, 4.0).into_shared());

        let mut left = vec![1.0; 32];
        let mut right = vec![1.0; 32];
        chain.process_stereo(&mut left, &mut right);
        chain.reset();

        let mut silent_l = vec![0.0; 8];
        let mut silent_r = vec![0.0; 8];
        chain.process_stereo(&mut silent_l, &mut silent_r);
        assert!(silent_l.iter().chain(silent_r.iter()).all(|&s| s == 0.0));
    }
}
