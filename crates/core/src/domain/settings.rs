//! Typed view over the raw parameter values

use crate::domain::params::{ParameterId, ParameterSnapshot, ParameterStore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Steepness of a cut filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    #[serde(rename = "12")]
    Slope12,
    #[serde(rename = "24")]
    Slope24,
    #[serde(rename = "36")]
    Slope36,
    #[serde(rename = "48")]
    Slope48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Slope12, Slope::Slope24, Slope::Slope36, Slope::Slope48];

    /// Position in the choice list, 0 for 12 dB/Oct
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Choice index to slope; out-of-range indices clamp to the nearest slope
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self::ALL[ordinal.min(Self::ALL.len() - 1)]
    }

    /// Number of active biquads in the cascade (1..=4)
    pub fn cascade_len(self) -> usize {
        self.ordinal() + 1
    }

    /// Butterworth order realising this slope (2, 4, 6 or 8)
    pub fn filter_order(self) -> usize {
        self.cascade_len() * 2
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.cascade_len() as u32
    }

    pub fn from_db_per_octave(db: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.db_per_octave() == db)
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dB/Oct", self.db_per_octave())
    }
}

/// Everything the chain updater needs, read once per update cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_in_decibels: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak_bypassed: bool,
    pub high_cut_bypassed: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self::from_snapshot(&ParameterSnapshot::default())
    }
}

impl ChainSettings {
    /// Extract settings from a parameter snapshot
    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Self {
        Self {
            peak_freq: snapshot.get(ParameterId::PeakFreq),
            peak_gain_in_decibels: snapshot.get(ParameterId::PeakGain),
            peak_quality: snapshot.get(ParameterId::PeakQuality),
            low_cut_freq: snapshot.get(ParameterId::LowCutFreq),
            high_cut_freq: snapshot.get(ParameterId::HighCutFreq),
            low_cut_slope: slope_from_choice(snapshot.get(ParameterId::LowCutSlope)),
            high_cut_slope: slope_from_choice(snapshot.get(ParameterId::HighCutSlope)),
            low_cut_bypassed: snapshot.get(ParameterId::LowCutBypassed) >= 0.5,
            peak_bypassed: snapshot.get(ParameterId::PeakBypassed) >= 0.5,
            high_cut_bypassed: snapshot.get(ParameterId::HighCutBypassed) >= 0.5,
        }
    }

    /// Extract settings from the live store
    pub fn from_store(store: &ParameterStore) -> Self {
        Self::from_snapshot(&store.snapshot())
    }

    /// The snapshot that would produce these settings
    pub fn to_snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot::default()
            .with(ParameterId::PeakFreq, self.peak_freq)
            .with(ParameterId::PeakGain, self.peak_gain_in_decibels)
            .with(ParameterId::PeakQuality, self.peak_quality)
            .with(ParameterId::LowCutFreq, self.low_cut_freq)
            .with(ParameterId::HighCutFreq, self.high_cut_freq)
            .with(ParameterId::LowCutSlope, self.low_cut_slope.ordinal() as f32)
            .with(ParameterId::HighCutSlope, self.high_cut_slope.ordinal() as f32)
            .with(ParameterId::LowCutBypassed, bool_value(self.low_cut_bypassed))
            .with(ParameterId::PeakBypassed, bool_value(self.peak_bypassed))
            .with(ParameterId::HighCutBypassed, bool_value(self.high_cut_bypassed))
    }

    /// Write these settings into a store, notifying its listeners
    pub fn apply_to(&self, store: &ParameterStore) {
        store.apply_snapshot(&self.to_snapshot());
    }

    /// Linear gain of the peak band
    pub fn peak_gain_linear(&self) -> f32 {
        10.0_f32.powf(self.peak_gain_in_decibels / 20.0)
    }
}

fn slope_from_choice(value: f32) -> Slope {
    if value.is_finite() && value > 0.0 {
        Slope::from_ordinal(value.round() as usize)
    } else {
        Slope::Slope12
    }
}

fn bool_value(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}
