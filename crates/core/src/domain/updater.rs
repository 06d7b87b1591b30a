//! Chain updater
//!
//! Recomputes coefficients from [`ChainSettings`] and installs them into a
//! [`ChainConfiguration`]. The same functions drive the live audio chain
//! and the response curve's local copy, so what is drawn is exactly what
//! is heard.
//!
//! Installation order matters for concurrent readers: coefficients are
//! swapped in before a slot is un-bypassed, so a reader that sees a slot
//! active also sees coefficients at least as new as the bypass change.

use crate::domain::chain::{ChainConfiguration, ChainPosition, CoefficientSlot, CutFilter, CUT_SLOTS};
use crate::domain::dsp::Coefficients;
use crate::domain::filter_design::{
    make_high_cut_filter, make_low_cut_filter, make_peak_filter, CutCoefficients,
};
use crate::domain::settings::{ChainSettings, Slope};
use tracing::trace;

/// Swap `replacement` into `slot`; no-op when the values are equal
///
/// Returns whether the slot changed.
pub fn update_coefficients(slot: &CoefficientSlot, replacement: &Coefficients) -> bool {
    slot.replace(replacement)
}

/// Install the cascade for `slope` into a cut band
///
/// Slots below `slope.cascade_len()` receive the matching section and are
/// enabled; the rest are bypassed and whatever they hold is ignored.
pub fn update_cut_filter(cut: &CutFilter, coefficients: &CutCoefficients, slope: Slope) {
    let active = slope.cascade_len();
    debug_assert!(
        coefficients.len() >= active,
        "slope {slope} needs {active} sections, got {}",
        coefficients.len()
    );

    for index in 0..CUT_SLOTS {
        let Some(slot) = cut.slot(index) else {
            continue;
        };

        if index < active {
            match coefficients.get(index) {
                Some(section) => {
                    update_coefficients(slot, section);
                    slot.set_bypassed(false);
                }
                // Missing section for an active slot: bypass rather than
                // run stale coefficients.
                None => slot.set_bypassed(true),
            }
        } else {
            slot.set_bypassed(true);
        }
    }
}

/// Recompute and install the peak band
pub fn update_peak_filter(chain: &ChainConfiguration, settings: &ChainSettings, sample_rate: f64) {
    let peak = make_peak_filter(settings, sample_rate);
    let changed = update_coefficients(&chain.peak, &peak);
    chain.set_bypassed(ChainPosition::Peak, settings.peak_bypassed);

    trace!(
        changed,
        freq = settings.peak_freq,
        gain_db = settings.peak_gain_in_decibels,
        q = settings.peak_quality,
        "Peak filter updated"
    );
}

/// Recompute and install the low-cut band
pub fn update_low_cut_filter(chain: &ChainConfiguration, settings: &ChainSettings, sample_rate: f64) {
    let cascade = make_low_cut_filter(settings, sample_rate);
    update_cut_filter(&chain.low_cut, &cascade, settings.low_cut_slope);
    chain.set_bypassed(ChainPosition::LowCut, settings.low_cut_bypassed);

    trace!(freq = settings.low_cut_freq, slope = %settings.low_cut_slope, "Low cut updated");
}

/// Recompute and install the high-cut band
pub fn update_high_cut_filter(chain: &ChainConfiguration, settings: &ChainSettings, sample_rate: f64) {
    let cascade = make_high_cut_filter(settings, sample_rate);
    update_cut_filter(&chain.high_cut, &cascade, settings.high_cut_slope);
    chain.set_bypassed(ChainPosition::HighCut, settings.high_cut_bypassed);

    trace!(freq = settings.high_cut_freq, slope = %settings.high_cut_slope, "High cut updated");
}

/// Bring the whole chain in line with `settings`
pub fn update_chain(chain: &ChainConfiguration, settings: &ChainSettings, sample_rate: f64) {
    update_low_cut_filter(chain, settings, sample_rate);
    update_peak_filter(chain, settings, sample_rate);
    update_high_cut_filter(chain, settings, sample_rate);
}
