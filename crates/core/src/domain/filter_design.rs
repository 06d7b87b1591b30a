//! Coefficient factory
//!
//! Pure functions turning [`ChainSettings`] into coefficients for the peak
//! band and the two cut bands. Cut bands are Butterworth designs split into
//! cascaded sections: for an even order `N` there are `N / 2` biquads, the
//! `i`-th one with `Q = 1 / (2 cos((2i + 1) pi / 2N))`. An odd order gets a
//! first-order section up front. Sections come out in cascade order and
//! must be applied in that order.
//!
//! Inputs are hardened before design: frequencies are clamped to
//! `[MIN_FREQUENCY, MAX_NYQUIST_FRACTION * fs]` and Q to at least `MIN_Q`,
//! so a bad parameter can never produce NaN coefficients.

use crate::domain::dsp::{BiquadCoeffs, Coefficients};
use crate::domain::settings::ChainSettings;
use std::f64::consts::PI;
use tracing::trace;

/// Highest Butterworth order a cut band supports
pub const MAX_ORDER: usize = 8;

/// Number of biquad slots in a cut band (ceil(MAX_ORDER / 2))
pub const MAX_SECTIONS: usize = 4;

/// Lowest frequency handed to a design function
pub const MIN_FREQUENCY: f64 = 1.0;

/// Designs stay below this fraction of the sample rate
pub const MAX_NYQUIST_FRACTION: f64 = 0.49;

/// Smallest Q handed to a design function
pub const MIN_Q: f64 = 0.025;

/// Up to four cascaded sections of a cut band, lowest index first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutCoefficients {
    sections: [Option<Coefficients>; MAX_SECTIONS],
    len: usize,
}

impl CutCoefficients {
    fn push(&mut self, coeffs: BiquadCoeffs) {
        debug_assert!(self.len < MAX_SECTIONS, "cut filter cascade overflow");
        if self.len < MAX_SECTIONS {
            self.sections[self.len] = Some(coeffs.into_shared());
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&Coefficients> {
        self.sections.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coefficients> {
        self.sections.iter().take(self.len).flatten()
    }
}

/// Clamp a frequency into the designable range for `sample_rate`
pub fn clamp_frequency(freq: f64, sample_rate: f64) -> f64 {
    freq.max(MIN_FREQUENCY).min(sample_rate * MAX_NYQUIST_FRACTION)
}

fn clamp_quality(q: f64) -> f64 {
    q.max(MIN_Q)
}

/// Peak band coefficients
pub fn make_peak_filter(settings: &ChainSettings, sample_rate: f64) -> Coefficients {
    let gain = settings.peak_gain_linear() as f64;
    let gain = if gain.is_finite() && gain > 0.0 { gain } else { 1.0 };

    BiquadCoeffs::peaking(
        sample_rate,
        clamp_frequency(settings.peak_freq as f64, sample_rate),
        clamp_quality(settings.peak_quality as f64),
        gain,
    )
    .into_shared()
}

/// Low-cut band coefficients: a Butterworth high-pass of the band's slope
pub fn make_low_cut_filter(settings: &ChainSettings, sample_rate: f64) -> CutCoefficients {
    design_iir_highpass_high_order_butterworth(
        settings.low_cut_freq as f64,
        sample_rate,
        settings.low_cut_slope.filter_order(),
    )
}

/// High-cut band coefficients: a Butterworth low-pass of the band's slope
pub fn make_high_cut_filter(settings: &ChainSettings, sample_rate: f64) -> CutCoefficients {
    design_iir_lowpass_high_order_butterworth(
        settings.high_cut_freq as f64,
        sample_rate,
        settings.high_cut_slope.filter_order(),
    )
}

/// Butterworth low-pass of `order` (1..=8) as cascaded sections
pub fn design_iir_lowpass_high_order_butterworth(
    freq: f64,
    sample_rate: f64,
    order: usize,
) -> CutCoefficients {
    design_butterworth(freq, sample_rate, order, Pass::Low)
}

/// Butterworth high-pass of `order` (1..=8) as cascaded sections
pub fn design_iir_highpass_high_order_butterworth(
    freq: f64,
    sample_rate: f64,
    order: usize,
) -> CutCoefficients {
    design_butterworth(freq, sample_rate, order, Pass::High)
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Low,
    High,
}

fn design_butterworth(freq: f64, sample_rate: f64, order: usize, pass: Pass) -> CutCoefficients {
    debug_assert!((1..=MAX_ORDER).contains(&order), "order {order} out of range");
    let order = order.clamp(1, MAX_ORDER);
    let freq = clamp_frequency(freq, sample_rate);

    let mut cascade = CutCoefficients::default();

    if order % 2 == 1 {
        cascade.push(match pass {
            Pass::Low => BiquadCoeffs::first_order_low_pass(sample_rate, freq),
            Pass::High => BiquadCoeffs::first_order_high_pass(sample_rate, freq),
        });

        for i in 0..order / 2 {
            let q = 1.0 / (2.0 * ((i as f64 + 1.0) * PI / order as f64).cos());
            cascade.push(section(pass, sample_rate, freq, q));
        }
    } else {
        for i in 0..order / 2 {
            let q = 1.0 / (2.0 * ((2.0 * i as f64 + 1.0) * PI / (order as f64 * 2.0)).cos());
            cascade.push(section(pass, sample_rate, freq, q));
        }
    }

    trace!(?pass, freq, order, sections = cascade.len(), "Butterworth cascade designed");
    cascade
}

fn section(pass: Pass, sample_rate: f64, freq: f64, q: f64) -> BiquadCoeffs {
    match pass {
        Pass::Low => BiquadCoeffs::low_pass(sample_rate, freq, q),
        Pass::High => BiquadCoeffs::high_pass(sample_rate, freq, q),
    }
}
