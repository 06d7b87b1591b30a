//! Biquad building blocks for the equalizer
//!
//! All filtering is done with second-order IIR sections:
//! - [`BiquadCoeffs`] is an immutable coefficient set, shared through
//!   [`Coefficients`] handles between the audio chain and any reader
//! - [`BiquadFilter`] is the per-channel running state (Direct Form I)
//!
//! Coefficients are designed in f64 and stored as f32, which is what the
//! sample loop consumes.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Lowest level reported by [`gain_to_decibels`]
pub const MINUS_INFINITY_DB: f64 = -100.0;

/// Filter state below this magnitude is flushed to zero
///
/// Far under any audible level, and far above the f32 subnormal range.
pub const DENORMAL_THRESHOLD: f32 = 1.0e-24;

/// Zero out values that would otherwise decay into subnormals
#[inline]
pub fn flush_denormal(value: f32) -> f32 {
    if value.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        value
    }
}

/// Shared, immutable coefficient handle
///
/// Replacing a stage's coefficients means installing a new handle; an
/// existing handle is never mutated, so whoever holds one keeps a
/// consistent set.
pub type Coefficients = Arc<BiquadCoeffs>;

/// Convert a linear gain to decibels, floored at [`MINUS_INFINITY_DB`]
pub fn gain_to_decibels(gain: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}

/// Convert decibels to a linear gain
pub fn decibels_to_gain(db: f64) -> f64 {
    if db > MINUS_INFINITY_DB {
        10.0_f64.powf(db / 20.0)
    } else {
        0.0
    }
}

// ============================================================================
// BIQUAD COEFFICIENTS
// ============================================================================

/// Biquad filter coefficients
///
/// Direct Form I implementation for numerical stability.
/// Coefficients are pre-computed to avoid per-sample calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Normalize raw coefficients by `a0`
    fn from_raw(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Peaking EQ section
    ///
    /// Boosts or cuts around `freq`. `gain` is a linear factor, so 1.0
    /// gives a flat response.
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, q: f64, gain: f64) -> Self {
        let a = gain.max(0.0).sqrt();
        let omega = 2.0 * PI * freq / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let c2 = -2.0 * omega.cos();

        Self::from_raw(
            1.0 + alpha * a,
            c2,
            1.0 - alpha * a,
            1.0 + alpha / a,
            c2,
            1.0 - alpha / a,
        )
    }

    /// Second-order low-pass section
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let n = 1.0 / (PI * freq / sample_rate).tan();
        let n_squared = n * n;
        let inv_q = 1.0 / q;
        let c1 = 1.0 / (1.0 + inv_q * n + n_squared);

        Self::from_raw(
            c1,
            c1 * 2.0,
            c1,
            1.0,
            c1 * 2.0 * (1.0 - n_squared),
            c1 * (1.0 - inv_q * n + n_squared),
        )
    }

    /// Second-order high-pass section
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let n = (PI * freq / sample_rate).tan();
        let n_squared = n * n;
        let inv_q = 1.0 / q;
        let c1 = 1.0 / (1.0 + inv_q * n + n_squared);

        Self::from_raw(
            c1,
            c1 * -2.0,
            c1,
            1.0,
            c1 * 2.0 * (n_squared - 1.0),
            c1 * (1.0 - inv_q * n + n_squared),
        )
    }

    /// First-order low-pass, stored with zero second-order terms
    #[must_use]
    pub fn first_order_low_pass(sample_rate: f64, freq: f64) -> Self {
        let n = (PI * freq / sample_rate).tan();
        Self::from_raw(n, n, 0.0, n + 1.0, n - 1.0, 0.0)
    }

    /// First-order high-pass, stored with zero second-order terms
    #[must_use]
    pub fn first_order_high_pass(sample_rate: f64, freq: f64) -> Self {
        let n = (PI * freq / sample_rate).tan();
        Self::from_raw(1.0, -1.0, 0.0, n + 1.0, n - 1.0, 0.0)
    }

    /// Complex response `H(e^{jw})` at `freq`
    pub fn response_at(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;

        let numerator = Complex64::new(self.b0 as f64, 0.0) + z1 * self.b1 as f64 + z2 * self.b2 as f64;
        let denominator = Complex64::new(1.0, 0.0) + z1 * self.a1 as f64 + z2 * self.a2 as f64;

        numerator / denominator
    }

    /// Linear magnitude `|H(e^{jw})|` at `freq`
    pub fn magnitude_for_frequency(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response_at(freq, sample_rate).norm()
    }

    /// All five coefficients are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }

    /// Wrap in a shareable handle
    pub fn into_shared(self) -> Coefficients {
        Arc::new(self)
    }
}

// ============================================================================
// BIQUAD STATE
// ============================================================================

/// Stateful biquad filter using Direct Form I
///
/// Only the history lives here. Coefficients are passed per call because
/// the left and right channels share one coefficient set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadFilter {
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let x = flush_denormal(x);
        let y = flush_denormal(
            coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
                - coeffs.a1 * self.y1
                - coeffs.a2 * self.y2,
        );

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, coeffs: &BiquadCoeffs, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(coeffs, *sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// TESTS
// ============================================================================
