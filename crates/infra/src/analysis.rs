//! Spectrum measurement
//!
//! Feeds a unit impulse through a prepared [`EqProcessor`] and takes the
//! FFT of what comes out. The result is the chain's frequency response as
//! actually processed, which can be checked against the analytic curve the
//! renderer draws.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use thiserror::Error;
use tracing::{debug, info};
use trieq_core::domain::dsp::gain_to_decibels;
use trieq_core::domain::processor::{AudioProcessor, EqProcessor};

/// Smallest FFT accepted by [`measure_impulse_response`]
pub const MIN_FFT_SIZE: usize = 256;

/// Largest FFT accepted by [`measure_impulse_response`]
pub const MAX_FFT_SIZE: usize = 1 << 20;

/// Frequencies reported by `trieq measure`
pub const OCTAVE_POINTS: [f64; 11] = [
    20.0, 31.5, 63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("FFT size {0} must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}")]
    InvalidFftSize(usize),

    #[error("Processor must be prepared before measuring")]
    NotPrepared,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Magnitude spectrum of one impulse response
#[derive(Debug, Clone)]
pub struct Measurement {
    sample_rate: f64,
    fft_size: usize,
    /// Linear magnitude for bins `0..=fft_size / 2`
    bins: Vec<f64>,
}

impl Measurement {
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Width of one bin in Hz
    pub fn resolution(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    /// Linear magnitude at `freq`, interpolated between neighbouring bins
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let position = (freq / self.resolution()).max(0.0);
        let last = self.bins.len() - 1;
        let lower = (position.floor() as usize).min(last);
        let upper = (lower + 1).min(last);
        let frac = position - lower as f64;
        self.bins[lower] + frac.clamp(0.0, 1.0) * (self.bins[upper] - self.bins[lower])
    }

    pub fn decibels_at(&self, freq: f64) -> f64 {
        gain_to_decibels(self.magnitude_at(freq))
    }
}

/// Check that `fft_size` is a power of two within the accepted range
pub fn validate_fft_size(fft_size: usize) -> Result<()> {
    if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        return Err(AnalysisError::InvalidFftSize(fft_size));
    }
    Ok(())
}

/// Measure the left channel of `processor` with an `fft_size`-sample impulse
///
/// Filter history is cleared before and after the measurement, so the
/// processor can be used for audio again straight away.
pub fn measure_impulse_response(processor: &mut EqProcessor, fft_size: usize) -> Result<Measurement> {
    validate_fft_size(fft_size)?;
    let sample_rate = processor.sample_rate().ok_or(AnalysisError::NotPrepared)?;

    let mut impulse = vec![0.0f32; fft_size];
    impulse[0] = 1.0;

    processor.reset();
    processor.process_mono(&mut impulse);
    processor.reset();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut buffer: Vec<Complex<f64>> = impulse.iter().map(|&x| Complex::new(x as f64, 0.0)).collect();
    fft.process(&mut buffer);

    let bins: Vec<f64> = buffer[..=fft_size / 2].iter().map(|c| c.norm()).collect();

    let tail = impulse[fft_size - 1].abs();
    debug!(fft_size, tail, "Impulse response captured");
    info!(fft_size, sample_rate, "Spectrum measured");

    Ok(Measurement {
        sample_rate,
        fft_size,
        bins,
    })
}
