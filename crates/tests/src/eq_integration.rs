//! End-to-end tests for the equalizer
//!
//! These tests drive the whole path: parameter store → settings → factory →
//! updater → chain, and check the result three ways: by processing audio,
//! by measuring an impulse response, and against the drawn curve.

use std::sync::Arc;
use trieq_core::domain::dsp::gain_to_decibels;
use trieq_core::domain::response::frequency_for_pixel;
use trieq_core::domain::{
    update_chain, AudioProcessor, ChainConfiguration, ChainSettings, EqProcessor, ParameterId,
    ParameterStore, PresetManager, ProcessSpec, Rect, ResponseCurve, SharedSampleRate, Slope,
};
use trieq_infra::analysis::{measure_impulse_response, OCTAVE_POINTS};

const SAMPLE_RATE: f64 = 44100.0;

/// peak 1000 Hz, +6 dB, Q 1; low cut 20 Hz / 12; high cut 20 kHz / 12
fn reference_settings() -> ChainSettings {
    ChainSettings {
        peak_freq: 1000.0,
        peak_gain_in_decibels: 6.0,
        peak_quality: 1.0,
        low_cut_freq: 20.0,
        high_cut_freq: 20000.0,
        low_cut_slope: Slope::Slope12,
        high_cut_slope: Slope::Slope12,
        ..ChainSettings::default()
    }
}

fn prepared_processor(store: Arc<ParameterStore>, sample_rate: f64) -> EqProcessor {
    let mut eq = EqProcessor::new(store);
    eq.prepare(ProcessSpec {
        sample_rate,
        maximum_block_size: 512,
        num_channels: 2,
    })
    .unwrap();
    eq
}

fn generate_sine_wave(frequency: f32, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin() * 0.25)
        .collect()
}

fn rms(buffer: &[f32]) -> f32 {
    (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
}

// ============================================================================
// RESPONSE CURVE
// ============================================================================

#[test]
fn test_reference_curve_peaks_near_one_khz() {
    let store = ParameterStore::from_snapshot(&reference_settings().to_snapshot());
    let width = 800;
    let mut curve = ResponseCurve::new(
        store,
        SharedSampleRate::new(SAMPLE_RATE),
        Rect::new(0.0, 0.0, width as f32, 300.0),
    );
    assert!(curve.tick());

    let magnitudes = curve.magnitudes();
    let (peak_index, peak_db) = magnitudes
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, db)| if db > best.1 { (i, db) } else { best });

    let peak_freq = frequency_for_pixel(peak_index, width);
    assert!((peak_db - 6.0).abs() < 0.1, "peak {peak_db} dB");
    assert!((900.0..1100.0).contains(&peak_freq), "peak at {peak_freq} Hz");
}

#[test]
fn test_reference_curve_flat_toward_edges() {
    // Both cuts sit exactly at the band edges, where a Butterworth is -3 dB
    // by construction; one octave inside, the response is back near 0 dB.
    let chain = ChainConfiguration::new();
    update_chain(&chain, &reference_settings(), SAMPLE_RATE);

    for freq in [40.0, 10000.0] {
        let db = gain_to_decibels(chain.magnitude_for_frequency(freq, SAMPLE_RATE));
        assert!(db.abs() < 1.0, "{freq} Hz: {db} dB");
    }
    for freq in [20.0, 20000.0] {
        let db = gain_to_decibels(chain.magnitude_for_frequency(freq, SAMPLE_RATE));
        assert!((db + 3.0).abs() < 0.5, "{freq} Hz corner: {db} dB");
    }
}

#[test]
fn test_flat_when_everything_neutral() {
    let settings = ChainSettings {
        peak_gain_in_decibels: 0.0,
        low_cut_bypassed: true,
        high_cut_bypassed: true,
        ..reference_settings()
    };
    let chain = ChainConfiguration::new();
    update_chain(&chain, &settings, SAMPLE_RATE);

    for i in 0..100 {
        let freq = frequency_for_pixel(i, 100);
        let db = gain_to_decibels(chain.magnitude_for_frequency(freq, SAMPLE_RATE));
        assert!(db.abs() < 0.01, "{freq} Hz: {db} dB");
    }
}

// ============================================================================
// AUDIO PROCESSING
// ============================================================================

#[test]
fn test_sine_at_peak_is_boosted_six_db() {
    let store = ParameterStore::from_snapshot(&reference_settings().to_snapshot());
    let mut eq = prepared_processor(store, SAMPLE_RATE);

    let input = generate_sine_wave(1000.0, SAMPLE_RATE, 22050);
    let mut left = input.clone();
    let mut right = input.clone();
    for (l, r) in left.chunks_mut(512).zip(right.chunks_mut(512)) {
        eq.process_stereo(l, r);
    }

    let gain_db = 20.0 * (rms(&left[11025..]) / rms(&input[11025..])).log10();
    assert!((gain_db - 6.0).abs() < 0.1, "gain {gain_db} dB");
    assert_eq!(left, right);
}

#[test]
fn test_interleaved_channels_match_split_processing() {
    let store = ParameterStore::from_snapshot(&reference_settings().to_snapshot());
    let mut split = prepared_processor(Arc::clone(&store), SAMPLE_RATE);
    let mut interleaved = prepared_processor(store, SAMPLE_RATE);

    let left_in = generate_sine_wave(440.0, SAMPLE_RATE, 1024);
    let right_in = generate_sine_wave(3000.0, SAMPLE_RATE, 1024);

    let mut left = left_in.clone();
    let mut right = right_in.clone();
    split.process_stereo(&mut left, &mut right);

    let mut frames: Vec<f32> = left_in
        .iter()
        .zip(&right_in)
        .flat_map(|(&l, &r)| [l, r])
        .collect();
    interleaved.process_interleaved(&mut frames, 2);

    for (i, frame) in frames.chunks(2).enumerate() {
        assert_eq!(frame[0], left[i]);
        assert_eq!(frame[1], right[i]);
    }
}

#[test]
fn test_steep_low_cut_attenuates_rumble() {
    let settings = ChainSettings {
        low_cut_freq: 200.0,
        low_cut_slope: Slope::Slope48,
        peak_gain_in_decibels: 0.0,
        ..reference_settings()
    };
    let store = ParameterStore::from_snapshot(&settings.to_snapshot());
    let mut eq = prepared_processor(store, SAMPLE_RATE);

    let input = generate_sine_wave(50.0, SAMPLE_RATE, 44100);
    let mut output = input.clone();
    eq.process_mono(&mut output);

    // Two octaves below an 8th order corner is ~96 dB down analytically;
    // f32 rounding noise in the cascade sets the practical floor.
    let gain_db = 20.0 * (rms(&output[22050..]) / rms(&input[22050..])).log10();
    assert!(gain_db < -60.0, "gain {gain_db} dB");
}

#[test]
fn test_parameter_automation_mid_stream() {
    let store = ParameterStore::from_snapshot(&reference_settings().to_snapshot());
    let mut eq = prepared_processor(Arc::clone(&store), SAMPLE_RATE);

    let mut block = generate_sine_wave(1000.0, SAMPLE_RATE, 512);
    eq.process_mono(&mut block);

    store.set(ParameterId::PeakGain, -12.0);
    store.set(ParameterId::HighCutSlope, 3.0);

    let mut block = generate_sine_wave(1000.0, SAMPLE_RATE, 512);
    eq.process_mono(&mut block);

    let applied = eq.applied_settings().unwrap();
    assert_eq!(applied.peak_gain_in_decibels, -12.0);
    assert_eq!(applied.high_cut_slope, Slope::Slope48);
    assert!(block.iter().all(|s| s.is_finite()));
}

// ============================================================================
// MEASUREMENT
// ============================================================================

#[test]
fn test_measured_spectrum_matches_analytic_curve() {
    for slope in [Slope::Slope12, Slope::Slope36] {
        let settings = ChainSettings {
            low_cut_freq: 80.0,
            high_cut_freq: 12000.0,
            low_cut_slope: slope,
            high_cut_slope: slope,
            ..reference_settings()
        };
        let store = ParameterStore::from_snapshot(&settings.to_snapshot());
        let mut eq = prepared_processor(store, SAMPLE_RATE);
        let measurement = measure_impulse_response(&mut eq, 32768).unwrap();

        let analytic = ChainConfiguration::new();
        update_chain(&analytic, &settings, SAMPLE_RATE);

        for freq in OCTAVE_POINTS {
            let expected = gain_to_decibels(analytic.magnitude_for_frequency(freq, SAMPLE_RATE));
            if expected < -40.0 {
                continue;
            }
            let measured = measurement.decibels_at(freq);
            assert!(
                (measured - expected).abs() < 0.25,
                "{slope} at {freq} Hz: measured {measured}, analytic {expected}"
            );
        }
    }
}

// ============================================================================
// PRESETS
// ============================================================================

#[tokio::test]
async fn test_preset_round_trip_drives_processor() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let presets = PresetManager::new(temp_dir.path().to_path_buf());
    presets.save_preset("reference", &reference_settings()).await.unwrap();

    let store = ParameterStore::new();
    let mut eq = prepared_processor(Arc::clone(&store), SAMPLE_RATE);

    presets.load_preset("reference").await.unwrap().apply_to(&store);
    assert!(eq.update_filters());
    assert_eq!(eq.applied_settings(), Some(reference_settings()));
}
