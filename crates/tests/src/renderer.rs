//! Response curve against the live processor

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use trieq_core::domain::dsp::gain_to_decibels;
use trieq_core::domain::response::{decibels_to_y, frequency_for_pixel};
use trieq_core::domain::{
    AudioProcessor, ChainSettings, EqProcessor, ParameterId, ParameterStore, ProcessSpec, Rect,
    ResponseCurve, SharedSampleRate, Slope,
};

const SAMPLE_RATE: f64 = 48000.0;

fn bounds(width: f32) -> Rect {
    Rect::new(0.0, 0.0, width, 200.0)
}

#[test]
fn test_burst_of_changes_recomputes_once() {
    let store = ParameterStore::new();
    let mut curve = ResponseCurve::new(
        Arc::clone(&store),
        SharedSampleRate::new(SAMPLE_RATE),
        bounds(300.0),
    );
    assert!(curve.tick());
    let before = curve.recompute_count();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..=48 {
                store.set(ParameterId::PeakGain, i as f32 * 0.5 - 12.0);
            }
        })
    };
    writer.join().unwrap();

    assert!(curve.tick());
    assert!(!curve.tick());
    assert_eq!(curve.recompute_count(), before + 1);

    // Last write was +12 dB at the default 750 Hz peak
    let peak = curve.magnitudes().iter().copied().fold(f64::MIN, f64::max);
    assert!((peak - 12.0).abs() < 0.2, "peak {peak} dB");
}

#[test]
fn test_curve_matches_live_processor_chain() {
    let settings = ChainSettings {
        peak_freq: 2500.0,
        peak_gain_in_decibels: -9.0,
        peak_quality: 2.0,
        low_cut_freq: 120.0,
        low_cut_slope: Slope::Slope36,
        high_cut_freq: 9000.0,
        high_cut_slope: Slope::Slope24,
        ..ChainSettings::default()
    };
    let store = ParameterStore::from_snapshot(&settings.to_snapshot());

    let mut eq = EqProcessor::new(Arc::clone(&store));
    let mut curve = ResponseCurve::new(
        Arc::clone(&store),
        eq.sample_rate_handle(),
        bounds(400.0),
    );
    eq.prepare(ProcessSpec {
        sample_rate: SAMPLE_RATE,
        maximum_block_size: 256,
        num_channels: 2,
    })
    .unwrap();
    assert!(curve.tick());

    let live = eq.chain_configuration().unwrap();
    let width = curve.magnitudes().len();
    assert_eq!(width, 400);
    for (i, &db) in curve.magnitudes().iter().enumerate() {
        let freq = frequency_for_pixel(i, width);
        let expected = gain_to_decibels(live.magnitude_for_frequency(freq, SAMPLE_RATE));
        assert!((db - expected).abs() < 1e-9, "pixel {i} ({freq} Hz): {db} vs {expected}");
    }
}

#[test]
fn test_curve_follows_processor_sample_rate() {
    let store = ParameterStore::new();
    store.set(ParameterId::HighCutFreq, 5000.0);

    let mut eq = EqProcessor::new(Arc::clone(&store));
    let mut curve = ResponseCurve::new(Arc::clone(&store), eq.sample_rate_handle(), bounds(100.0));
    assert!(curve.tick());
    assert!(!curve.tick());

    // Preparing publishes a rate, which alone forces a redraw
    eq.prepare(ProcessSpec {
        sample_rate: 96000.0,
        maximum_block_size: 128,
        num_channels: 2,
    })
    .unwrap();
    assert!(curve.tick());
    assert_eq!(curve.recompute_count(), 2);
}

#[test]
fn test_neutral_curve_sits_on_center_line() {
    let store = ParameterStore::new();
    store.set(ParameterId::LowCutBypassed, 1.0);
    store.set(ParameterId::HighCutBypassed, 1.0);

    let area = bounds(120.0);
    let mut curve = ResponseCurve::new(store, SharedSampleRate::new(SAMPLE_RATE), area);
    curve.tick();

    let center = decibels_to_y(0.0, &area);
    assert_eq!(center, 100.0);
    for point in curve.path().points() {
        assert!((point.y - center).abs() < 1e-3, "y {} off center", point.y);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_any_number_of_changes_costs_one_recompute(
        gains in prop::collection::vec(-24.0f32..24.0, 1..40),
    ) {
        let store = ParameterStore::new();
        let mut curve = ResponseCurve::new(
            Arc::clone(&store),
            SharedSampleRate::new(SAMPLE_RATE),
            bounds(64.0),
        );
        curve.tick();
        let before = curve.recompute_count();

        for &gain in &gains {
            store.set(ParameterId::PeakGain, gain);
        }
        curve.tick();
        curve.tick();

        // Snapping may turn every write into a no-op, in which case nothing is redrawn
        let changed = gains
            .iter()
            .any(|&g| ParameterId::PeakGain.range().snap_to_legal_value(g) != 0.0);
        let expected = before + u64::from(changed);
        prop_assert_eq!(curve.recompute_count(), expected);
    }
}
