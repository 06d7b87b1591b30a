//! Cross-thread tests
//!
//! A writer keeps replacing coefficients while readers look at them. Every
//! value a reader sees must be exactly one of the sets that were written:
//! never a mix of two.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use trieq_core::domain::{
    update_chain, AudioProcessor, BiquadCoeffs, ChainConfiguration, ChainSettings, CoefficientSlot,
    EqProcessor, ParameterId, ParameterStore, ProcessSpec, ResponseCurve, Rect, SharedSampleRate,
    Slope,
};

const SAMPLE_RATE: f64 = 48000.0;
const WRITES: usize = 20_000;
const READERS: usize = 4;

#[test]
fn test_slot_readers_never_see_torn_coefficients() {
    let a = BiquadCoeffs::peaking(SAMPLE_RATE, 500.0, 0.7, 2.0).into_shared();
    let b = BiquadCoeffs::high_pass(SAMPLE_RATE, 8000.0, 1.3).into_shared();
    assert_ne!(*a, *b);

    let slot = Arc::new(CoefficientSlot::new(Arc::clone(&a), false));
    let done = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(READERS + 1));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let slot = Arc::clone(&slot);
            let done = Arc::clone(&done);
            let start = Arc::clone(&start);
            let (a, b) = (*a, *b);
            thread::spawn(move || {
                start.wait();
                let mut reads = 0u64;
                loop {
                    let seen = slot.read();
                    assert!(seen == a || seen == b, "torn read: {seen:?}");
                    reads += 1;
                    if done.load(Ordering::Acquire) {
                        break reads;
                    }
                }
            })
        })
        .collect();

    start.wait();
    for i in 0..WRITES {
        let next = if i % 2 == 0 { &b } else { &a };
        slot.replace(next);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_chain_resolve_sees_whole_sections() {
    let soft = ChainSettings {
        peak_freq: 300.0,
        peak_gain_in_decibels: -4.0,
        low_cut_slope: Slope::Slope24,
        ..ChainSettings::default()
    };
    let hard = ChainSettings {
        peak_freq: 5000.0,
        peak_gain_in_decibels: 10.0,
        low_cut_slope: Slope::Slope24,
        low_cut_freq: 150.0,
        ..ChainSettings::default()
    };

    // Reference sections for both settings, from a private chain
    let reference = ChainConfiguration::new();
    update_chain(&reference, &soft, SAMPLE_RATE);
    let soft_stages: Vec<BiquadCoeffs> = reference.resolve().iter().map(|(_, c)| *c).collect();
    update_chain(&reference, &hard, SAMPLE_RATE);
    let hard_stages: Vec<BiquadCoeffs> = reference.resolve().iter().map(|(_, c)| *c).collect();
    assert_eq!(soft_stages.len(), hard_stages.len());

    let chain = Arc::new(ChainConfiguration::new());
    update_chain(&chain, &soft, SAMPLE_RATE);
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let chain = Arc::clone(&chain);
            let done = Arc::clone(&done);
            let soft_stages = soft_stages.clone();
            let hard_stages = hard_stages.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let active = chain.resolve();
                    assert_eq!(active.len(), soft_stages.len());
                    for (i, (_, coeffs)) in active.iter().enumerate() {
                        assert!(
                            *coeffs == soft_stages[i] || *coeffs == hard_stages[i],
                            "stage {i} holds a value that was never written"
                        );
                    }
                }
            })
        })
        .collect();

    for i in 0..WRITES / 10 {
        let settings = if i % 2 == 0 { &hard } else { &soft };
        update_chain(&chain, settings, SAMPLE_RATE);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_processing_while_parameters_change() {
    let store = ParameterStore::new();
    let mut eq = EqProcessor::new(Arc::clone(&store));
    eq.prepare(ProcessSpec {
        sample_rate: SAMPLE_RATE,
        maximum_block_size: 256,
        num_channels: 2,
    })
    .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut i = 0u32;
            while !done.load(Ordering::Acquire) {
                store.set(ParameterId::PeakGain, (i % 49) as f32 - 24.0);
                store.set(ParameterId::LowCutSlope, (i % 4) as f32);
                store.set(ParameterId::HighCutFreq, 1000.0 + (i % 19000) as f32);
                i = i.wrapping_add(1);
            }
        })
    };

    let mut data: Vec<f32> = (0..512).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
    for _ in 0..2000 {
        eq.process_interleaved(&mut data, 2);
        assert!(data.iter().all(|s| s.is_finite()));
    }

    done.store(true, Ordering::Release);
    writer.join().unwrap();
}

#[test]
fn test_listener_fires_from_writer_thread() {
    let store = ParameterStore::new();
    let mut curve = ResponseCurve::new(
        Arc::clone(&store),
        SharedSampleRate::new(SAMPLE_RATE),
        Rect::new(0.0, 0.0, 200.0, 100.0),
    );
    curve.tick();
    assert!(!curve.is_dirty());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            store.set(ParameterId::PeakQuality, 4.0);
        })
    };
    writer.join().unwrap();

    assert!(curve.is_dirty());
    assert!(curve.tick());
}
