//! Example demonstrating presets and the response curve
//!
//! Run with: cargo run --package trieq-core --example preset_demo

use trieq_core::domain::{
    ChainSettings, EqConfig, ParameterId, ParameterStore, PresetManager, Rect, ResponseCurve,
    SharedSampleRate, Slope,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("trieq_core=debug,info")
        .init();

    println!("=== trieq Preset Demo ===\n");

    // 1. Factory configuration
    let config = EqConfig::factory_default();
    println!(
        "1. Factory config: {} Hz, {} frames, curve {}x{}",
        config.app.sample_rate, config.app.buffer_size, config.app.curve_width, config.app.curve_height
    );

    // 2. Save and reload a preset
    let preset_dir = std::env::temp_dir().join("trieq_demo_presets");
    let presets = PresetManager::new(preset_dir.clone());
    let vocal = ChainSettings {
        peak_freq: 3000.0,
        peak_gain_in_decibels: 4.5,
        peak_quality: 0.7,
        low_cut_freq: 90.0,
        low_cut_slope: Slope::Slope24,
        ..ChainSettings::default()
    };
    presets.save_preset("vocal", &vocal).await?;
    println!("\n2. Presets on disk: {:?}", presets.list_presets().await?);

    let loaded = presets.load_preset("vocal").await?;
    println!("   Loaded 'vocal': {:?}", loaded);

    // 3. Apply to a store and draw the curve
    let store = ParameterStore::new();
    let mut curve = ResponseCurve::new(
        store.clone(),
        SharedSampleRate::new(config.app.sample_rate as f64),
        Rect::new(0.0, 0.0, 60.0, 24.0),
    );
    loaded.apply_to(&store);
    curve.tick();

    println!("\n3. Response (dB) at every 10th pixel:");
    for (i, db) in curve.magnitudes().iter().enumerate().step_by(10) {
        println!("   px {:>2}: {:>7.2}", i, db);
    }

    // 4. Parameter changes coalesce until the next tick
    store.set(ParameterId::PeakGain, -6.0);
    store.set(ParameterId::PeakGain, -9.0);
    curve.tick();
    println!("\n4. Recomputes so far: {}", curve.recompute_count());

    println!("\n=== Demo Complete ===");

    presets.delete_preset("vocal").await?;
    std::fs::remove_dir_all(preset_dir)?;

    Ok(())
}
