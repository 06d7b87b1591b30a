//! Subcommand implementations

use crate::svg::SvgCanvas;
use crate::SettingsArgs;
use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use trieq_core::domain::dsp::gain_to_decibels;
use trieq_core::domain::{
    update_chain, AudioProcessor, ChainConfiguration, ChainSettings, ConfigManager, ConfigWatcher,
    EqConfig, EqProcessor, ParameterStore, PresetManager, ProcessSpec, Rect, ResponseCurve,
    SharedSampleRate,
};
use trieq_infra::analysis::{measure_impulse_response, validate_fft_size, OCTAVE_POINTS};
use trieq_infra::audio::{device_names, Direction, EqStream};

/// UI refresh rate of the live response curve
const UI_REFRESH_HZ: f64 = 60.0;

/// Loaded configuration shared by all subcommands
pub struct Context {
    pub config: EqConfig,
    pub presets: PresetManager,
}

impl Context {
    pub async fn load(config_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => ConfigManager::default_config_dir()?,
        };

        let manager = ConfigManager::new(config_dir);
        let config = manager.load().await;
        let presets = PresetManager::new(manager.preset_dir(&config));

        Ok(Self { config, presets })
    }

    /// Config settings, replaced by `--preset` if given, then flag overrides
    pub async fn resolve_settings(&self, args: &SettingsArgs) -> anyhow::Result<ChainSettings> {
        let base = match &args.preset {
            Some(name) => self
                .presets
                .load_preset(name)
                .await
                .with_context(|| format!("loading preset {name:?}"))?,
            None => self.config.settings,
        };
        Ok(args.apply(base))
    }
}

fn sample_rate_or_default(ctx: &Context, sample_rate: Option<u32>) -> f64 {
    sample_rate.unwrap_or(ctx.config.app.sample_rate) as f64
}

pub async fn curve(
    ctx: &Context,
    settings: ChainSettings,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<u32>,
    output: &Path,
) -> anyhow::Result<()> {
    let width = width.unwrap_or(ctx.config.app.curve_width);
    let height = height.unwrap_or(ctx.config.app.curve_height);
    anyhow::ensure!(width > 0 && height > 0, "curve size {width}x{height} is empty");
    let sample_rate = sample_rate_or_default(ctx, sample_rate);

    let store = ParameterStore::from_snapshot(&settings.to_snapshot());
    let mut curve = ResponseCurve::new(
        store,
        SharedSampleRate::new(sample_rate),
        Rect::new(0.0, 0.0, width as f32, height as f32),
    );
    curve.tick();

    let mut canvas = SvgCanvas::new(width, height);
    curve.paint(&mut canvas);
    tokio::fs::write(output, canvas.finish())
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    let (min_db, max_db) = db_range(curve.magnitudes());
    println!(
        "Wrote {} ({}x{}, {:.1} dB .. {:+.1} dB)",
        output.display(),
        width,
        height,
        min_db,
        max_db
    );
    Ok(())
}

fn db_range(magnitudes: &[f64]) -> (f64, f64) {
    magnitudes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &db| (lo.min(db), hi.max(db)))
}

pub fn measure(
    ctx: &Context,
    settings: ChainSettings,
    sample_rate: Option<u32>,
    fft_size: usize,
) -> anyhow::Result<()> {
    validate_fft_size(fft_size)?;
    let sample_rate = sample_rate_or_default(ctx, sample_rate);
    let store = ParameterStore::from_snapshot(&settings.to_snapshot());

    let mut processor = EqProcessor::new(store);
    processor.prepare(ProcessSpec {
        sample_rate,
        maximum_block_size: u32::try_from(fft_size)
            .with_context(|| format!("FFT size {fft_size} does not fit a block"))?,
        num_channels: 2,
    })?;
    let measurement = measure_impulse_response(&mut processor, fft_size)?;

    let analytic = ChainConfiguration::new();
    update_chain(&analytic, &settings, sample_rate);

    println!(
        "FFT {} @ {} Hz ({:.2} Hz/bin)",
        fft_size,
        sample_rate,
        measurement.resolution()
    );
    println!("{:>10}  {:>10}  {:>10}  {:>8}", "Hz", "measured", "analytic", "diff");
    for freq in OCTAVE_POINTS.iter().copied().filter(|&f| f < sample_rate / 2.0) {
        let measured = measurement.decibels_at(freq);
        let expected = gain_to_decibels(analytic.magnitude_for_frequency(freq, sample_rate));
        println!(
            "{:>10.1}  {:>+10.2}  {:>+10.2}  {:>+8.3}",
            freq,
            measured,
            expected,
            measured - expected
        );
    }
    Ok(())
}

pub async fn list_presets(ctx: &Context) -> anyhow::Result<()> {
    let presets = ctx.presets.list_presets().await?;
    if presets.is_empty() {
        println!("No presets in {}", ctx.presets.preset_dir().display());
    }
    for name in presets {
        println!("{name}");
    }
    Ok(())
}

pub async fn show_preset(ctx: &Context, name: &str, json: bool) -> anyhow::Result<()> {
    let settings = ctx.presets.load_preset(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("{name}");
    println!("  peak       {:.0} Hz, {:+.1} dB, Q {:.2}{}", settings.peak_freq, settings.peak_gain_in_decibels, settings.peak_quality, bypassed(settings.peak_bypassed));
    println!("  low cut    {:.0} Hz, {}{}", settings.low_cut_freq, settings.low_cut_slope, bypassed(settings.low_cut_bypassed));
    println!("  high cut   {:.0} Hz, {}{}", settings.high_cut_freq, settings.high_cut_slope, bypassed(settings.high_cut_bypassed));
    Ok(())
}

fn bypassed(flag: bool) -> &'static str {
    if flag {
        " (bypassed)"
    } else {
        ""
    }
}

pub async fn save_preset(ctx: &Context, name: &str, settings: &ChainSettings) -> anyhow::Result<()> {
    ctx.presets.save_preset(name, settings).await?;
    println!("Saved preset {name}");
    Ok(())
}

pub async fn delete_preset(ctx: &Context, name: &str) -> anyhow::Result<()> {
    ctx.presets.delete_preset(name).await?;
    println!("Deleted preset {name}");
    Ok(())
}

pub fn devices() -> anyhow::Result<()> {
    for direction in [Direction::Input, Direction::Output] {
        println!("{direction} devices:");
        for name in device_names(direction)? {
            println!("  {name}");
        }
    }
    Ok(())
}

async fn next_preset_change(
    events: &mut Option<broadcast::Receiver<PathBuf>>,
) -> Result<PathBuf, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

pub async fn run(ctx: &Context, args: &SettingsArgs, watch: bool) -> anyhow::Result<()> {
    let settings = ctx.resolve_settings(args).await?;
    let store = ParameterStore::from_snapshot(&settings.to_snapshot());

    let stream = EqStream::open(
        EqProcessor::new(Arc::clone(&store)),
        &ctx.config.stream_config(),
        ctx.config.audio.input(),
        ctx.config.audio.output(),
    )?;

    let mut curve = ResponseCurve::new(
        Arc::clone(&store),
        stream.sample_rate(),
        Rect::new(
            0.0,
            0.0,
            ctx.config.app.curve_width as f32,
            ctx.config.app.curve_height as f32,
        ),
    );

    let watcher = if watch {
        Some(ConfigWatcher::new(ctx.presets.preset_dir().to_path_buf()).await?)
    } else {
        None
    };
    let mut preset_events = watcher.as_ref().map(ConfigWatcher::subscribe);
    let mut active_preset = args.preset.clone();

    let mut ui_timer = interval(Duration::from_secs_f64(1.0 / UI_REFRESH_HZ));
    ui_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_timer = interval(Duration::from_secs(10));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        input = stream.input_name(),
        output = stream.output_name(),
        "Equalizer running, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = ui_timer.tick() => {
                if curve.tick() {
                    let (min_db, max_db) = db_range(curve.magnitudes());
                    debug!(min_db, max_db, "Response curve refreshed");
                }
            }
            _ = stats_timer.tick() => {
                let stats = stream.stats();
                debug!(overruns = stats.overruns, underruns = stats.underruns, "Stream stats");
            }
            event = next_preset_change(&mut preset_events) => match event {
                Ok(path) => {
                    let Some(name) = PresetManager::preset_name(&path) else { continue };
                    if active_preset.as_deref().is_some_and(|active| active != name) {
                        continue;
                    }
                    match PresetManager::load_preset_file(&path).await {
                        Ok(loaded) => {
                            args.apply(loaded).apply_to(&store);
                            info!(preset = %name, "Preset reloaded");
                            active_preset = Some(name);
                        }
                        // Editors often write in several steps; the next event retries.
                        Err(e) => warn!(preset = %name, error = %e, "Failed to reload preset"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed preset change events"),
                Err(RecvError::Closed) => preset_events = None,
            },
            _ = &mut ctrl_c => {
                info!("Stopping equalizer");
                break;
            }
        }
    }

    drop(stream);
    Ok(())
}
