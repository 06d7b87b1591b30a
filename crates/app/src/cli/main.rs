//! trieq CLI Application

mod commands;
mod svg;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trieq_core::domain::{ChainSettings, Slope};

#[derive(Parser)]
#[command(name = "trieq")]
#[command(about = "Three-band parametric equalizer: low cut, peak, high cut", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration directory (default: ~/.config/trieq)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the response curve to an SVG file
    Curve {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Image width in pixels (default from config)
        #[arg(long)]
        width: Option<u32>,

        /// Image height in pixels (default from config)
        #[arg(long)]
        height: Option<u32>,

        /// Sample rate the filters are designed for (default from config)
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Output file
        #[arg(short, long, default_value = "response.svg")]
        output: PathBuf,
    },

    /// Measure the processed impulse response and compare with the analytic curve
    Measure {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Sample rate the processor is prepared with (default from config)
        #[arg(long)]
        sample_rate: Option<u32>,

        /// FFT length in samples, a power of two
        #[arg(long, default_value_t = 16384)]
        fft_size: usize,
    },

    /// Manage presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// List audio devices
    Devices,

    /// Run the equalizer on a live input → output stream
    Run {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Reload the active preset when its file changes
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List saved presets
    List,

    /// Print a preset
    Show {
        name: String,

        /// Print as JSON instead of TOML-style fields
        #[arg(long)]
        json: bool,
    },

    /// Save settings as a preset
    Save {
        name: String,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Delete a preset
    Delete { name: String },
}

/// Equalizer settings; flags override the preset, which overrides the config
#[derive(Args, Debug, Clone, Default)]
struct SettingsArgs {
    /// Start from this preset
    #[arg(long)]
    preset: Option<String>,

    /// Peak center frequency in Hz
    #[arg(long)]
    peak_freq: Option<f32>,

    /// Peak gain in dB
    #[arg(long, allow_negative_numbers = true)]
    peak_gain: Option<f32>,

    /// Peak quality
    #[arg(long)]
    peak_q: Option<f32>,

    /// Low cut frequency in Hz
    #[arg(long)]
    low_cut: Option<f32>,

    /// Low cut slope in dB/Oct (12, 24, 36, 48)
    #[arg(long, value_parser = parse_slope)]
    low_cut_slope: Option<Slope>,

    /// High cut frequency in Hz
    #[arg(long)]
    high_cut: Option<f32>,

    /// High cut slope in dB/Oct (12, 24, 36, 48)
    #[arg(long, value_parser = parse_slope)]
    high_cut_slope: Option<Slope>,

    /// Bypass the low cut band (`--bypass-low-cut=false` re-enables it)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    bypass_low_cut: Option<bool>,

    /// Bypass the peak band (`--bypass-peak=false` re-enables it)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    bypass_peak: Option<bool>,

    /// Bypass the high cut band (`--bypass-high-cut=false` re-enables it)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    bypass_high_cut: Option<bool>,
}

impl SettingsArgs {
    /// Apply the command line overrides on top of `base`
    fn apply(&self, mut base: ChainSettings) -> ChainSettings {
        if let Some(v) = self.peak_freq {
            base.peak_freq = v;
        }
        if let Some(v) = self.peak_gain {
            base.peak_gain_in_decibels = v;
        }
        if let Some(v) = self.peak_q {
            base.peak_quality = v;
        }
        if let Some(v) = self.low_cut {
            base.low_cut_freq = v;
        }
        if let Some(v) = self.low_cut_slope {
            base.low_cut_slope = v;
        }
        if let Some(v) = self.high_cut {
            base.high_cut_freq = v;
        }
        if let Some(v) = self.high_cut_slope {
            base.high_cut_slope = v;
        }
        if let Some(v) = self.bypass_low_cut {
            base.low_cut_bypassed = v;
        }
        if let Some(v) = self.bypass_peak {
            base.peak_bypassed = v;
        }
        if let Some(v) = self.bypass_high_cut {
            base.high_cut_bypassed = v;
        }
        base
    }
}

fn parse_slope(value: &str) -> Result<Slope, String> {
    let lower = value.trim().to_ascii_lowercase();
    let digits = lower
        .trim_end_matches("/oct")
        .trim_end_matches("db")
        .trim();
    digits
        .parse::<u32>()
        .ok()
        .and_then(Slope::from_db_per_octave)
        .ok_or_else(|| format!("slope must be 12, 24, 36 or 48, got {value:?}"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("trieq starting");

    let ctx = commands::Context::load(cli.config_dir).await?;

    match cli.command {
        Command::Curve {
            settings,
            width,
            height,
            sample_rate,
            output,
        } => {
            let settings = ctx.resolve_settings(&settings).await?;
            commands::curve(&ctx, settings, width, height, sample_rate, &output).await
        }
        Command::Measure {
            settings,
            sample_rate,
            fft_size,
        } => {
            let settings = ctx.resolve_settings(&settings).await?;
            commands::measure(&ctx, settings, sample_rate, fft_size)
        }
        Command::Presets { action } => match action {
            PresetAction::List => commands::list_presets(&ctx).await,
            PresetAction::Show { name, json } => commands::show_preset(&ctx, &name, json).await,
            PresetAction::Save { name, settings } => {
                let settings = ctx.resolve_settings(&settings).await?;
                commands::save_preset(&ctx, &name, &settings).await
            }
            PresetAction::Delete { name } => commands::delete_preset(&ctx, &name).await,
        },
        Command::Devices => commands::devices(),
        Command::Run { settings, watch } => commands::run(&ctx, &settings, watch).await,
    }
}
