//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod filter_design;
pub mod params;
pub mod processor;
pub mod response;
pub mod settings;
pub mod updater;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, ChannelCount, ProcessSpec, SampleRate, SharedSampleRate, StreamConfig};
pub use chain::{
    ChainConfiguration, ChainPosition, ChannelState, CoefficientSlot, CutFilter, StereoChain,
    CUT_SLOTS,
};
pub use config::{AppConfig, AudioDeviceConfig, ConfigError, ConfigManager, ConfigWatcher, EqConfig, PresetManager};
pub use dsp::{BiquadCoeffs, BiquadFilter, Coefficients};
pub use filter_design::{
    design_iir_highpass_high_order_butterworth, design_iir_lowpass_high_order_butterworth,
    make_high_cut_filter, make_low_cut_filter, make_peak_filter, CutCoefficients,
};
pub use params::{
    ParameterError, ParameterId, ParameterKind, ParameterRange, ParameterSnapshot, ParameterStore,
    Subscription,
};
pub use processor::{AudioProcessor, EqProcessor};
pub use response::{Canvas, Color, DirtyFlag, Point, Rect, ResponseCurve, ResponsePath};
pub use settings::{ChainSettings, Slope};
pub use updater::{
    update_chain, update_coefficients, update_cut_filter, update_high_cut_filter,
    update_low_cut_filter, update_peak_filter,
};
