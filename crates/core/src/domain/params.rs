//! Parameter store feeding the equalizer
//!
//! The store owns one atomic value per parameter so the audio thread can
//! take a snapshot without locking. Writers (host automation, a control
//! surface, a preset load) go through [`ParameterStore::set`], which clamps
//! and snaps the value to the parameter's range and then notifies every
//! subscribed listener on the writer's thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors raised when addressing parameters by name
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

pub type Result<T> = std::result::Result<T, ParameterError>;

/// Every parameter the equalizer exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
    LowCutBypassed,
    PeakBypassed,
    HighCutBypassed,
}

impl ParameterId {
    pub const COUNT: usize = 10;

    pub const ALL: [ParameterId; Self::COUNT] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQuality,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
        ParameterId::LowCutBypassed,
        ParameterId::PeakBypassed,
        ParameterId::HighCutBypassed,
    ];

    /// Position in [`ParameterId::ALL`] and in snapshot storage
    pub fn index(self) -> usize {
        self as usize
    }

    /// Host-facing parameter name
    pub fn name(self) -> &'static str {
        match self {
            ParameterId::LowCutFreq => "LowCut Freq",
            ParameterId::HighCutFreq => "HighCut Freq",
            ParameterId::PeakFreq => "Peak Freq",
            ParameterId::PeakGain => "Peak Gain",
            ParameterId::PeakQuality => "Peak Quality",
            ParameterId::LowCutSlope => "LowCut Slope",
            ParameterId::HighCutSlope => "HighCut Slope",
            ParameterId::LowCutBypassed => "LowCut Bypassed",
            ParameterId::PeakBypassed => "Peak Bypassed",
            ParameterId::HighCutBypassed => "HighCut Bypassed",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParameterError::UnknownParameter(name.to_string()))
    }

    /// Unit label shown next to the value
    pub fn unit(self) -> &'static str {
        match self {
            ParameterId::LowCutFreq | ParameterId::HighCutFreq | ParameterId::PeakFreq => "Hz",
            ParameterId::PeakGain => "dB",
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => "dB/Oct",
            _ => "",
        }
    }

    pub fn kind(self) -> ParameterKind {
        const SLOPE_CHOICES: &[&str] = &["12 db/Oct", "24 db/Oct", "36 db/Oct", "48 db/Oct"];

        match self {
            ParameterId::LowCutFreq => ParameterKind::Float {
                range: ParameterRange::new(20.0, 20000.0, 1.0, 0.25),
                default: 20.0,
            },
            ParameterId::HighCutFreq => ParameterKind::Float {
                range: ParameterRange::new(20.0, 20000.0, 1.0, 0.25),
                default: 20000.0,
            },
            ParameterId::PeakFreq => ParameterKind::Float {
                range: ParameterRange::new(20.0, 20000.0, 1.0, 0.25),
                default: 750.0,
            },
            ParameterId::PeakGain => ParameterKind::Float {
                range: ParameterRange::new(-24.0, 24.0, 0.5, 1.0),
                default: 0.0,
            },
            ParameterId::PeakQuality => ParameterKind::Float {
                range: ParameterRange::new(0.1, 10.0, 0.05, 1.0),
                default: 1.0,
            },
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => ParameterKind::Choice {
                choices: SLOPE_CHOICES,
                default: 0,
            },
            ParameterId::LowCutBypassed
            | ParameterId::PeakBypassed
            | ParameterId::HighCutBypassed => ParameterKind::Bool { default: false },
        }
    }

    pub fn range(self) -> ParameterRange {
        self.kind().range()
    }

    pub fn default_value(self) -> f32 {
        self.kind().default_value()
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of a parameter's value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterKind {
    Float { range: ParameterRange, default: f32 },
    Choice { choices: &'static [&'static str], default: usize },
    Bool { default: bool },
}

impl ParameterKind {
    pub fn range(&self) -> ParameterRange {
        match self {
            ParameterKind::Float { range, .. } => *range,
            ParameterKind::Choice { choices, .. } => {
                ParameterRange::new(0.0, choices.len().saturating_sub(1) as f32, 1.0, 1.0)
            }
            ParameterKind::Bool { .. } => ParameterRange::new(0.0, 1.0, 1.0, 1.0),
        }
    }

    pub fn default_value(&self) -> f32 {
        match self {
            ParameterKind::Float { default, .. } => *default,
            ParameterKind::Choice { default, .. } => *default as f32,
            ParameterKind::Bool { default } => {
                if *default {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Value range with step size and skew, as hosts expect it
///
/// A skew below 1 spends more of the normalized 0..1 travel on the low end
/// of the range, which is what a frequency knob wants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub start: f32,
    pub end: f32,
    pub interval: f32,
    pub skew: f32,
}

impl ParameterRange {
    pub const fn new(start: f32, end: f32, interval: f32, skew: f32) -> Self {
        Self {
            start,
            end,
            interval,
            skew,
        }
    }

    /// Map a normalized position to a value in the range
    pub fn convert_from_0_to_1(&self, proportion: f32) -> f32 {
        let mut proportion = proportion.clamp(0.0, 1.0);
        if self.skew != 1.0 && proportion > 0.0 {
            proportion = (proportion.ln() / self.skew).exp();
        }
        self.start + (self.end - self.start) * proportion
    }

    /// Map a value in the range to its normalized position
    pub fn convert_to_0_to_1(&self, value: f32) -> f32 {
        let proportion = ((value - self.start) / (self.end - self.start)).clamp(0.0, 1.0);
        if self.skew == 1.0 {
            proportion
        } else {
            proportion.powf(self.skew)
        }
    }

    /// Clamp to the range and round to the nearest step
    pub fn snap_to_legal_value(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.start;
        }
        // Stepping in f64 keeps decimal steps like 0.05 landing on the
        // nearest f32 instead of accumulating error.
        let value = if self.interval > 0.0 {
            let start = self.start as f64;
            let interval = self.interval as f64;
            (start + interval * ((value as f64 - start) / interval).round()) as f32
        } else {
            value
        };
        value.clamp(self.start, self.end)
    }
}

/// Values of every parameter at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    values: [f32; ParameterId::COUNT],
}

impl ParameterSnapshot {
    pub fn get(&self, id: ParameterId) -> f32 {
        self.values[id.index()]
    }

    pub fn with(mut self, id: ParameterId, value: f32) -> Self {
        self.values[id.index()] = id.range().snap_to_legal_value(value);
        self
    }
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        let mut values = [0.0; ParameterId::COUNT];
        for id in ParameterId::ALL {
            values[id.index()] = id.default_value();
        }
        Self { values }
    }
}

type ListenerFn = dyn Fn(ParameterId, f32) + Send + Sync;

struct Listener {
    id: u64,
    callback: Arc<ListenerFn>,
}

/// Lock-free parameter values with change notification
pub struct ParameterStore {
    values: [AtomicU32; ParameterId::COUNT],
    listeners: Mutex<Vec<Listener>>,
    next_listener_id: AtomicU64,
}

impl ParameterStore {
    /// Create a store holding every parameter's default
    pub fn new() -> Arc<Self> {
        Self::from_snapshot(&ParameterSnapshot::default())
    }

    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Arc<Self> {
        Arc::new(Self {
            values: std::array::from_fn(|i| AtomicU32::new(snapshot.values[i].to_bits())),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    /// Current plain value of a parameter
    ///
    /// Safe to call from the audio thread.
    #[inline]
    pub fn get(&self, id: ParameterId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Acquire))
    }

    /// Current value mapped to 0..1
    pub fn get_normalized(&self, id: ParameterId) -> f32 {
        id.range().convert_to_0_to_1(self.get(id))
    }

    /// Read every parameter
    ///
    /// Each value is read atomically; the set as a whole is not, which is
    /// fine because a change racing with the snapshot marks the response
    /// curve dirty again and is picked up by the next audio block.
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            values: std::array::from_fn(|i| f32::from_bits(self.values[i].load(Ordering::Acquire))),
        }
    }

    /// Set a plain value, clamped and snapped to the parameter's range
    ///
    /// Listeners run on the calling thread, and only when the stored value
    /// actually changed. Returns the value that was stored.
    pub fn set(&self, id: ParameterId, value: f32) -> f32 {
        let legal = id.range().snap_to_legal_value(value);
        if legal != value {
            trace!(parameter = %id, requested = value, stored = legal, "Parameter value clamped");
        }

        let previous = self.values[id.index()].swap(legal.to_bits(), Ordering::AcqRel);
        if previous != legal.to_bits() {
            self.notify(id, legal);
        }
        legal
    }

    /// Set a value given as a normalized 0..1 position
    pub fn set_normalized(&self, id: ParameterId, proportion: f32) -> f32 {
        self.set(id, id.range().convert_from_0_to_1(proportion))
    }

    /// Set a parameter addressed by its host-facing name
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32> {
        let id = ParameterId::from_name(name)?;
        Ok(self.set(id, value))
    }

    /// Write every value from a snapshot, notifying for each change
    pub fn apply_snapshot(&self, snapshot: &ParameterSnapshot) {
        for id in ParameterId::ALL {
            self.set(id, snapshot.get(id));
        }
    }

    /// Register a change listener
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped. It may be invoked from any thread that writes a parameter.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(ParameterId, f32) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(Listener {
                id,
                callback: Arc::new(callback),
            }),
            Err(poisoned) => poisoned.into_inner().push(Listener {
                id,
                callback: Arc::new(callback),
            }),
        }
        debug!(listener = id, "Parameter listener added");

        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        match self.listeners.lock() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut listeners = match self.listeners.lock() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.retain(|listener| listener.id != id);
        debug!(listener = id, "Parameter listener removed");
    }

    fn notify(&self, id: ParameterId, value: f32) {
        // Callbacks run outside the lock so a listener may (un)subscribe.
        let callbacks: Vec<Arc<ListenerFn>> = match self.listeners.lock() {
            Ok(listeners) => listeners.iter().map(|l| Arc::clone(&l.callback)).collect(),
            Err(poisoned) => {
                warn!("Parameter listener list poisoned, recovering");
                poisoned
                    .into_inner()
                    .iter()
                    .map(|l| Arc::clone(&l.callback))
                    .collect()
            }
        };

        for callback in callbacks {
            callback(id, value);
        }
    }
}

impl fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStore")
            .field("values", &self.snapshot())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Scoped listener registration; dropping it deregisters the listener
#[must_use = "dropping the subscription removes the listener immediately"]
pub struct Subscription {
    store: Weak<ParameterStore>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
