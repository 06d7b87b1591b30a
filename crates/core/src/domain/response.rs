//! Response curve renderer
//!
//! Draws the combined magnitude response of the chain between 20 Hz and
//! 20 kHz, one sample per horizontal pixel.
//!
//! Parameter writes only mark a [`DirtyFlag`]; the actual work happens on
//! the UI timer in [`ResponseCurve::tick`], which consumes the flag with a
//! compare-and-swap. Any number of changes between two ticks therefore
//! cost exactly one recompute, and that recompute sees the latest values.
//!
//! The renderer keeps its own [`ChainConfiguration`] and fills it with the
//! same updater as the audio path, so the curve never touches the live
//! chain.

use crate::domain::audio::SharedSampleRate;
use crate::domain::chain::ChainConfiguration;
use crate::domain::dsp::gain_to_decibels;
use crate::domain::params::{ParameterStore, Subscription};
use crate::domain::settings::ChainSettings;
use crate::domain::updater::update_chain;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Left edge of the frequency axis
pub const MIN_FREQUENCY_HZ: f64 = 20.0;

/// Right edge of the frequency axis
pub const MAX_FREQUENCY_HZ: f64 = 20000.0;

/// Top of the drawing area in dB; the bottom is the negative
pub const DISPLAY_RANGE_DB: f64 = 24.0;

/// Sample rate assumed until a processor publishes one
pub const FALLBACK_SAMPLE_RATE: f64 = 44100.0;

/// Idle/Dirty state shared between parameter listeners and the UI timer
#[derive(Debug, Default)]
pub struct DirtyFlag {
    dirty: CachePadded<AtomicBool>,
}

impl DirtyFlag {
    pub fn new(dirty: bool) -> Self {
        Self {
            dirty: CachePadded::new(AtomicBool::new(dirty)),
        }
    }

    /// Idle → Dirty. Safe from any thread, never blocks.
    pub fn mark(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Dirty → Idle; returns whether the flag was dirty
    pub fn consume(&self) -> bool {
        self.dirty
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, y growing downwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const ORANGE: Color = Color { r: 255, g: 165, b: 0 };

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Open polyline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePath {
    points: Vec<Point>,
}

impl ResponsePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all points and start at `point`
    pub fn start_new_sub_path(&mut self, point: Point) {
        self.points.clear();
        self.points.push(point);
    }

    pub fn line_to(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Drawing surface the curve is painted on
pub trait Canvas {
    fn fill_background(&mut self, color: Color);

    fn draw_rounded_rectangle(&mut self, rect: Rect, corner_radius: f32, thickness: f32, color: Color);

    fn stroke_path(&mut self, path: &ResponsePath, thickness: f32, color: Color);
}

/// Frequency shown at pixel `index` of a `width`-pixel wide area
///
/// Log-spaced: `20 * 1000^(index / width)`.
pub fn frequency_for_pixel(index: usize, width: usize) -> f64 {
    if width == 0 {
        return MIN_FREQUENCY_HZ;
    }
    let proportion = index as f64 / width as f64;
    MIN_FREQUENCY_HZ * (MAX_FREQUENCY_HZ / MIN_FREQUENCY_HZ).powf(proportion)
}

/// Map a gain in dB onto the vertical axis of `bounds`
///
/// `-DISPLAY_RANGE_DB` lands on the bottom edge and `+DISPLAY_RANGE_DB` on
/// the top edge. Values outside the range extrapolate past the edges.
pub fn decibels_to_y(db: f64, bounds: &Rect) -> f32 {
    let bottom = bounds.bottom() as f64;
    let top = bounds.top() as f64;
    let proportion = (db + DISPLAY_RANGE_DB) / (2.0 * DISPLAY_RANGE_DB);
    (bottom + proportion * (top - bottom)) as f32
}

pub struct ResponseCurve {
    store: Arc<ParameterStore>,
    sample_rate: SharedSampleRate,
    dirty: Arc<DirtyFlag>,
    chain: ChainConfiguration,
    bounds: Rect,
    magnitudes: Vec<f64>,
    path: ResponsePath,
    rendered_sample_rate: f64,
    recomputes: u64,
    _subscription: Subscription,
}

impl ResponseCurve {
    /// Create a renderer listening to `store`
    ///
    /// Starts Dirty so the first tick draws the initial state.
    pub fn new(store: Arc<ParameterStore>, sample_rate: SharedSampleRate, bounds: Rect) -> Self {
        let dirty = Arc::new(DirtyFlag::new(true));
        let listener_flag = Arc::clone(&dirty);
        let subscription = store.subscribe(move |_, _| listener_flag.mark());

        Self {
            store,
            sample_rate,
            dirty,
            chain: ChainConfiguration::new(),
            bounds,
            magnitudes: Vec::new(),
            path: ResponsePath::new(),
            rendered_sample_rate: 0.0,
            recomputes: 0,
            _subscription: subscription,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Resize the response area; the next tick redraws
    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds != bounds {
            self.bounds = bounds;
            self.dirty.mark();
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Force a redraw on the next tick
    pub fn mark_dirty(&self) {
        self.dirty.mark();
    }

    /// Gain in dB per pixel, left to right
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn path(&self) -> &ResponsePath {
        &self.path
    }

    /// How many times the curve has been recomputed
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    fn current_sample_rate(&self) -> f64 {
        if self.sample_rate.is_known() {
            self.sample_rate.get()
        } else {
            FALLBACK_SAMPLE_RATE
        }
    }

    /// Timer callback: recompute when something changed since the last tick
    ///
    /// Returns whether the curve was recomputed (and needs repainting).
    pub fn tick(&mut self) -> bool {
        let sample_rate = self.current_sample_rate();
        let was_dirty = self.dirty.consume();

        if !was_dirty && sample_rate == self.rendered_sample_rate {
            return false;
        }

        self.recompute(sample_rate);
        true
    }

    fn recompute(&mut self, sample_rate: f64) {
        let settings = ChainSettings::from_store(&self.store);
        update_chain(&self.chain, &settings, sample_rate);
        let active = self.chain.resolve();

        let width = self.bounds.width.max(0.0) as usize;
        self.magnitudes.clear();
        self.magnitudes.extend((0..width).map(|i| {
            let freq = frequency_for_pixel(i, width);
            gain_to_decibels(active.magnitude_for_frequency(freq, sample_rate))
        }));

        self.path.clear();
        if let Some(&first) = self.magnitudes.first() {
            let left = self.bounds.left();
            self.path
                .start_new_sub_path(Point::new(left, decibels_to_y(first, &self.bounds)));
            for (i, &db) in self.magnitudes.iter().enumerate().skip(1) {
                self.path
                    .line_to(Point::new(left + i as f32, decibels_to_y(db, &self.bounds)));
            }
        }

        self.rendered_sample_rate = sample_rate;
        self.recomputes += 1;
        debug!(
            sample_rate,
            width,
            stages = active.len(),
            "Response curve recomputed"
        );
    }

    /// Background, border, then the curve
    pub fn paint(&self, canvas: &mut dyn Canvas) {
        canvas.fill_background(Color::BLACK);
        canvas.draw_rounded_rectangle(self.bounds, 4.0, 1.0, Color::ORANGE);
        canvas.stroke_path(&self.path, 2.0, Color::WHITE);
    }
}

impl std::fmt::Debug for ResponseCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCurve")
            .field("bounds", &self.bounds)
            .field("dirty", &self.dirty.is_dirty())
            .field("recomputes", &self.recomputes)
            .finish()
    }
}
