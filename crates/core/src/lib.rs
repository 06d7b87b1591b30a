//! Core of the trieq three-band equalizer
//!
//! Everything that does not touch an audio device or a window lives here:
//! parameters, coefficient design, the stereo filter chain and the
//! response curve renderer.

pub mod domain;
