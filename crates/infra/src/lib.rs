//! Platform side of the trieq equalizer
//!
//! - [`audio`]: cpal devices and the duplex stream that runs the processor
//! - [`analysis`]: FFT measurement of the processor's impulse response

pub mod analysis;
pub mod audio;
