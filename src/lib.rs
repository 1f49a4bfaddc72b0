//! Real-time, sample-accurate DSP processing units for audio effects and
//! measurement tools: filters, a ray-traced impulse response generator, a
//! look-ahead limiter, an oversampler, a phase-accumulator oscillator, a
//! sample loader and playback engine, a sidechain analyzer, an ADSR
//! envelope, waveshaping functions, a chirp-based latency detector, and a
//! multi-channel spectral processor.
//!
//! Every unit follows the same shape: construct, configure via setters or
//! `update_settings`, call `process` per audio block, and drop when done.
//! Fallible entry points return [`error::Result`].

pub mod adsr;
pub mod dump;
pub mod error;
pub mod filter;
pub mod latency;
pub mod limiter;
pub mod math;
pub mod oscillator;
pub mod oversampler;
pub mod playback;
pub mod raytrace;
pub mod sample;
pub mod shaping;
pub mod sidechain;
pub mod simd;
pub mod spectral;

pub use error::{Error, Result};
