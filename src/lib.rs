//! Reverie - Hybrid FDN Reverberation Engine
//!
//! Reverie turns a stream of stereo sample blocks into a reverberated stereo
//! output, blending the dry input with a synthesized tail.
//!
//! # Architecture
//!
//! Signal flow, per sample:
//! - Pre-delay line feeding two early-reflection tap banks
//! - Two cascaded stages of modulated allpass diffusion per channel
//! - An 8-line feedback delay network with per-line damping and highpass
//! - Output stage: stereo taps, width, tone color, limiting, dry/wet mix
//!
//! Parameters are mapped to a complete [`dsp::Coefficients`] snapshot which is
//! either applied synchronously between blocks or published lock-free from a
//! control thread through a [`engine::ReverbController`].

pub mod dsp;
pub mod engine;
pub mod error;

pub use dsp::{Effect, Mode, ParamUpdate, Reverb, ReverbConfig, ReverbParams};
pub use engine::{AudioBuffer, ChannelLayout, Delivery, ReverbController};
pub use error::{ReverieError, Result};
