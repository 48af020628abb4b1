//! Signal-processing core
//!
//! One module per stage of the reverb. [`Reverb`] owns an instance of each
//! and drives them sample by sample; [`ParameterMapper`] turns the public
//! parameter record into the [`Coefficients`] they read.

pub mod allpass;
pub mod delay_line;
pub mod diffusion;
pub mod early;
pub mod effect;
pub mod fdn;
pub mod filters;
pub mod lfo;
pub mod mapper;
pub mod output;
pub mod params;
pub mod reverb;

pub use effect::Effect;
pub use mapper::{Coefficients, ParameterMapper};
pub use params::{Mode, ModePreset, ParamUpdate, ReverbParams, MIN_DECAY_SECS};
pub use reverb::{Reverb, ReverbConfig};
