//! Reverb parameter record, partial updates and the mode preset table

use crate::error::{ReverieError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decay floor in seconds; keeps the RT60 formula finite
pub const MIN_DECAY_SECS: f32 = 0.01;

// ============================================================================
// Modes
// ============================================================================

/// Reverb character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Plate,
    #[default]
    Hall,
    Room,
    Ambient,
}

impl Mode {
    /// All modes in preset-table order
    pub const ALL: [Mode; 4] = [Mode::Plate, Mode::Hall, Mode::Room, Mode::Ambient];

    /// Select a mode from a numeric index using `floor(index) mod 4`
    ///
    /// Non-finite indices select the first mode.
    pub fn from_index(index: f32) -> Self {
        if !index.is_finite() {
            return Mode::Plate;
        }
        let slot = (index.floor() as i64).rem_euclid(Self::ALL.len() as i64);
        Self::ALL[slot as usize]
    }

    /// Position of this mode in the preset table
    pub fn index(self) -> usize {
        match self {
            Mode::Plate => 0,
            Mode::Hall => 1,
            Mode::Room => 2,
            Mode::Ambient => 3,
        }
    }

    /// Preset scaling factors for this mode
    pub fn preset(self) -> ModePreset {
        MODE_PRESETS[self.index()]
    }
}

/// Per-mode scaling factors applied by the parameter mapper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModePreset {
    /// Multiplier on every FDN line length
    pub size_scale: f32,
    /// Multiplier on all diffusion allpass gains
    pub diffusion_gain_scale: f32,
    /// Multiplier on the per-line damping lowpass coefficient
    pub damping_base: f32,
    /// Multiplier on the per-line highpass strength
    pub highpass_base: f32,
}

/// Fixed preset table, indexed by [`Mode::index`]
pub const MODE_PRESETS: [ModePreset; 4] = [
    // Plate
    ModePreset {
        size_scale: 0.80,
        diffusion_gain_scale: 1.00,
        damping_base: 0.95,
        highpass_base: 0.30,
    },
    // Hall
    ModePreset {
        size_scale: 1.25,
        diffusion_gain_scale: 0.90,
        damping_base: 0.90,
        highpass_base: 0.25,
    },
    // Room
    ModePreset {
        size_scale: 0.55,
        diffusion_gain_scale: 0.85,
        damping_base: 0.70,
        highpass_base: 0.60,
    },
    // Ambient
    ModePreset {
        size_scale: 1.50,
        diffusion_gain_scale: 0.95,
        damping_base: 0.85,
        highpass_base: 0.20,
    },
];

// ============================================================================
// Parameter Record
// ============================================================================

/// Public reverb parameters
///
/// Range checking is the caller's job; the mapper only sanitises values so
/// that no combination can produce non-finite coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
    /// Dry/wet balance: 0 (dry) to 1 (wet)
    pub mix: f32,
    /// Pre-delay in milliseconds (0 to 200)
    pub pre_delay_ms: f32,
    /// Tail length (RT60) in seconds, must be > 0
    pub decay: f32,
    /// Room size: 0 (small) to 1 (large)
    pub size: f32,
    /// Diffusion density: 0 to 1
    pub diffusion: f32,
    /// Highpass cutoff applied to the tail input and feedback, Hz
    pub low_cut_hz: f32,
    /// Damping cutoff in the feedback path, Hz
    pub high_cut_hz: f32,
    /// Output tone: 0 (dark) to 1 (bright)
    pub color: f32,
    /// LFO rate: 0 to 1
    pub mod_rate: f32,
    /// Modulation depth: 0 to 1
    pub mod_depth: f32,
    /// Stereo width: 0 (mono) to 1 (full)
    pub stereo_width: f32,
    /// Converter noise emulation: 0 to 1
    pub vintage: f32,
    /// Reverb character
    pub mode: Mode,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            mix: 0.35,
            pre_delay_ms: 20.0,
            decay: 2.5,
            size: 0.6,
            diffusion: 0.75,
            low_cut_hz: 80.0,
            high_cut_hz: 10_000.0,
            color: 0.5,
            mod_rate: 0.3,
            mod_depth: 0.3,
            stereo_width: 1.0,
            vintage: 0.0,
            mode: Mode::Hall,
        }
    }
}

impl ReverbParams {
    /// Merge the fields present in `update`, keeping the rest
    pub fn apply(&mut self, update: &ParamUpdate) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if let Some(value) = update.$field {
                    self.$field = value;
                })*
            };
        }
        merge!(
            mix,
            pre_delay_ms,
            decay,
            size,
            diffusion,
            low_cut_hz,
            high_cut_hz,
            color,
            mod_rate,
            mod_depth,
            stereo_width,
            vintage,
            mode
        );
    }

    /// Return a copy with `update` merged in
    pub fn merged(mut self, update: &ParamUpdate) -> Self {
        self.apply(update);
        self
    }

    /// Decay time floored above zero
    pub fn effective_decay(&self) -> f32 {
        if self.decay.is_finite() && self.decay > MIN_DECAY_SECS {
            self.decay
        } else if self.decay == f32::INFINITY {
            f32::MAX
        } else {
            MIN_DECAY_SECS
        }
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// Partial parameter record; absent fields are left unchanged on merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamUpdate {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mix: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pre_delay_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub decay: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diffusion: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub low_cut_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub high_cut_hz: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mod_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mod_depth: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stereo_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vintage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mode: Option<Mode>,
}

macro_rules! update_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        impl ParamUpdate {
            $(
                #[doc = concat!("Set `", stringify!($field), "`")]
                pub fn $field(mut self, value: $ty) -> Self {
                    self.$field = Some(value);
                    self
                }
            )*
        }
    };
}

update_setters!(
    mix: f32,
    pre_delay_ms: f32,
    decay: f32,
    size: f32,
    diffusion: f32,
    low_cut_hz: f32,
    high_cut_hz: f32,
    color: f32,
    mod_rate: f32,
    mod_depth: f32,
    stereo_width: f32,
    vintage: f32,
    mode: Mode,
);

impl ParamUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a partial record from JSON, e.g. `{"decay": 3.0, "mode": "room"}`
    pub fn from_json(json: &Value) -> Result<Self> {
        if !json.is_object() {
            return Err(ReverieError::InvalidParameter {
                param: "params".to_string(),
                value: json.to_string(),
                expected: "a JSON object".to_string(),
            });
        }
        serde_json::from_value(json.clone()).map_err(|e| ReverieError::InvalidParameter {
            param: "params".to_string(),
            value: json.to_string(),
            expected: e.to_string(),
        })
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<ReverbParams> for ParamUpdate {
    fn from(p: ReverbParams) -> Self {
        Self {
            mix: Some(p.mix),
            pre_delay_ms: Some(p.pre_delay_ms),
            decay: Some(p.decay),
            size: Some(p.size),
            diffusion: Some(p.diffusion),
            low_cut_hz: Some(p.low_cut_hz),
            high_cut_hz: Some(p.high_cut_hz),
            color: Some(p.color),
            mod_rate: Some(p.mod_rate),
            mod_depth: Some(p.mod_depth),
            stereo_width: Some(p.stereo_width),
            vintage: Some(p.vintage),
            mode: Some(p.mode),
        }
    }
}
