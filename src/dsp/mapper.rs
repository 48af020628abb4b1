//! Parameter mapper
//!
//! Turns a [`ReverbParams`] record into a complete [`Coefficients`] snapshot.
//! Every input is sanitised here, so the audio path can trust the snapshot
//! blindly. Mapping never allocates.

use super::diffusion::{DiffusionCoefficients, MAX_DIFFUSION_GAIN, STAGE_A_WEIGHTS, STAGE_B_WEIGHTS};
use super::fdn::{
    base_lengths, line_capacities, FdnCoefficients, DITHER_AMPLITUDE, MAX_FEEDBACK_GAIN,
    MIN_LINE_LENGTH, NUM_LINES,
};
use super::filters::{highpass_pole, lowpass_coefficient};
use super::lfo::{phase_increments, NUM_LFOS};
use super::params::ReverbParams;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Line length multiplier at `size = 0` and its growth up to `size = 1`
const SIZE_OFFSET: f32 = 0.3;
const SIZE_RANGE: f32 = 1.7;

/// Damping jitter range, applied independently per line on each recompute
const DAMPING_JITTER: f32 = 0.05;
const MIN_DAMPING: f32 = 0.001;

/// Modulation depth in seconds at `mod_depth = 1`
const DIFFUSION_MOD_SECS: f32 = 0.0002;
const FDN_MOD_SECS: f32 = 0.0005;

/// Color cutoff anchors
const COLOR_MIN_HZ: f32 = 200.0;
const COLOR_MID_HZ: f32 = 2000.0;

/// Complete set of derived coefficients
///
/// Published as a whole: the audio thread sees either the previous snapshot
/// or this one, never a mix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Parameter record this snapshot was derived from
    pub params: ReverbParams,
    pub sample_rate: f32,
    pub pre_delay_samples: usize,
    /// Pole of the highpass in front of the diffuser
    pub input_highpass_pole: f32,
    pub diffusion: DiffusionCoefficients,
    pub fdn: FdnCoefficients,
    /// LFO phase increments in radians per sample
    pub lfo_rates: [f32; NUM_LFOS],
    /// One-pole lowpass coefficient of the output color filter
    pub color_coeff: f32,
    pub mix: f32,
    pub width: f32,
}

/// RT60 approximation: `10^(-3 * avg_delay / decay)`, capped at [`MAX_FEEDBACK_GAIN`]
///
/// Treats one average line length as the loop length; see [`mean_loop_secs`].
pub fn feedback_gain(avg_delay_secs: f32, decay_secs: f32) -> f32 {
    let gain = 10.0f32.powf(-3.0 * avg_delay_secs / decay_secs);
    if gain.is_finite() {
        gain.clamp(0.0, MAX_FEEDBACK_GAIN)
    } else {
        0.0
    }
}

/// Average loop length in seconds as seen by the decay
///
/// Every line shares one gain, so a line loses `20·log10(g)` dB per trip
/// through it and the tail's mean decay rate is the mean of `1/length`. That
/// makes the harmonic mean of the line lengths the loop length to feed into
/// [`feedback_gain`]; the arithmetic mean overstates it and shortens the tail.
pub fn mean_loop_secs(line_lengths: &[usize; NUM_LINES], sample_rate: f32) -> f32 {
    let rate_sum: f32 = line_lengths.iter().map(|&len| 1.0 / len.max(1) as f32).sum();
    NUM_LINES as f32 / rate_sum / sample_rate
}

/// Output color cutoff: 200 Hz at 0, 2 kHz at 0.5, 10 kHz at 1
pub fn color_cutoff_hz(color: f32) -> f32 {
    let c = unit(color);
    if c < 0.5 {
        COLOR_MIN_HZ * 10.0f32.powf(2.0 * c)
    } else {
        COLOR_MID_HZ * 5.0f32.powf(2.0 * (c - 0.5))
    }
}

/// Clamp to [0, 1]; NaN maps to 0
#[inline]
fn unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Translates parameter records into coefficient snapshots for one sample rate
#[derive(Debug, Clone)]
pub struct ParameterMapper {
    sample_rate: f32,
    base_lengths: [usize; NUM_LINES],
    capacities: [usize; NUM_LINES],
    /// Damping jitter source
    rng: ChaCha8Rng,
}

impl ParameterMapper {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        Self {
            sample_rate,
            base_lengths: base_lengths(sample_rate),
            capacities: line_capacities(sample_rate),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Base FDN line lengths in samples
    pub fn base_lengths(&self) -> &[usize; NUM_LINES] {
        &self.base_lengths
    }

    /// Provisioned FDN line capacities in samples
    pub fn capacities(&self) -> &[usize; NUM_LINES] {
        &self.capacities
    }

    /// Derive a full coefficient snapshot
    pub fn map(&mut self, params: &ReverbParams) -> Coefficients {
        let sr = self.sample_rate;
        let preset = params.mode.preset();

        // FDN line lengths and the RT60 loop gain
        let multiplier = (SIZE_OFFSET + SIZE_RANGE * unit(params.size)) * preset.size_scale;
        let line_lengths: [usize; NUM_LINES] = std::array::from_fn(|i| {
            let length = (self.base_lengths[i] as f32 * multiplier).round() as usize;
            length.clamp(MIN_LINE_LENGTH, self.capacities[i])
        });
        let gain = feedback_gain(mean_loop_secs(&line_lengths, sr), params.effective_decay());

        // Damping, with fresh jitter per line
        let damping_base = lowpass_coefficient(params.high_cut_hz, sr) * preset.damping_base;
        let rng = &mut self.rng;
        let damping: [f32; NUM_LINES] = std::array::from_fn(|_| {
            let jitter = rng.random_range(-DAMPING_JITTER..=DAMPING_JITTER);
            (damping_base * (1.0 + jitter)).clamp(MIN_DAMPING, 1.0)
        });

        let mod_depth = unit(params.mod_depth);
        let vintage = unit(params.vintage);

        let fdn = FdnCoefficients {
            line_lengths,
            feedback_gain: gain,
            damping,
            highpass_pole: highpass_pole(params.low_cut_hz, sr, preset.highpass_base),
            mod_depth: mod_depth * FDN_MOD_SECS * sr,
            dither: vintage * DITHER_AMPLITUDE,
        };

        let diffusion_gain = unit(params.diffusion) * preset.diffusion_gain_scale;
        let stage_gain = |weight: f32| (diffusion_gain * weight).min(MAX_DIFFUSION_GAIN);
        let diffusion = DiffusionCoefficients {
            gains_a: STAGE_A_WEIGHTS.map(stage_gain),
            gains_b: STAGE_B_WEIGHTS.map(stage_gain),
            mod_depth: mod_depth * DIFFUSION_MOD_SECS * sr,
        };

        let pre_delay_ms = if params.pre_delay_ms.is_finite() {
            params.pre_delay_ms.max(0.0)
        } else {
            0.0
        };

        Coefficients {
            params: *params,
            sample_rate: sr,
            pre_delay_samples: (pre_delay_ms * sr / 1000.0).floor() as usize,
            input_highpass_pole: highpass_pole(params.low_cut_hz, sr, 1.0),
            diffusion,
            fdn,
            lfo_rates: phase_increments(params.mod_rate, sr),
            color_coeff: lowpass_coefficient(color_cutoff_hz(params.color), sr),
            mix: unit(params.mix),
            width: unit(params.stereo_width),
        }
    }
}
