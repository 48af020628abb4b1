//! One-pole filters and the feedback-path soft clipper

use std::f32::consts::PI;

/// Lowest cutoff accepted by the coefficient helpers
pub const MIN_CUTOFF_HZ: f32 = 10.0;

/// Soft clip knee: samples below this magnitude pass untouched
pub const SOFT_CLIP_THRESHOLD: f32 = 1.5;
const SOFT_CLIP_PRE_SCALE: f32 = 1.2;
const SOFT_CLIP_POST_SCALE: f32 = 0.9;

/// Largest magnitude the soft clipper can emit
pub const SOFT_CLIP_CEILING: f32 = SOFT_CLIP_THRESHOLD + SOFT_CLIP_POST_SCALE * (2.0 / 3.0);

/// Below this, feedback samples are flushed to zero
const DENORMAL_FLOOR: f32 = 1.0e-20;

/// One-pole lowpass coefficient for `cutoff_hz`
///
/// coeff = 1 - exp(-2 * PI * fc / fs); the cutoff is clamped to
/// [MIN_CUTOFF_HZ, 0.49 * fs] and non-finite cutoffs fall back to the minimum.
pub fn lowpass_coefficient(cutoff_hz: f32, sample_rate: f32) -> f32 {
    let max_cutoff = sample_rate * 0.49;
    let fc = if cutoff_hz.is_finite() {
        cutoff_hz.clamp(MIN_CUTOFF_HZ, max_cutoff.max(MIN_CUTOFF_HZ))
    } else {
        MIN_CUTOFF_HZ
    };
    1.0 - (-2.0 * PI * fc / sample_rate).exp()
}

/// One-pole highpass pole for `cutoff_hz`, with the lowpass strength scaled by `strength`
pub fn highpass_pole(cutoff_hz: f32, sample_rate: f32, strength: f32) -> f32 {
    (1.0 - lowpass_coefficient(cutoff_hz, sample_rate) * strength).clamp(0.0, 0.9999)
}

/// One-pole lowpass: y[n] = y[n-1] + coeff * (x[n] - y[n-1])
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePoleLowpass {
    state: f32,
}

impl OnePoleLowpass {
    #[inline]
    pub fn process(&mut self, input: f32, coeff: f32) -> f32 {
        self.state += coeff * (input - self.state);
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// One-pole highpass: y[n] = pole * (y[n-1] + x[n] - x[n-1])
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePoleHighpass {
    prev_input: f32,
    prev_output: f32,
}

impl OnePoleHighpass {
    #[inline]
    pub fn process(&mut self, input: f32, pole: f32) -> f32 {
        let output = pole * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

/// Cubic-knee soft clipper, identity below [`SOFT_CLIP_THRESHOLD`]
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= SOFT_CLIP_THRESHOLD {
        return x;
    }
    let t = ((magnitude - SOFT_CLIP_THRESHOLD) * SOFT_CLIP_PRE_SCALE).min(1.0);
    let knee = t - t * t * t / 3.0;
    (SOFT_CLIP_THRESHOLD + SOFT_CLIP_POST_SCALE * knee).copysign(x)
}

#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}
