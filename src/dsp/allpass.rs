//! Modulated allpass filter for diffusion
//!
//! Implements: v[n] = x[n] - g * d[n],  y[n] = d[n] + g * v[n]
//! where d[n] is the (modulated) delayed value v[n - N].
//! Transfer function (g + z^-N) / (1 + g z^-N): flat magnitude, phase smear only.

use super::delay_line::DelayLine;

/// Largest allpass gain accepted; |g| must stay below 1 for stability
pub const MAX_ALLPASS_GAIN: f32 = 0.95;

/// Allpass filter over a fixed-length delay line with LFO-modulated read
#[derive(Debug, Clone)]
pub struct ModulatedAllpass {
    line: DelayLine,
    /// Nominal delay in samples
    length: usize,
}

impl ModulatedAllpass {
    /// Create an allpass with a nominal delay of `length` samples
    pub fn new(length: usize) -> Self {
        let length = length.max(2);
        Self {
            line: DelayLine::new(length + 1),
            length,
        }
    }

    /// Nominal delay in samples
    pub fn length(&self) -> usize {
        self.length
    }

    /// Process one sample
    ///
    /// The read delay is `length - depth + depth * lfo`, so it swings between
    /// `length - 2 * depth` and `length` as `lfo` moves over [-1, 1].
    #[inline]
    pub fn process(&mut self, input: f32, gain: f32, depth: f32, lfo: f32) -> f32 {
        let gain = gain.clamp(-MAX_ALLPASS_GAIN, MAX_ALLPASS_GAIN);
        let depth = depth.clamp(0.0, (self.length as f32 - 1.0) * 0.5);
        let delay = self.length as f32 - depth + depth * lfo;

        let delayed = self.line.read_fractional(delay);
        let v = input - gain * delayed;
        self.line.write(v);

        delayed + gain * v
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}
