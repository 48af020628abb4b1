//! Four-voice LFO bank driving delay modulation
//!
//! Phases advance once per processed block, not per sample: every sample of a
//! block sees the values sampled at the block start.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Number of LFOs in the bank
pub const NUM_LFOS: usize = 4;

/// Base rate range in Hz, mapped linearly from `mod_rate`
pub const MIN_LFO_HZ: f32 = 0.05;
pub const MAX_LFO_HZ: f32 = 2.0;

/// Fixed relative phase offsets
const PHASE_OFFSETS: [f32; NUM_LFOS] = [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2];

/// Fixed rate ratios relative to the base rate (detuned so the voices drift)
pub const RATE_RATIOS: [f32; NUM_LFOS] = [1.0, 1.17, 0.83, 1.31];

/// Base LFO rate in Hz for a normalized `mod_rate`
pub fn base_rate_hz(mod_rate: f32) -> f32 {
    let mod_rate = if mod_rate.is_finite() {
        mod_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    MIN_LFO_HZ + mod_rate * (MAX_LFO_HZ - MIN_LFO_HZ)
}

/// Per-LFO phase increments in radians per sample
pub fn phase_increments(mod_rate: f32, sample_rate: f32) -> [f32; NUM_LFOS] {
    let base = base_rate_hz(mod_rate);
    std::array::from_fn(|i| TAU * base * RATE_RATIOS[i] / sample_rate)
}

/// Sine LFO with block-rate phase updates
#[derive(Debug, Clone, Copy)]
pub struct Lfo {
    /// Current phase, wrapped to [0, 2π)
    phase: f32,
    /// Phase increment in radians per sample
    rate: f32,
    amplitude: f32,
}

impl Lfo {
    fn new(phase: f32) -> Self {
        Self {
            phase,
            rate: 0.0,
            amplitude: 1.0,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.amplitude * self.phase.sin()
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    #[inline]
    fn advance(&mut self, samples: usize) {
        self.phase = (self.phase + self.rate * samples as f32).rem_euclid(TAU);
        // rem_euclid can round up to exactly TAU
        if self.phase >= TAU {
            self.phase = 0.0;
        }
    }
}

/// The four detuned, phase-offset LFOs
#[derive(Debug, Clone)]
pub struct LfoBank {
    lfos: [Lfo; NUM_LFOS],
}

impl Default for LfoBank {
    fn default() -> Self {
        Self::new()
    }
}

impl LfoBank {
    pub fn new() -> Self {
        Self {
            lfos: std::array::from_fn(|i| Lfo::new(PHASE_OFFSETS[i])),
        }
    }

    /// Set per-LFO increments (radians per sample)
    pub fn set_rates(&mut self, rates: &[f32; NUM_LFOS]) {
        for (lfo, &rate) in self.lfos.iter_mut().zip(rates.iter()) {
            lfo.rate = if rate.is_finite() { rate } else { 0.0 };
        }
    }

    /// Values at the current phase, held for the whole block
    #[inline]
    pub fn snapshot(&self) -> [f32; NUM_LFOS] {
        std::array::from_fn(|i| self.lfos[i].value())
    }

    /// Advance every phase by `rate * block_len`
    #[inline]
    pub fn advance(&mut self, block_len: usize) {
        for lfo in &mut self.lfos {
            lfo.advance(block_len);
        }
    }

    pub fn lfo(&self, index: usize) -> &Lfo {
        &self.lfos[index % NUM_LFOS]
    }

    /// Restore the initial phase offsets, keeping rates
    pub fn reset(&mut self) {
        for (lfo, &offset) in self.lfos.iter_mut().zip(PHASE_OFFSETS.iter()) {
            lfo.phase = offset;
        }
    }
}
