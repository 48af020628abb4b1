//! Eight-line feedback delay network
//!
//! Per sample and per line: modulated fractional read, 8x8 mixing, feedback
//! gain, input injection (lines 0-3 only), damping lowpass, highpass, soft
//! clip, optional dither, write.

use super::delay_line::DelayLine;
use super::filters::{flush_denormal, soft_clip, OnePoleHighpass, OnePoleLowpass};
use super::lfo::NUM_LFOS;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Number of delay lines
pub const NUM_LINES: usize = 8;

/// Capacity of each line relative to its base length
pub const MAX_SIZE_MULTIPLIER: f32 = 2.0;

/// Hard cap on the loop gain
pub const MAX_FEEDBACK_GAIN: f32 = 0.985;

/// Weight of the diffused input added to lines 0-3
pub const INJECTION_GAIN: f32 = 0.5;

/// Dither amplitude at `vintage = 1`
pub const DITHER_AMPLITUDE: f32 = 1.0e-5;

/// Shortest effective line length in samples
pub const MIN_LINE_LENGTH: usize = 4;

/// Base line lengths in milliseconds, mutually incommensurate
const BASE_LENGTHS_MS: [f32; NUM_LINES] = [31.3, 36.7, 40.9, 45.1, 49.3, 53.9, 58.7, 63.1];

/// Largest deviation applied to each matrix entry before re-orthonormalising
const MATRIX_PERTURBATION: f64 = 0.05;

/// Base line lengths in samples at `sample_rate`
pub fn base_lengths(sample_rate: f32) -> [usize; NUM_LINES] {
    std::array::from_fn(|i| {
        ((BASE_LENGTHS_MS[i] * sample_rate / 1000.0).round() as usize).max(MIN_LINE_LENGTH)
    })
}

/// Provisioned capacity per line: the longest effective length allowed
pub fn line_capacities(sample_rate: f32) -> [usize; NUM_LINES] {
    let base = base_lengths(sample_rate);
    std::array::from_fn(|i| (base[i] as f32 * MAX_SIZE_MULTIPLIER).ceil() as usize)
}

// ============================================================================
// Mixing Matrix
// ============================================================================

/// Build the near-unitary mixing matrix
///
/// Starts from the Hadamard sign pattern `(-1)^popcount(i & j) / sqrt(8)`,
/// scales each entry by a random factor within ±5%, then runs Gram-Schmidt
/// over the rows so the result is exactly orthonormal again.
pub fn mixing_matrix(rng: &mut ChaCha8Rng) -> [[f32; NUM_LINES]; NUM_LINES] {
    let norm = 1.0 / (NUM_LINES as f64).sqrt();
    let mut rows = [[0.0f64; NUM_LINES]; NUM_LINES];
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, entry) in row.iter_mut().enumerate() {
            let sign = if (i & j).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            let jitter = rng.random_range(-MATRIX_PERTURBATION..=MATRIX_PERTURBATION);
            *entry = sign * norm * (1.0 + jitter);
        }
    }

    for i in 0..NUM_LINES {
        for k in 0..i {
            let projection: f64 = (0..NUM_LINES).map(|j| rows[i][j] * rows[k][j]).sum();
            for j in 0..NUM_LINES {
                rows[i][j] -= projection * rows[k][j];
            }
        }
        let length = rows[i].iter().map(|v| v * v).sum::<f64>().sqrt();
        for v in rows[i].iter_mut() {
            *v /= length;
        }
    }

    rows.map(|row| row.map(|v| v as f32))
}

// ============================================================================
// FDN Core
// ============================================================================

/// FDN coefficients, produced by the parameter mapper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdnCoefficients {
    /// Effective length of each line in samples
    pub line_lengths: [usize; NUM_LINES],
    /// Global loop gain (<= MAX_FEEDBACK_GAIN)
    pub feedback_gain: f32,
    /// Per-line damping lowpass coefficient (jittered)
    pub damping: [f32; NUM_LINES],
    /// Shared highpass pole
    pub highpass_pole: f32,
    /// Modulation depth in samples
    pub mod_depth: f32,
    /// Dither amplitude (0 disables)
    pub dither: f32,
}

impl Default for FdnCoefficients {
    fn default() -> Self {
        Self {
            line_lengths: [MIN_LINE_LENGTH; NUM_LINES],
            feedback_gain: 0.0,
            damping: [1.0; NUM_LINES],
            highpass_pole: 0.9999,
            mod_depth: 0.0,
            dither: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct FdnLine {
    delay: DelayLine,
    /// Effective length; the delay line runs one sample longer so a read at
    /// exactly this delay is in range
    length: usize,
    damping: OnePoleLowpass,
    highpass: OnePoleHighpass,
}

impl FdnLine {
    fn new(capacity: usize) -> Self {
        let mut delay = DelayLine::new(capacity + 1);
        delay.set_len(capacity + 1);
        Self {
            delay,
            length: capacity,
            damping: OnePoleLowpass::default(),
            highpass: OnePoleHighpass::default(),
        }
    }

    fn set_length(&mut self, length: usize) {
        let length = length.clamp(MIN_LINE_LENGTH, self.delay.capacity() - 1);
        self.length = length;
        self.delay.set_len(length + 1);
    }

    #[inline]
    fn read(&self, depth: f32, lfo: f32) -> f32 {
        let depth = depth.min((self.length as f32 - 1.0) * 0.5);
        let delay = self.length as f32 - depth + depth * lfo;
        self.delay.read_fractional(delay)
    }
}

/// The feedback delay network
#[derive(Debug, Clone)]
pub struct Fdn {
    lines: [FdnLine; NUM_LINES],
    matrix: [[f32; NUM_LINES]; NUM_LINES],
    /// Line outputs of the last processed sample
    reads: [f32; NUM_LINES],
}

impl Fdn {
    /// Allocate every line at its full capacity
    pub fn new(capacities: &[usize; NUM_LINES], matrix: [[f32; NUM_LINES]; NUM_LINES]) -> Self {
        Self {
            lines: std::array::from_fn(|i| FdnLine::new(capacities[i].max(MIN_LINE_LENGTH))),
            matrix,
            reads: [0.0; NUM_LINES],
        }
    }

    /// Crop each line to its effective length; contents and indices are kept
    pub fn set_lengths(&mut self, lengths: &[usize; NUM_LINES]) {
        for (line, &length) in self.lines.iter_mut().zip(lengths.iter()) {
            line.set_length(length);
        }
    }

    pub fn lengths(&self) -> [usize; NUM_LINES] {
        std::array::from_fn(|i| self.lines[i].length)
    }

    pub fn matrix(&self) -> &[[f32; NUM_LINES]; NUM_LINES] {
        &self.matrix
    }

    /// Run one sample through the network and return the line outputs
    #[inline]
    pub fn process(
        &mut self,
        in_l: f32,
        in_r: f32,
        coeffs: &FdnCoefficients,
        lfos: &[f32; NUM_LFOS],
        rng: &mut ChaCha8Rng,
    ) -> [f32; NUM_LINES] {
        for (i, line) in self.lines.iter().enumerate() {
            self.reads[i] = line.read(coeffs.mod_depth, lfos[i % NUM_LFOS]);
        }

        for i in 0..NUM_LINES {
            let mixed: f32 = self.matrix[i]
                .iter()
                .zip(self.reads.iter())
                .map(|(m, r)| m * r)
                .sum();
            let mut x = mixed * coeffs.feedback_gain;

            match i {
                0 | 2 => x += INJECTION_GAIN * in_l,
                1 | 3 => x += INJECTION_GAIN * in_r,
                _ => {}
            }

            let line = &mut self.lines[i];
            x = line.damping.process(x, coeffs.damping[i]);
            x = line.highpass.process(x, coeffs.highpass_pole);
            x = soft_clip(x);
            if coeffs.dither > 0.0 {
                x += coeffs.dither * (rng.random::<f32>() * 2.0 - 1.0);
            }
            line.delay.write(flush_denormal(x));
        }

        self.reads
    }

    /// Zero every line and filter state
    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.delay.clear();
            line.damping.reset();
            line.highpass.reset();
        }
        self.reads = [0.0; NUM_LINES];
    }
}
