//! Two-stage stereo allpass diffuser
//!
//! Stage A (four short allpasses) feeds stage B (three longer ones) in series,
//! independently per channel. Right-channel lengths are stretched by slightly
//! different ratios so the two channels never share a resonance.

use super::allpass::ModulatedAllpass;
use super::lfo::NUM_LFOS;

pub const STAGE_A_LEN: usize = 4;
pub const STAGE_B_LEN: usize = 3;

/// Largest gain the mapper will hand to a diffusion allpass
pub const MAX_DIFFUSION_GAIN: f32 = 0.9;

/// Stage A lengths in milliseconds (left channel)
const STAGE_A_MS: [f32; STAGE_A_LEN] = [3.1, 4.7, 6.1, 7.9];
/// Stage B lengths in milliseconds (left channel)
const STAGE_B_MS: [f32; STAGE_B_LEN] = [10.3, 13.7, 16.9];

/// Right/left length ratios
const RIGHT_RATIOS_A: [f32; STAGE_A_LEN] = [1.110, 1.127, 1.118, 1.130];
const RIGHT_RATIOS_B: [f32; STAGE_B_LEN] = [1.123, 1.112, 1.129];

/// Per-channel gain weights, index 0 = left, 1 = right
pub const STAGE_A_WEIGHTS: [f32; 2] = [0.70, 0.66];
pub const STAGE_B_WEIGHTS: [f32; 2] = [0.62, 0.56];

/// Right-channel filters read the LFO this many places further along the bank
const RIGHT_LFO_OFFSET: usize = 2;

/// Diffusion coefficients, produced by the parameter mapper
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiffusionCoefficients {
    /// Stage A gain per channel (left, right)
    pub gains_a: [f32; 2],
    /// Stage B gain per channel (left, right)
    pub gains_b: [f32; 2],
    /// Modulation depth in samples
    pub mod_depth: f32,
}

fn ms_to_len(ms: f32, ratio: f32, sample_rate: f32) -> usize {
    (ms * ratio * sample_rate / 1000.0).round() as usize
}

/// One channel's allpass cascade
#[derive(Debug, Clone)]
struct DiffusionChannel {
    stage_a: [ModulatedAllpass; STAGE_A_LEN],
    stage_b: [ModulatedAllpass; STAGE_B_LEN],
    lfo_offset: usize,
}

impl DiffusionChannel {
    fn new(
        sample_rate: f32,
        ratios_a: &[f32; STAGE_A_LEN],
        ratios_b: &[f32; STAGE_B_LEN],
        lfo_offset: usize,
    ) -> Self {
        Self {
            stage_a: std::array::from_fn(|i| {
                ModulatedAllpass::new(ms_to_len(STAGE_A_MS[i], ratios_a[i], sample_rate))
            }),
            stage_b: std::array::from_fn(|i| {
                ModulatedAllpass::new(ms_to_len(STAGE_B_MS[i], ratios_b[i], sample_rate))
            }),
            lfo_offset,
        }
    }

    #[inline]
    fn process(
        &mut self,
        input: f32,
        gain_a: f32,
        gain_b: f32,
        depth: f32,
        lfos: &[f32; NUM_LFOS],
    ) -> f32 {
        let mut signal = input;
        for (k, ap) in self.stage_a.iter_mut().enumerate() {
            let lfo = lfos[(k + self.lfo_offset) % NUM_LFOS];
            signal = ap.process(signal, gain_a, depth, lfo);
        }
        for (k, ap) in self.stage_b.iter_mut().enumerate() {
            let lfo = lfos[(k + self.lfo_offset) % NUM_LFOS];
            signal = ap.process(signal, gain_b, depth, lfo);
        }
        signal
    }

    fn clear(&mut self) {
        self.stage_a.iter_mut().for_each(ModulatedAllpass::clear);
        self.stage_b.iter_mut().for_each(ModulatedAllpass::clear);
    }

    fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.stage_a
            .iter()
            .chain(self.stage_b.iter())
            .map(ModulatedAllpass::length)
    }
}

/// Stereo diffusion section
#[derive(Debug, Clone)]
pub struct Diffuser {
    left: DiffusionChannel,
    right: DiffusionChannel,
}

impl Diffuser {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: DiffusionChannel::new(sample_rate, &[1.0; STAGE_A_LEN], &[1.0; STAGE_B_LEN], 0),
            right: DiffusionChannel::new(
                sample_rate,
                &RIGHT_RATIOS_A,
                &RIGHT_RATIOS_B,
                RIGHT_LFO_OFFSET,
            ),
        }
    }

    /// Diffuse one stereo sample
    #[inline]
    pub fn process(
        &mut self,
        in_l: f32,
        in_r: f32,
        coeffs: &DiffusionCoefficients,
        lfos: &[f32; NUM_LFOS],
    ) -> (f32, f32) {
        let out_l = self.left.process(
            in_l,
            coeffs.gains_a[0],
            coeffs.gains_b[0],
            coeffs.mod_depth,
            lfos,
        );
        let out_r = self.right.process(
            in_r,
            coeffs.gains_a[1],
            coeffs.gains_b[1],
            coeffs.mod_depth,
            lfos,
        );
        (out_l, out_r)
    }

    /// Nominal allpass lengths in samples, left then right, stage A before stage B
    pub fn lengths(&self) -> (Vec<usize>, Vec<usize>) {
        (self.left.lengths().collect(), self.right.lengths().collect())
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
