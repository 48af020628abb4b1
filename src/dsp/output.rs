//! Output stage: stereo taps, width, tone color, limiter and dry/wet mix

use super::fdn::NUM_LINES;
use super::filters::OnePoleLowpass;
use super::mapper::Coefficients;

/// Level of the early reflections blended into each wet channel
pub const EARLY_MIX: f32 = 0.3;

/// Linked limiter threshold on the wet signal
pub const LIMITER_THRESHOLD: f32 = 0.95;

/// Final stage of the engine, one color filter per channel
#[derive(Debug, Clone, Default)]
pub struct OutputStage {
    color_l: OnePoleLowpass,
    color_r: OnePoleLowpass,
}

impl OutputStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine FDN taps, early reflections and the dry input into one output frame
    #[inline]
    pub fn process(
        &mut self,
        reads: &[f32; NUM_LINES],
        early: (f32, f32),
        dry: (f32, f32),
        coeffs: &Coefficients,
    ) -> (f32, f32) {
        // Even lines feed the left tap, odd lines the right
        let tap_l = (reads[0] + reads[2] + reads[4] + reads[6]) * 0.25;
        let tap_r = (reads[1] + reads[3] + reads[5] + reads[7]) * 0.25;
        let wet_l = tap_l + EARLY_MIX * early.0;
        let wet_r = tap_r + EARLY_MIX * early.1;

        // Mid/side width
        let mid = (wet_l + wet_r) * 0.5;
        let side = (wet_l - wet_r) * 0.5 * coeffs.width;
        let mut wet_l = self.color_l.process(mid + side, coeffs.color_coeff);
        let mut wet_r = self.color_r.process(mid - side, coeffs.color_coeff);

        let peak = wet_l.abs().max(wet_r.abs());
        if peak > LIMITER_THRESHOLD {
            let reduction = LIMITER_THRESHOLD / peak;
            wet_l *= reduction;
            wet_r *= reduction;
        }

        let dry_gain = 1.0 - coeffs.mix;
        let out_l = dry.0 * dry_gain + wet_l * coeffs.mix;
        let out_r = dry.1 * dry_gain + wet_r * coeffs.mix;
        (out_l.clamp(-1.0, 1.0), out_r.clamp(-1.0, 1.0))
    }

    pub fn reset(&mut self) {
        self.color_l.reset();
        self.color_r.reset();
    }
}
