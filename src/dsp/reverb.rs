//! Hybrid FDN reverb engine
//!
//! Signal flow per sample:
//! mono downmix → pre-delay → early reflections → input highpass →
//! two-stage diffusion → 8-line FDN → output stage (taps, width, color,
//! limiter, dry/wet).
//!
//! Everything is allocated in the constructor. The process methods never
//! allocate, lock or fail; coefficient changes land only at block boundaries.

use super::diffusion::Diffuser;
use super::early::{EarlyReflections, PreDelay};
use super::effect::Effect;
use super::fdn::{mixing_matrix, Fdn};
use super::filters::OnePoleHighpass;
use super::lfo::LfoBank;
use super::mapper::{Coefficients, ParameterMapper};
use super::output::OutputStage;
use super::params::{ParamUpdate, ReverbParams};
use crate::engine::handoff::{self, CoefficientInbox, ReverbController};
use crate::engine::AudioBuffer;
use crate::error::{ReverieError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default LFO block granularity in frames
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 512;

/// Default seed for the instance-owned random sources
pub const DEFAULT_SEED: u64 = 0x5245_5645_5249_4500;

/// Input magnitude ceiling; keeps every intermediate sum finite
const INPUT_LIMIT: f32 = 1.0e6;

// ============================================================================
// Configuration
// ============================================================================

/// Construction-time engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Sampling rate in Hz (> 0)
    pub sample_rate: u32,
    /// Longest run of frames processed with one LFO snapshot
    pub max_block_size: usize,
    /// Seed for the mixing matrix, damping jitter and dither
    pub seed: u64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            seed: DEFAULT_SEED,
        }
    }
}

impl ReverbConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }
}

#[inline]
fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-INPUT_LIMIT, INPUT_LIMIT)
    } else {
        0.0
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Stereo reverb engine
#[derive(Debug)]
pub struct Reverb {
    config: ReverbConfig,
    params: ReverbParams,
    mapper: ParameterMapper,
    coeffs: Coefficients,

    pre_delay: PreDelay,
    early: EarlyReflections,
    input_highpass: [OnePoleHighpass; 2],
    diffuser: Diffuser,
    lfos: LfoBank,
    fdn: Fdn,
    output: OutputStage,

    /// Dither source
    rng: ChaCha8Rng,
    /// Receiving end of the attached controller, if any
    inbox: Option<CoefficientInbox>,
}

impl Reverb {
    /// Create an engine at `sample_rate` with default parameters
    pub fn new(sample_rate: u32) -> Result<Self> {
        Self::with_config(ReverbConfig::with_sample_rate(sample_rate))
    }

    /// Create an engine from a full configuration
    pub fn with_config(config: ReverbConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(ReverieError::InvalidSampleRate {
                sample_rate: config.sample_rate as f64,
            });
        }
        let config = ReverbConfig {
            max_block_size: config.max_block_size.max(1),
            ..config
        };
        let sr = config.sample_rate as f32;

        // One seeded stream hands out the matrix and the sub-seeds
        let mut seeder = ChaCha8Rng::seed_from_u64(config.seed);
        let matrix = mixing_matrix(&mut seeder);
        let mut mapper = ParameterMapper::new(sr, seeder.random());
        let rng = ChaCha8Rng::seed_from_u64(seeder.random());

        let params = ReverbParams::default();
        let coeffs = mapper.map(&params);
        let fdn = Fdn::new(mapper.capacities(), matrix);

        let mut reverb = Self {
            config,
            params,
            mapper,
            coeffs,
            pre_delay: PreDelay::new(sr),
            early: EarlyReflections::new(sr),
            input_highpass: [OnePoleHighpass::default(); 2],
            diffuser: Diffuser::new(sr),
            lfos: LfoBank::new(),
            fdn,
            output: OutputStage::new(),
            rng,
            inbox: None,
        };
        reverb.apply_coefficients(coeffs);

        log::debug!(
            "Created reverb: {} Hz, pre-delay capacity {} samples, FDN capacities {:?}",
            config.sample_rate,
            reverb.pre_delay.capacity(),
            reverb.mapper.capacities()
        );
        Ok(reverb)
    }

    /// Replace the parameter record (builder style)
    pub fn with_params(mut self, params: ReverbParams) -> Self {
        self.params = params;
        let coeffs = self.mapper.map(&self.params);
        self.apply_coefficients(coeffs);
        self
    }

    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    /// Coefficient snapshot currently in use
    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    /// Merge a partial record and remap synchronously
    ///
    /// Call between blocks. An attached controller keeps its own copy of the
    /// parameters and is not told about this change.
    pub fn update_parameters(&mut self, update: &ParamUpdate) {
        self.params.apply(update);
        let coeffs = self.mapper.map(&self.params);
        self.apply_coefficients(coeffs);
    }

    /// Hand out a controller for a non-real-time thread
    ///
    /// Any previously attached controller is detached.
    pub fn controller(&mut self) -> ReverbController {
        let (controller, inbox) = handoff::channel(self.mapper.clone(), self.params);
        if self.inbox.replace(inbox).is_some() {
            log::debug!("Replaced reverb controller; previous controller detached");
        }
        controller
    }

    /// Reallocate every buffer for a new sample rate
    ///
    /// Not real-time safe. Parameters are kept and remapped; internal state is
    /// cleared and any controller is detached.
    pub fn reconfigure(&mut self, sample_rate: u32) -> Result<()> {
        let config = ReverbConfig {
            sample_rate,
            ..self.config
        };
        let rebuilt = Self::with_config(config)?.with_params(self.params);
        log::info!(
            "Reconfigured reverb: {} Hz -> {} Hz",
            self.config.sample_rate,
            sample_rate
        );
        *self = rebuilt;
        Ok(())
    }

    /// Clear all audio state; parameters and coefficients are kept
    pub fn reset(&mut self) {
        self.pre_delay.clear();
        self.early.clear();
        for hp in &mut self.input_highpass {
            hp.reset();
        }
        self.diffuser.clear();
        self.lfos.reset();
        self.fdn.clear();
        self.output.reset();
    }

    fn apply_coefficients(&mut self, coeffs: Coefficients) {
        self.params = coeffs.params;
        self.fdn.set_lengths(&coeffs.fdn.line_lengths);
        self.lfos.set_rates(&coeffs.lfo_rates);
        self.coeffs = coeffs;
    }

    /// Pick up the newest published snapshot, if any
    #[inline]
    fn begin_block(&mut self) -> [f32; 4] {
        if let Some(coeffs) = self.inbox.as_mut().and_then(CoefficientInbox::latest) {
            self.apply_coefficients(coeffs);
        }
        self.lfos.snapshot()
    }

    #[inline]
    fn render_frame(&mut self, in_l: f32, in_r: f32, lfos: &[f32; 4]) -> (f32, f32) {
        let in_l = sanitize(in_l);
        let in_r = sanitize(in_r);
        let c = &self.coeffs;

        let predelayed = self
            .pre_delay
            .process((in_l + in_r) * 0.5, c.pre_delay_samples);
        let (early_l, early_r) = self.early.process(predelayed);

        let diff_in_l =
            self.input_highpass[0].process(0.5 * (predelayed + early_l), c.input_highpass_pole);
        let diff_in_r =
            self.input_highpass[1].process(0.5 * (predelayed + early_r), c.input_highpass_pole);
        let (diff_l, diff_r) = self
            .diffuser
            .process(diff_in_l, diff_in_r, &c.diffusion, lfos);

        let reads = self.fdn.process(diff_l, diff_r, &c.fdn, lfos, &mut self.rng);
        self.output
            .process(&reads, (early_l, early_r), (in_l, in_r), c)
    }

    /// Process one block of planar input into stereo output
    ///
    /// One input channel is mirrored to both sides; channels beyond the
    /// second are ignored. With no input channels the outputs are zeroed and
    /// the engine state is left untouched. Frames past the shortest slice are
    /// zeroed. Returns the number of frames processed.
    pub fn process(&mut self, inputs: &[&[f32]], out_l: &mut [f32], out_r: &mut [f32]) -> usize {
        let (left, right) = match inputs {
            [] => {
                out_l.fill(0.0);
                out_r.fill(0.0);
                return 0;
            }
            [mono] => (*mono, *mono),
            [left, right, ..] => (*left, *right),
        };

        let frames = left
            .len()
            .min(right.len())
            .min(out_l.len())
            .min(out_r.len());

        let mut start = 0;
        while start < frames {
            let end = (start + self.config.max_block_size).min(frames);
            let lfos = self.begin_block();
            for i in start..end {
                let (l, r) = self.render_frame(left[i], right[i], &lfos);
                out_l[i] = l;
                out_r[i] = r;
            }
            self.lfos.advance(end - start);
            start = end;
        }

        out_l[frames..].fill(0.0);
        out_r[frames..].fill(0.0);
        frames
    }

    /// Process a stereo buffer in place
    ///
    /// Processes the common length of both slices and returns it.
    pub fn process_in_place(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let frames = left.len().min(right.len());
        let mut start = 0;
        while start < frames {
            let end = (start + self.config.max_block_size).min(frames);
            let lfos = self.begin_block();
            for i in start..end {
                let (l, r) = self.render_frame(left[i], right[i], &lfos);
                left[i] = l;
                right[i] = r;
            }
            self.lfos.advance(end - start);
            start = end;
        }
        frames
    }
}

// ============================================================================
// Effect Implementation
// ============================================================================

impl Effect for Reverb {
    fn process(&mut self, buffer: &mut AudioBuffer) {
        if buffer.is_empty() {
            return;
        }
        buffer.upmix_to_stereo();
        // Channels past the second pass through untouched
        if let Some((left, right)) = buffer.stereo_mut() {
            self.process_in_place(left, right);
        }
    }

    fn prepare(&mut self, sample_rate: u32, max_block_size: usize) -> Result<()> {
        if sample_rate == 0 {
            log::warn!("Rejected sample rate {} in prepare", sample_rate);
            return Err(ReverieError::InvalidSampleRate {
                sample_rate: sample_rate as f64,
            });
        }
        if sample_rate != self.config.sample_rate {
            self.reconfigure(sample_rate)?;
        }
        self.config.max_block_size = max_block_size.max(1);
        Ok(())
    }

    fn reset(&mut self) {
        Reverb::reset(self);
    }

    fn effect_type(&self) -> &'static str {
        "reverb"
    }

    fn display_name(&self) -> &str {
        "Reverb"
    }

    fn to_json(&self) -> Result<Value> {
        Ok(serde_json::json!({
            "effect_type": self.effect_type(),
            "config": serde_json::to_value(self.config)?,
            "params": serde_json::to_value(self.params)?,
        }))
    }

    fn from_json(&mut self, json: &Value) -> Result<()> {
        if let Some(params) = json.get("params") {
            let update = ParamUpdate::from_json(params)?;
            self.update_parameters(&update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::params::Mode;
    use crate::engine::ChannelLayout;

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let err = Reverb::new(0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SAMPLE_RATE");
    }

    #[test]
    fn test_config_defaults_and_serde() {
        let config: ReverbConfig = serde_json::from_str(r#"{"sample_rate": 44100}"#).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.max_block_size, DEFAULT_MAX_BLOCK_SIZE);
        assert_eq!(config.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_no_input_channels_is_noop() {
        let mut reverb = Reverb::new(48000).unwrap();
        let mut out_l = vec![0.5; 64];
        let mut out_r = vec![0.5; 64];
        assert_eq!(reverb.process(&[], &mut out_l, &mut out_r), 0);
        assert!(out_l.iter().chain(out_r.iter()).all(|&s| s == 0.0));

        // State untouched: a fresh engine renders the same block
        let input = impulse(256);
        let mut fresh = Reverb::new(48000).unwrap();
        let (mut a_l, mut a_r) = (vec![0.0; 256], vec![0.0; 256]);
        let (mut b_l, mut b_r) = (vec![0.0; 256], vec![0.0; 256]);
        reverb.process(&[&input[..], &input[..]], &mut a_l, &mut a_r);
        fresh.process(&[&input[..], &input[..]], &mut b_l, &mut b_r);
        assert_eq!(a_l, b_l);
        assert_eq!(a_r, b_r);
    }

    #[test]
    fn test_zero_length_input() {
        let mut reverb = Reverb::new(48000).unwrap();
        let empty: [f32; 0] = [];
        let mut out_l = vec![1.0; 16];
        let mut out_r = vec![1.0; 16];
        assert_eq!(reverb.process(&[&empty[..], &empty[..]], &mut out_l, &mut out_r), 0);
        assert!(out_l.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mono_input_is_mirrored() {
        let input = impulse(4096);
        let mut mono = Reverb::new(48000).unwrap();
        let mut stereo = Reverb::new(48000).unwrap();
        let (mut m_l, mut m_r) = (vec![0.0; 4096], vec![0.0; 4096]);
        let (mut s_l, mut s_r) = (vec![0.0; 4096], vec![0.0; 4096]);
        assert_eq!(mono.process(&[&input[..]], &mut m_l, &mut m_r), 4096);
        stereo.process(&[&input[..], &input[..]], &mut s_l, &mut s_r);
        assert_eq!(m_l, s_l);
        assert_eq!(m_r, s_r);
    }

    #[test]
    fn test_block_splitting_is_transparent() {
        let input: Vec<f32> = (0..2048).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        let mut whole = Reverb::new(48000).unwrap();
        let mut split = Reverb::new(48000).unwrap();

        let (mut w_l, mut w_r) = (vec![0.0; 2048], vec![0.0; 2048]);
        whole.process(&[&input[..], &input[..]], &mut w_l, &mut w_r);

        let (mut s_l, mut s_r) = (vec![0.0; 2048], vec![0.0; 2048]);
        for start in (0..2048).step_by(DEFAULT_MAX_BLOCK_SIZE) {
            let end = start + DEFAULT_MAX_BLOCK_SIZE;
            split.process(
                &[&input[start..end], &input[start..end]],
                &mut s_l[start..end],
                &mut s_r[start..end],
            );
        }
        assert_eq!(w_l, s_l);
        assert_eq!(w_r, s_r);
    }

    #[test]
    fn test_in_place_matches_process() {
        let input: Vec<f32> = (0..3000).map(|i| ((i as f32) * 0.01).cos() * 0.3).collect();
        let mut a = Reverb::new(48000).unwrap();
        let mut b = Reverb::new(48000).unwrap();
        let (mut out_l, mut out_r) = (vec![0.0; 3000], vec![0.0; 3000]);
        a.process(&[&input[..], &input[..]], &mut out_l, &mut out_r);

        let mut left = input.clone();
        let mut right = input.clone();
        assert_eq!(b.process_in_place(&mut left, &mut right), 3000);
        assert_eq!(left, out_l);
        assert_eq!(right, out_r);
    }

    #[test]
    fn test_short_output_tail_zeroed() {
        let mut reverb = Reverb::new(48000).unwrap();
        let input = vec![0.5; 100];
        let mut out_l = vec![9.0; 128];
        let mut out_r = vec![9.0; 128];
        assert_eq!(reverb.process(&[&input[..], &input[..]], &mut out_l, &mut out_r), 100);
        assert!(out_l[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_non_finite_input_treated_as_silence() {
        let mut reverb = Reverb::new(48000).unwrap();
        let input = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.0];
        let mut out_l = vec![0.0; 4];
        let mut out_r = vec![0.0; 4];
        reverb.process(&[&input[..]], &mut out_l, &mut out_r);
        assert!(out_l.iter().chain(out_r.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_update_parameters_merges() {
        let mut reverb = Reverb::new(48000).unwrap();
        reverb.update_parameters(&ParamUpdate::new().decay(5.0).mode(Mode::Plate));
        assert_eq!(reverb.params().decay, 5.0);
        assert_eq!(reverb.params().mode, Mode::Plate);
        assert_eq!(reverb.params().mix, ReverbParams::default().mix);
        assert_eq!(reverb.coefficients().params, *reverb.params());
    }

    #[test]
    fn test_controller_applies_at_block_boundary() {
        let mut reverb = Reverb::new(48000).unwrap();
        let mut controller = reverb.controller();
        controller.update(&ParamUpdate::new().mix(1.0)).unwrap();

        // Not applied until the next block starts
        assert_eq!(reverb.params().mix, ReverbParams::default().mix);

        let input = vec![0.0; 32];
        let (mut l, mut r) = (vec![0.0; 32], vec![0.0; 32]);
        reverb.process(&[&input[..]], &mut l, &mut r);
        assert_eq!(reverb.params().mix, 1.0);
        assert_eq!(reverb.coefficients().mix, 1.0);
    }

    #[test]
    fn test_new_controller_detaches_old() {
        let mut reverb = Reverb::new(48000).unwrap();
        let old = reverb.controller();
        let new = reverb.controller();
        assert!(!old.is_attached());
        assert!(new.is_attached());
    }

    #[test]
    fn test_reconfigure() {
        let mut reverb = Reverb::new(48000).unwrap();
        reverb.update_parameters(&ParamUpdate::new().size(0.9));
        let mut controller = reverb.controller();

        reverb.reconfigure(96000).unwrap();
        assert_eq!(reverb.sample_rate(), 96000);
        assert_eq!(reverb.params().size, 0.9);
        assert_eq!(reverb.coefficients().sample_rate, 96000.0);
        assert!(!controller.is_attached());
        assert!(controller.update(&ParamUpdate::new().mix(0.1)).is_err());

        assert!(reverb.reconfigure(0).is_err());
        assert_eq!(reverb.sample_rate(), 96000);
    }

    #[test]
    fn test_reset_restores_initial_output() {
        let input = impulse(2048);
        let mut reverb = Reverb::new(48000).unwrap();
        let (mut first_l, mut first_r) = (vec![0.0; 2048], vec![0.0; 2048]);
        reverb.process(&[&input[..]], &mut first_l, &mut first_r);

        reverb.reset();
        let (mut second_l, mut second_r) = (vec![0.0; 2048], vec![0.0; 2048]);
        reverb.process(&[&input[..]], &mut second_l, &mut second_r);
        assert_eq!(first_l, second_l);
        assert_eq!(first_r, second_r);
    }

    #[test]
    fn test_effect_upmixes_mono() {
        let mut reverb = Reverb::new(48000).unwrap();
        let mut buffer = AudioBuffer::new(1024, ChannelLayout::Mono);
        buffer.channel_mut(0)[0] = 1.0;
        Effect::process(&mut reverb, &mut buffer);
        assert_eq!(buffer.channels(), 2);
        assert!(buffer.is_finite());
    }

    #[test]
    fn test_effect_ignores_extra_channels() {
        let mut input = vec![0.0; 2048];
        input[0] = 1.0;
        let extra: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.01).sin()).collect();

        let mut stereo = AudioBuffer::from_channels(vec![input.clone(), input.clone()], 48000)
            .unwrap();
        let mut surround = AudioBuffer {
            samples: vec![input.clone(), input, extra.clone()],
            sample_rate: 48000,
        };

        Effect::process(&mut Reverb::new(48000).unwrap(), &mut stereo);
        Effect::process(&mut Reverb::new(48000).unwrap(), &mut surround);

        assert_eq!(surround.channel(0), stereo.channel(0));
        assert_eq!(surround.channel(1), stereo.channel(1));
        assert_eq!(surround.channel(2), &extra[..]);
    }

    #[test]
    fn test_effect_prepare() {
        let mut reverb = Reverb::new(48000).unwrap();
        assert!(reverb.prepare(0, 256).is_err());
        reverb.prepare(44100, 128).unwrap();
        assert_eq!(reverb.sample_rate(), 44100);
        assert_eq!(reverb.config().max_block_size, 128);
    }

    #[test]
    fn test_effect_json_roundtrip() {
        let mut source = Reverb::new(48000).unwrap();
        source.update_parameters(&ParamUpdate::new().decay(6.5).mode(Mode::Ambient));
        let json = source.to_json().unwrap();
        assert_eq!(json["effect_type"], "reverb");
        assert_eq!(json["params"]["mode"], "ambient");

        let mut target = Reverb::new(48000).unwrap();
        target.from_json(&json).unwrap();
        assert_eq!(target.params(), source.params());
    }
}
