//! Shared helpers for the integration and audio quality suites

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reverie::engine::buffer::{calculate_peak, calculate_rms};
use reverie::{AudioBuffer, Reverb, ReverbConfig, ReverbParams};

pub const SAMPLE_RATE: u32 = 48000;

/// Engine at `sample_rate` with the given parameters and a fixed seed
pub fn engine(sample_rate: u32, params: ReverbParams) -> Reverb {
    Reverb::with_config(ReverbConfig::with_sample_rate(sample_rate))
        .expect("valid sample rate")
        .with_params(params)
}

/// Unit impulse at sample 0 followed by silence
pub fn impulse(len: usize) -> Vec<f32> {
    let mut signal = vec![0.0; len];
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

/// Uniform noise in [-amplitude, amplitude] from a seeded generator
pub fn noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.random_range(-amplitude..=amplitude))
        .collect()
}

/// Sine wave at `frequency` Hz
pub fn sine(frequency: f32, amplitude: f32, len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Run `left`/`right` through the engine in `block_size` chunks
pub fn render(
    reverb: &mut Reverb,
    left: &[f32],
    right: &[f32],
    block_size: usize,
) -> (Vec<f32>, Vec<f32>) {
    let len = left.len().min(right.len());
    let mut out_l = vec![0.0; len];
    let mut out_r = vec![0.0; len];
    let mut start = 0;
    while start < len {
        let end = (start + block_size).min(len);
        reverb.process(
            &[&left[start..end], &right[start..end]],
            &mut out_l[start..end],
            &mut out_r[start..end],
        );
        start = end;
    }
    (out_l, out_r)
}

// ============================================================================
// Measurement
// ============================================================================

/// RMS level of one channel in dBFS (-inf for silence)
pub fn level_db(signal: &[f32]) -> f32 {
    calculate_rms(&mono_buffer(signal))
}

/// Peak level of a stereo render in dBFS
pub fn peak_db(left: &[f32], right: &[f32]) -> f32 {
    let buffer = AudioBuffer::from_channels(vec![left.to_vec(), right.to_vec()], SAMPLE_RATE)
        .expect("equal channel lengths");
    calculate_peak(&buffer)
}

fn mono_buffer(signal: &[f32]) -> AudioBuffer {
    AudioBuffer::from_channels(vec![signal.to_vec()], SAMPLE_RATE).expect("one channel")
}

/// Pearson correlation between two channels
pub fn correlation(a: &[f32], b: &[f32]) -> f64 {
    let (mut ab, mut aa, mut bb) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        ab += x * y;
        aa += x * x;
        bb += y * y;
    }
    if aa == 0.0 || bb == 0.0 {
        return 0.0;
    }
    ab / (aa * bb).sqrt()
}

/// RBJ band-pass (constant 0 dB peak gain) with one-octave bandwidth
pub fn octave_bandpass(signal: &[f64], center_hz: f64, sample_rate: f64) -> Vec<f64> {
    let q = std::f64::consts::SQRT_2;
    let w0 = 2.0 * std::f64::consts::PI * center_hz / sample_rate;
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    let (b0, b2) = (alpha / a0, -alpha / a0);
    let a1 = -2.0 * w0.cos() / a0;
    let a2 = (1.0 - alpha) / a0;

    let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
    signal
        .iter()
        .map(|&x| {
            let y = b0 * x + b2 * x2 - a1 * y1 - a2 * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            y
        })
        .collect()
}

/// Schroeder backward-integrated energy decay curve in dB (0 dB at the start)
pub fn energy_decay_curve(signal: &[f64]) -> Vec<f64> {
    let mut curve = vec![0.0; signal.len()];
    let mut acc = 0.0;
    for (i, &s) in signal.iter().enumerate().rev() {
        acc += s * s;
        curve[i] = acc;
    }
    let total = curve.first().copied().unwrap_or(0.0);
    curve
        .iter()
        .map(|&e| {
            if e > 0.0 && total > 0.0 {
                10.0 * (e / total).log10()
            } else {
                -300.0
            }
        })
        .collect()
}

/// Least-squares slope of `curve` between two times, in dB per second
pub fn decay_slope(curve: &[f64], start_secs: f64, end_secs: f64, sample_rate: f64) -> f64 {
    let i0 = (start_secs * sample_rate) as usize;
    let i1 = ((end_secs * sample_rate) as usize).min(curve.len());
    let n = (i1 - i0) as f64;
    let mean_t = (i0..i1).map(|i| i as f64 / sample_rate).sum::<f64>() / n;
    let mean_y = curve[i0..i1].iter().sum::<f64>() / n;
    let (mut num, mut den) = (0.0, 0.0);
    for i in i0..i1 {
        let dt = i as f64 / sample_rate - mean_t;
        num += dt * (curve[i] - mean_y);
        den += dt * dt;
    }
    num / den
}

/// RT60 estimated from the 500 Hz band of an impulse response (L + R)
pub fn estimate_rt60(left: &[f32], right: &[f32], sample_rate: u32) -> f64 {
    let sr = sample_rate as f64;
    let sum: Vec<f64> = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| l as f64 + r as f64)
        .collect();
    let band = octave_bandpass(&sum, 500.0, sr);
    let curve = energy_decay_curve(&band);
    let slope = decay_slope(&curve, 0.25, 1.25, sr);
    -60.0 / slope
}
