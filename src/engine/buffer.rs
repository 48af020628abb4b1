//! Planar audio buffers
//!
//! Used by the offline [`Effect`](crate::dsp::Effect) path and by tests.
//! The real-time entry point works on plain slices instead.

use crate::error::{ReverieError, Result};

/// Default sample rate for new buffers
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

// ============================================================================
// Level Helpers
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels (-inf for zero)
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// RMS level over all channels in dB; -inf for empty or silent buffers
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total = buffer.channels() * buffer.len();
    if total == 0 {
        return f32::NEG_INFINITY;
    }
    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flatten()
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    linear_to_db((sum_squares / total as f64).sqrt() as f32)
}

/// Peak level over all channels in dB
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flatten()
        .fold(0.0_f32, |acc, &s| acc.max(s.abs()));
    linear_to_db(peak)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Channel configuration accepted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// One channel, mirrored to both reverb inputs
    Mono,
    #[default]
    Stereo,
}

impl ChannelLayout {
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Non-interleaved f32 audio, one `Vec` per channel
///
/// # Example
/// ```
/// use reverie::engine::buffer::{AudioBuffer, ChannelLayout};
///
/// let buffer = AudioBuffer::new(480, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 480);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Silent buffer at [`DEFAULT_SAMPLE_RATE`]
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        Self {
            samples: vec![vec![0.0; num_samples]; layout.num_channels()],
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Wrap existing channel data; every channel must have the same length
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(ReverieError::InvalidAudio {
                reason: format!("{} channels given, expected 1 or 2", samples.len()),
            });
        }
        let len = samples[0].len();
        if samples.iter().any(|ch| ch.len() != len) {
            return Err(ReverieError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Split interleaved frames (L, R, L, R, ...) into channels
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();
        if interleaved.len() % num_channels != 0 {
            return Err(ReverieError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (channel, &sample) in samples.iter_mut().zip(frame.iter()) {
                channel.push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());
        for index in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[index]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// First two channels as mutable left/right slices
    ///
    /// Returns `None` for mono or channel-less buffers.
    pub fn stereo_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        match self.samples.as_mut_slice() {
            [left, right, ..] => Some((left.as_mut_slice(), right.as_mut_slice())),
            _ => None,
        }
    }

    /// Duplicate a mono channel into a stereo pair; stereo buffers are untouched
    pub fn upmix_to_stereo(&mut self) {
        if self.channels() == 1 {
            let mono = self.samples[0].clone();
            self.samples.push(mono);
        }
    }

    /// True when no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo)
    }
}
