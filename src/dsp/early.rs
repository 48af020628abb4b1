//! Pre-delay and early-reflection network
//!
//! A mono pre-delay feeds two fixed tap banks, one per output channel.
//! The tap pattern ignores size and diffusion: it models the sparse,
//! irregular first echoes of a physical space.

use super::delay_line::DelayLine;

/// Maximum pre-delay provisioned at construction
pub const MAX_PRE_DELAY_MS: f32 = 200.0;

/// Number of taps per early-reflection bank
pub const NUM_TAPS: usize = 8;

/// Left bank tap times in milliseconds
const TAP_TIMES_MS: [f32; NUM_TAPS] = [5.1, 8.3, 12.7, 17.2, 21.9, 27.4, 33.8, 41.2];

/// Left bank tap gains, monotonically decreasing
const TAP_GAINS: [f32; NUM_TAPS] = [0.80, 0.71, 0.62, 0.53, 0.44, 0.35, 0.26, 0.18];

/// Right bank: tap times stretched, gains lowered
const RIGHT_TIME_SCALE: f32 = 1.07;
const RIGHT_GAIN_SCALE: f32 = 0.93;

fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    (ms * sample_rate / 1000.0).round() as usize
}

// ============================================================================
// Pre-delay
// ============================================================================

/// Mono pre-delay sized for [`MAX_PRE_DELAY_MS`]
#[derive(Debug, Clone)]
pub struct PreDelay {
    line: DelayLine,
}

impl PreDelay {
    pub fn new(sample_rate: f32) -> Self {
        let capacity = (MAX_PRE_DELAY_MS * sample_rate / 1000.0).ceil() as usize;
        Self {
            line: DelayLine::new(capacity),
        }
    }

    /// Provisioned capacity in samples
    pub fn capacity(&self) -> usize {
        self.line.capacity()
    }

    /// Write `input` and read it back `offset` samples later
    ///
    /// Offsets wrap at the buffer capacity; 0 passes the input straight through.
    #[inline]
    pub fn process(&mut self, input: f32, offset: usize) -> f32 {
        self.line.write(input);
        self.line.read(offset % self.line.capacity() + 1)
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}

// ============================================================================
// Early Reflections
// ============================================================================

/// One channel's fixed tap pattern
#[derive(Debug, Clone, Copy)]
struct TapBank {
    /// Tap delays in samples (>= 1)
    delays: [usize; NUM_TAPS],
    gains: [f32; NUM_TAPS],
}

impl TapBank {
    fn new(sample_rate: f32, time_scale: f32, gain_scale: f32) -> Self {
        Self {
            delays: std::array::from_fn(|i| {
                ms_to_samples(TAP_TIMES_MS[i] * time_scale, sample_rate).max(1)
            }),
            gains: std::array::from_fn(|i| TAP_GAINS[i] * gain_scale),
        }
    }

    #[inline]
    fn sum(&self, line: &DelayLine) -> f32 {
        // +1: read(1) is the sample just written (zero delay)
        self.delays
            .iter()
            .zip(self.gains.iter())
            .map(|(&delay, &gain)| line.read(delay + 1) * gain)
            .sum()
    }
}

/// Two tap banks reading a short history of the pre-delay output
#[derive(Debug, Clone)]
pub struct EarlyReflections {
    line: DelayLine,
    left: TapBank,
    right: TapBank,
}

impl EarlyReflections {
    pub fn new(sample_rate: f32) -> Self {
        let left = TapBank::new(sample_rate, 1.0, 1.0);
        let right = TapBank::new(sample_rate, RIGHT_TIME_SCALE, RIGHT_GAIN_SCALE);
        let longest = left
            .delays
            .iter()
            .chain(right.delays.iter())
            .copied()
            .max()
            .unwrap_or(1);
        Self {
            line: DelayLine::new(longest + 2),
            left,
            right,
        }
    }

    /// Feed one pre-delayed sample, return the (left, right) early echoes
    #[inline]
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        self.line.write(input);
        (self.left.sum(&self.line), self.right.sum(&self.line))
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SR: f32 = 48000.0;

    #[test]
    fn test_pre_delay_zero_passes_through() {
        let mut pd = PreDelay::new(SR);
        assert_eq!(pd.process(0.5, 0), 0.5);
    }

    #[test]
    fn test_pre_delay_offset() {
        let mut pd = PreDelay::new(SR);
        let offset = 480; // 10 ms
        assert_eq!(pd.process(1.0, offset), 0.0);
        for n in 1..offset {
            assert_eq!(pd.process(0.0, offset), 0.0, "early output at {}", n);
        }
        assert_eq!(pd.process(0.0, offset), 1.0);
    }

    #[test]
    fn test_pre_delay_capacity_and_wrap() {
        let mut pd = PreDelay::new(SR);
        assert_eq!(pd.capacity(), 9600);
        // An offset of exactly one capacity wraps to zero
        assert_eq!(pd.process(0.25, 9600), 0.25);
    }

    #[test]
    fn test_early_reflection_taps() {
        let mut er = EarlyReflections::new(SR);
        let mut left = Vec::new();
        let mut right = Vec::new();
        for n in 0..2400 {
            let (l, r) = er.process(if n == 0 { 1.0 } else { 0.0 });
            left.push(l);
            right.push(r);
        }

        let first_left = ms_to_samples(5.1, SR);
        let first_right = ms_to_samples(5.1 * RIGHT_TIME_SCALE, SR);
        assert_abs_diff_eq!(left[first_left], 0.80);
        assert_abs_diff_eq!(right[first_right], 0.80 * RIGHT_GAIN_SCALE);

        let last_left = ms_to_samples(41.2, SR);
        assert_abs_diff_eq!(left[last_left], 0.18);

        // Eight echoes per channel, nothing before the first tap
        assert_eq!(left.iter().filter(|s| s.abs() > 0.0).count(), NUM_TAPS);
        assert_eq!(right.iter().filter(|s| s.abs() > 0.0).count(), NUM_TAPS);
        assert!(left[..first_left].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gains_decrease() {
        for pair in TAP_GAINS.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }
}
