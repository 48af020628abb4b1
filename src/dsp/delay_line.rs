//! Fixed-capacity circular delay line
//!
//! The buffer is allocated once. The logical length can change at any time
//! without touching the buffer or the write index, so parameter updates stay
//! allocation-free.

/// Smallest usable logical length (fractional reads need two taps)
pub const MIN_DELAY_LENGTH: usize = 2;

/// Circular buffer with a logical length and fractional read access
#[derive(Debug, Clone)]
pub struct DelayLine {
    /// Sample storage, sized at construction
    buffer: Vec<f32>,
    /// Logical length (<= capacity); the write index wraps at this length
    len: usize,
    /// Next write position
    write_pos: usize,
}

impl DelayLine {
    /// Create a delay line with `capacity` samples, logical length = capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_DELAY_LENGTH);
        Self {
            buffer: vec![0.0; capacity],
            len: capacity,
            write_pos: 0,
        }
    }

    /// Provisioned capacity in samples
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Current logical length
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the logical length, clamped to [MIN_DELAY_LENGTH, capacity]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.clamp(MIN_DELAY_LENGTH, self.buffer.len());
    }

    /// Write position folded into the current logical length
    #[inline]
    fn head(&self) -> usize {
        self.write_pos % self.len
    }

    /// Read the sample written `delay` samples ago (1 = most recent)
    ///
    /// `delay` is clamped to [1, len]; `len` returns the oldest sample,
    /// the one about to be overwritten.
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let delay = delay.clamp(1, self.len);
        let pos = (self.head() + self.len - delay) % self.len;
        self.buffer[pos]
    }

    /// Linearly interpolated read at a fractional delay in [1, len - 1]
    #[inline]
    pub fn read_fractional(&self, delay: f32) -> f32 {
        let max_delay = (self.len - 1) as f32;
        let delay = if delay.is_finite() {
            delay.clamp(1.0, max_delay)
        } else {
            max_delay
        };
        let whole = delay.floor();
        let frac = delay - whole;
        let index = whole as usize;
        let a = self.read(index);
        let b = self.read(index + 1);
        a + frac * (b - a)
    }

    /// Write a sample at the head and advance modulo the logical length
    #[inline]
    pub fn write(&mut self, value: f32) {
        let head = self.head();
        self.buffer[head] = value;
        self.write_pos = (head + 1) % self.len;
    }

    /// Zero the contents and rewind the write index
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
