//! Anti-aliasing low-pass filter applied before decimation.
//!
//! A 7-tap symmetric FIR with coefficients summing to 1 (unity DC gain).
//! History lives in a fixed-size circular array, so filtering never
//! allocates.

/// Filter coefficients, oldest-to-newest symmetric.
pub const LOW_PASS_TAPS: [f32; 7] = [0.05, 0.1, 0.2, 0.3, 0.2, 0.1, 0.05];

const TAP_COUNT: usize = LOW_PASS_TAPS.len();

/// Streaming FIR low-pass filter.
///
/// ```rust
/// use media_pipeline::audio::LowPassFilter;
///
/// let mut filter = LowPassFilter::new();
/// let mut out = 0.0;
/// for _ in 0..16 {
///     out = filter.process(1.0);
/// }
/// assert!((out - 1.0).abs() < 1e-5);
/// ```
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    history: [f32; TAP_COUNT],
    /// Slot the next sample is written to.
    pos: usize,
}

impl LowPassFilter {
    pub fn new() -> Self {
        Self {
            history: [0.0; TAP_COUNT],
            pos: 0,
        }
    }

    /// Push one sample and return the filtered output.
    pub fn process(&mut self, sample: f32) -> f32 {
        self.history[self.pos] = sample;

        let mut acc = 0.0_f32;
        for (k, tap) in LOW_PASS_TAPS.iter().enumerate() {
            let idx = (self.pos + TAP_COUNT - k) % TAP_COUNT;
            acc += tap * self.history[idx];
        }

        self.pos = (self.pos + 1) % TAP_COUNT;
        acc
    }

    /// Zero the history.
    pub fn reset(&mut self) {
        self.history = [0.0; TAP_COUNT];
        self.pos = 0;
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
