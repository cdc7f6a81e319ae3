//! Delay-Line Effects
//!
//! Echo and a four-tap early-reflection reverb, both feedforward: every tap
//! reads the effect's own input from some fixed time ago.
//!
//! ```text
//! echo:   y[n] = x[n] + decay * x[n - d]
//! reverb: y[n] = x[n] + sum_k decay * 0.8^k * x[n - d_k]
//! ```
//!
//! The history lives in a ring buffer that persists across calls, so a tap
//! longer than the current buffer still lands on the audio that preceded it.
//! A fresh (or reset) effect hears silence before its first sample.

use crate::error::DspError;

/// Default echo delay (seconds)
pub const ECHO_DELAY_SECS: f32 = 0.3;

/// Default echo tap gain
pub const ECHO_DECAY: f32 = 0.5;

/// Default reverb base gain
pub const REVERB_DECAY: f32 = 0.3;

/// Reverb tap delays (seconds), mutually prime in milliseconds
pub const REVERB_TAPS_SECS: [f32; 4] = [0.029, 0.037, 0.041, 0.043];

/// Each successive reverb tap is this much quieter than the previous one
pub const REVERB_TAP_FALLOFF: f32 = 0.8;

/// Convert a delay time to whole samples (truncating)
pub fn delay_samples(seconds: f32, sample_rate: f32) -> Result<usize, DspError> {
    let samples = (seconds * sample_rate).floor();
    if !samples.is_finite() || samples < 1.0 {
        return Err(DspError::InvalidDelay { seconds, sample_rate });
    }
    Ok(samples as usize)
}

/// Fixed-capacity ring buffer of past input samples
///
/// Allocated once at construction; reading and writing never allocate.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Ring able to look back up to `max_delay` samples
    pub fn new(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay.max(1)],
            write_pos: 0,
        }
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len()
    }

    /// Sample pushed `delay` pushes ago (1 = most recent)
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1, len);
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Store a sample and advance the write head
    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Forget all history
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Single-tap feedforward echo
#[derive(Debug, Clone)]
pub struct Echo {
    line: DelayLine,
    delay: usize,
    decay: f32,
}

impl Echo {
    pub fn new(sample_rate: f32, delay_secs: f32, decay: f32) -> Result<Self, DspError> {
        Ok(Self::with_delay_samples(delay_samples(delay_secs, sample_rate)?, decay))
    }

    pub fn with_delay_samples(delay: usize, decay: f32) -> Self {
        let delay = delay.max(1);
        Self {
            line: DelayLine::new(delay),
            delay,
            decay,
        }
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    /// # Real-time Safety
    /// No allocations, O(n).
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let input = *sample;
            let delayed = self.line.read(self.delay);
            self.line.push(input);
            *sample = input + self.decay * delayed;
        }
    }

    pub fn reset(&mut self) {
        self.line.clear();
    }
}

/// Four-tap early-reflection reverb
#[derive(Debug, Clone)]
pub struct Reverb {
    line: DelayLine,
    taps: [(usize, f32); 4],
}

impl Reverb {
    pub fn new(sample_rate: f32, decay: f32) -> Result<Self, DspError> {
        let mut delays = [0usize; 4];
        for (slot, &seconds) in delays.iter_mut().zip(REVERB_TAPS_SECS.iter()) {
            *slot = delay_samples(seconds, sample_rate)?;
        }
        Ok(Self::with_delay_samples(delays, decay))
    }

    /// Taps at explicit sample delays; tap `k` gets `decay * 0.8^k`
    pub fn with_delay_samples(delays: [usize; 4], decay: f32) -> Self {
        let mut taps = [(0usize, 0.0f32); 4];
        let mut gain = decay;
        for (tap, &delay) in taps.iter_mut().zip(delays.iter()) {
            *tap = (delay.max(1), gain);
            gain *= REVERB_TAP_FALLOFF;
        }

        let longest = taps.iter().map(|&(delay, _)| delay).max().unwrap_or(1);
        Self {
            line: DelayLine::new(longest),
            taps,
        }
    }

    pub fn taps(&self) -> &[(usize, f32); 4] {
        &self.taps
    }

    /// # Real-time Safety
    /// No allocations, O(n).
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let input = *sample;
            let wet: f32 = self
                .taps
                .iter()
                .map(|&(delay, gain)| self.line.read(delay) * gain)
                .sum();
            self.line.push(input);
            *sample = input + wet;
        }
    }

    pub fn reset(&mut self) {
        self.line.clear();
    }
}
