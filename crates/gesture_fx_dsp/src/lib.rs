//! Gesture FX DSP - Digital Signal Processing Module
//!
//! This crate provides the signal path used by the Gesture FX engine:
//! - Three-band additive EQ (bass / treble / speech) with zero-phase Butterworth filters
//! - Feedforward echo and four-tap reverb over persistent ring buffers
//! - Volume and buffer-local peak normalization
//!
//! # Architecture
//!
//! Everything here operates on mono `f32` buffers in place. Filter designs and
//! ring buffers are allocated up front; the per-buffer path does not allocate
//! once scratch space has been reserved for the largest callback size.

mod delay;
mod eq;
mod error;
mod normalize;

pub use delay::{
    delay_samples, DelayLine, Echo, Reverb, ECHO_DECAY, ECHO_DELAY_SECS, REVERB_DECAY,
    REVERB_TAPS_SECS, REVERB_TAP_FALLOFF,
};
pub use eq::{
    Band, EqGains, FilterBank, BASS_CUTOFF_HZ, GAIN_THRESHOLD, SPEECH_BAND_HZ, TREBLE_CUTOFF_HZ,
};
pub use error::DspError;
pub use normalize::{apply_gain, peak, peak_normalize};
