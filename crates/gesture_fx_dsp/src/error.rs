//! DSP Error Types

use thiserror::Error;

/// Errors that can occur during DSP operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Cutoff {cutoff}Hz is not below the Nyquist frequency {nyquist}Hz")]
    CutoffAboveNyquist { cutoff: f32, nyquist: f32 },

    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Buffer too short for zero-phase filtering: need more than {padding} samples, got {got}")]
    BufferTooShort { padding: usize, got: usize },

    #[error("Delay of {seconds}s is not representable at {sample_rate}Hz")]
    InvalidDelay { seconds: f32, sample_rate: f32 },
}
