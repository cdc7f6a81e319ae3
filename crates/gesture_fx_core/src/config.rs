//! Engine and Stream Configuration

use std::path::Path;

use gesture_fx_dsp::{ECHO_DECAY, ECHO_DELAY_SECS, REVERB_DECAY};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Output stream configuration
///
/// The sample rate always follows the loaded audio source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of device channels; the mono render is copied to each
    pub channels: u16,

    /// Buffer size in frames (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds at the given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.buffer_size as f32 / sample_rate as f32) * 1000.0
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Invalid channel count: {}", self.channels));
        }
        // Zero-phase EQ needs a few dozen samples of history per buffer
        if self.buffer_size < 64 || self.buffer_size > 8192 {
            return Err(format!("Invalid buffer size: {}", self.buffer_size));
        }
        Ok(())
    }
}

/// Step sizes applied by each increase/decrease action
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bass, treble and speech gain step
    pub gain_step: f32,

    /// Volume step
    pub volume_step: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            gain_step: 0.1,
            volume_step: 0.05,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.gain_step > 0.0 && self.gain_step <= 4.0) {
            return Err(format!("Invalid gain step: {}", self.gain_step));
        }
        if !(self.volume_step > 0.0 && self.volume_step <= 2.0) {
            return Err(format!("Invalid volume step: {}", self.volume_step));
        }
        Ok(())
    }
}

/// Fixed parameters of the delay effects
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub echo_delay_secs: f32,
    pub echo_decay: f32,
    pub reverb_decay: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            echo_delay_secs: ECHO_DELAY_SECS,
            echo_decay: ECHO_DECAY,
            reverb_decay: REVERB_DECAY,
        }
    }
}

impl EffectsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.echo_delay_secs > 0.0 && self.echo_delay_secs <= 5.0) {
            return Err(format!("Invalid echo delay: {}s", self.echo_delay_secs));
        }
        for (name, decay) in [("echo", self.echo_decay), ("reverb", self.reverb_decay)] {
            if !(0.0..=1.0).contains(&decay) {
                return Err(format!("Invalid {} decay: {}", name, decay));
            }
        }
        Ok(())
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub stream: StreamConfig,
    pub control: ControlConfig,
    pub effects: EffectsConfig,
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                channels: 2,
                buffer_size: 256, // ~5.3ms at 48kHz
            },
            ..Default::default()
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                channels: 2,
                buffer_size: 2048, // ~43ms at 48kHz
            },
            ..Default::default()
        }
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| EngineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate().map_err(EngineError::ConfigError)?;
        self.control.validate().map_err(EngineError::ConfigError)?;
        self.effects.validate().map_err(EngineError::ConfigError)?;
        Ok(())
    }
}
