//! Gesture FX Core - Audio Engine
//!
//! This crate provides the playback engine for Gesture FX:
//! - A thread-safe parameter store driven by discrete control actions
//! - The per-buffer render pipeline (EQ, echo, reverb, volume, normalize)
//! - A looping playback driver run from the device callback
//! - Output stream management (via CPAL)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Thread                          │
//! │   gestures / UI ──actions──▶ ParameterStore (Mutex, Copy)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ snapshot per buffer
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   AudioSource ──loop──▶ RenderPipeline ──▶ device channels  │
//! │              (No allocations once warmed up)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod engine;
mod error;
mod message;
mod params;
mod pipeline;
mod playback;
mod source;
mod stream;

pub use config::{ControlConfig, EffectsConfig, EngineConfig, StreamConfig};
pub use engine::AudioEngine;
pub use error::{EngineError, EngineResult};
pub use message::Event;
pub use params::{
    Action, EffectStatus, ParameterState, ParameterStore, StatusView, UnknownAction, GAIN_RANGE,
    VOLUME_RANGE,
};
pub use pipeline::RenderPipeline;
pub use playback::PlaybackDriver;
pub use source::AudioSource;
pub use stream::{CpalBackend, OutputBackend, OutputStream, Transport};

// Re-export DSP types for convenience
pub use gesture_fx_dsp::{Band, DspError, EqGains, FilterBank};
