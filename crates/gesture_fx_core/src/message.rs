//! Engine Events
//!
//! Events flow from the engine (and the device error callback) to whoever
//! drives it: a UI, the CLI host, or tests.

use serde::{Deserialize, Serialize};

use crate::params::StatusView;

/// Events sent from the audio engine to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Playback started
    Started,

    /// Playback stopped
    Stopped,

    /// Error occurred (device errors arrive here asynchronously)
    Error { message: String },

    /// Current parameter snapshot
    StateUpdate(StatusView),
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}
