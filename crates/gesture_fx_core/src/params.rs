//! Parameter Store
//!
//! The single point where the control side (gesture tracker, UI, tests)
//! changes the sound. Every mutation goes through a named [`Action`] with a
//! bounded step and a clamp, so the audio side can never observe an
//! out-of-range value.
//!
//! The state is a small `Copy` struct behind a `parking_lot::Mutex`. The lock
//! is held only for one field update or one whole-struct copy, never while
//! audio is being processed, so the audio callback waits at most for a handful
//! of instructions. Because readers always copy the whole struct, a render can
//! never mix fields from before and after an action.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ControlConfig;
use gesture_fx_dsp::EqGains;

/// Gain range for the bass, treble and speech bands
pub const GAIN_RANGE: (f32, f32) = (-2.0, 2.0);

/// Volume range (1.0 = unity)
pub const VOLUME_RANGE: (f32, f32) = (0.0, 2.0);

/// The control vocabulary understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    IncreaseBass,
    DecreaseBass,
    IncreaseTreble,
    DecreaseTreble,
    IncreaseSpeech,
    DecreaseSpeech,
    IncreaseVolume,
    DecreaseVolume,
    ToggleEcho,
    ToggleReverb,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::IncreaseBass,
        Action::DecreaseBass,
        Action::IncreaseTreble,
        Action::DecreaseTreble,
        Action::IncreaseSpeech,
        Action::DecreaseSpeech,
        Action::IncreaseVolume,
        Action::DecreaseVolume,
        Action::ToggleEcho,
        Action::ToggleReverb,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::IncreaseBass => "increase_bass",
            Action::DecreaseBass => "decrease_bass",
            Action::IncreaseTreble => "increase_treble",
            Action::DecreaseTreble => "decrease_treble",
            Action::IncreaseSpeech => "increase_speech",
            Action::DecreaseSpeech => "decrease_speech",
            Action::IncreaseVolume => "increase_volume",
            Action::DecreaseVolume => "decrease_volume",
            Action::ToggleEcho => "toggle_echo",
            Action::ToggleReverb => "toggle_reverb",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name outside the action vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Everything the renderer needs to know about the current sound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    pub bass_gain: f32,
    pub treble_gain: f32,
    pub speech_gain: f32,
    pub volume: f32,
    pub echo_enabled: bool,
    pub reverb_enabled: bool,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            bass_gain: 0.0,
            treble_gain: 0.0,
            speech_gain: 0.0,
            volume: 1.0,
            echo_enabled: false,
            reverb_enabled: false,
        }
    }
}

impl ParameterState {
    pub fn eq_gains(&self) -> EqGains {
        EqGains::new(self.bass_gain, self.treble_gain, self.speech_gain)
    }

    /// Apply one action with the given step sizes
    pub fn apply(&mut self, action: Action, control: &ControlConfig) {
        let (gain_min, gain_max) = GAIN_RANGE;
        let (volume_min, volume_max) = VOLUME_RANGE;
        let gain = control.gain_step;
        let volume = control.volume_step;

        match action {
            Action::IncreaseBass => self.bass_gain = (self.bass_gain + gain).min(gain_max),
            Action::DecreaseBass => self.bass_gain = (self.bass_gain - gain).max(gain_min),
            Action::IncreaseTreble => self.treble_gain = (self.treble_gain + gain).min(gain_max),
            Action::DecreaseTreble => self.treble_gain = (self.treble_gain - gain).max(gain_min),
            Action::IncreaseSpeech => self.speech_gain = (self.speech_gain + gain).min(gain_max),
            Action::DecreaseSpeech => self.speech_gain = (self.speech_gain - gain).max(gain_min),
            Action::IncreaseVolume => self.volume = (self.volume + volume).min(volume_max),
            Action::DecreaseVolume => self.volume = (self.volume - volume).max(volume_min),
            Action::ToggleEcho => self.echo_enabled = !self.echo_enabled,
            Action::ToggleReverb => self.reverb_enabled = !self.reverb_enabled,
        }
    }
}

/// On/off token shown to display collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectStatus {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl From<bool> for EffectStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            EffectStatus::On
        } else {
            EffectStatus::Off
        }
    }
}

impl fmt::Display for EffectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectStatus::On => "ON",
            EffectStatus::Off => "OFF",
        })
    }
}

/// Display-friendly snapshot: values rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub bass: f32,
    pub treble: f32,
    pub speech: f32,
    pub volume: f32,
    pub echo: EffectStatus,
    pub reverb: EffectStatus,
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

impl From<ParameterState> for StatusView {
    fn from(state: ParameterState) -> Self {
        Self {
            bass: round2(state.bass_gain),
            treble: round2(state.treble_gain),
            speech: round2(state.speech_gain),
            volume: round2(state.volume),
            echo: state.echo_enabled.into(),
            reverb: state.reverb_enabled.into(),
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bass: {:+.1} | Treble: {:+.1} | Speech: {:+.1} | Volume: {:.2} | Echo: {} | Reverb: {}",
            self.bass, self.treble, self.speech, self.volume, self.echo, self.reverb
        )
    }
}

/// Thread-safe parameter store shared by the control and audio sides
///
/// Owned explicitly (usually behind an `Arc`), never global, so several
/// engines can coexist.
#[derive(Debug)]
pub struct ParameterStore {
    state: Mutex<ParameterState>,
    control: ControlConfig,
}

impl ParameterStore {
    pub fn new(control: ControlConfig) -> Self {
        Self {
            state: Mutex::new(ParameterState::default()),
            control,
        }
    }

    /// Apply a control action
    ///
    /// O(1); the lock covers a single field update.
    pub fn apply(&self, action: Action) {
        self.state.lock().apply(action, &self.control);
    }

    /// Apply an action by name, ignoring names outside the vocabulary
    ///
    /// Returns whether the name was recognized.
    pub fn apply_named(&self, name: &str) -> bool {
        match name.parse::<Action>() {
            Ok(action) => {
                self.apply(action);
                true
            }
            Err(_) => false,
        }
    }

    /// Consistent copy of the whole state
    #[inline]
    pub fn snapshot(&self) -> ParameterState {
        *self.state.lock()
    }

    pub fn status_view(&self) -> StatusView {
        self.snapshot().into()
    }

    pub fn control(&self) -> &ControlConfig {
        &self.control
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(ControlConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_state() {
        let store = ParameterStore::default();
        let state = store.snapshot();

        assert_eq!(state.bass_gain, 0.0);
        assert_eq!(state.treble_gain, 0.0);
        assert_eq!(state.speech_gain, 0.0);
        assert_eq!(state.volume, 1.0);
        assert!(!state.echo_enabled);
        assert!(!state.reverb_enabled);
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
            assert_eq!(action.to_string(), action.as_str());
        }
    }

    #[test]
    fn test_unknown_action_parse() {
        let err = "wave_hello".parse::<Action>().unwrap_err();
        assert_eq!(err, UnknownAction("wave_hello".into()));
        assert!(err.to_string().contains("wave_hello"));
    }

    #[test]
    fn test_unknown_action_ignored() {
        let store = ParameterStore::default();
        let before = store.snapshot();

        assert!(!store.apply_named("wave_hello"));
        assert!(!store.apply_named(""));
        assert!(!store.apply_named("INCREASE_BASS"));

        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_single_steps() {
        let store = ParameterStore::default();

        store.apply(Action::IncreaseBass);
        store.apply(Action::DecreaseTreble);
        store.apply(Action::IncreaseSpeech);
        store.apply(Action::IncreaseSpeech);
        store.apply(Action::DecreaseVolume);

        let state = store.snapshot();
        assert!((state.bass_gain - 0.1).abs() < 1e-6);
        assert!((state.treble_gain + 0.1).abs() < 1e-6);
        assert!((state.speech_gain - 0.2).abs() < 1e-6);
        assert!((state.volume - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_gain_clamped_at_upper_bound() {
        let store = ParameterStore::default();
        for _ in 0..100 {
            store.apply(Action::IncreaseBass);
            assert!(store.snapshot().bass_gain <= 2.0);
        }
        assert_eq!(store.snapshot().bass_gain, 2.0);

        // Already at the bound: further increases are a no-op
        store.apply(Action::IncreaseBass);
        assert_eq!(store.snapshot().bass_gain, 2.0);
    }

    #[test]
    fn test_gain_clamped_at_lower_bound() {
        let store = ParameterStore::default();
        for _ in 0..100 {
            store.apply_named("decrease_bass");
            assert!(store.snapshot().bass_gain >= -2.0);
        }
        assert_eq!(store.snapshot().bass_gain, -2.0);

        for _ in 0..100 {
            store.apply(Action::DecreaseTreble);
            store.apply(Action::DecreaseSpeech);
        }
        assert_eq!(store.snapshot().treble_gain, -2.0);
        assert_eq!(store.snapshot().speech_gain, -2.0);
    }

    #[test]
    fn test_volume_clamped() {
        let store = ParameterStore::default();
        for _ in 0..100 {
            store.apply(Action::IncreaseVolume);
        }
        assert_eq!(store.snapshot().volume, 2.0);

        for _ in 0..100 {
            store.apply(Action::DecreaseVolume);
        }
        assert_eq!(store.snapshot().volume, 0.0);
    }

    #[test]
    fn test_toggle_is_involution() {
        let store = ParameterStore::default();

        store.apply(Action::ToggleEcho);
        assert!(store.snapshot().echo_enabled);
        store.apply(Action::ToggleEcho);
        assert!(!store.snapshot().echo_enabled);

        store.apply(Action::ToggleReverb);
        store.apply(Action::ToggleReverb);
        assert!(!store.snapshot().reverb_enabled);
    }

    #[test]
    fn test_custom_step_sizes() {
        let store = ParameterStore::new(ControlConfig {
            gain_step: 0.5,
            volume_step: 0.25,
        });

        store.apply(Action::IncreaseTreble);
        store.apply(Action::DecreaseVolume);

        let state = store.snapshot();
        assert_eq!(state.treble_gain, 0.5);
        assert_eq!(state.volume, 0.75);
    }

    #[test]
    fn test_status_view_rounding() {
        let store = ParameterStore::default();
        for _ in 0..3 {
            store.apply(Action::IncreaseBass);
        }
        store.apply(Action::ToggleReverb);

        let status = store.status_view();
        assert_eq!(status.bass, 0.3);
        assert_eq!(status.treble, 0.0);
        assert_eq!(status.volume, 1.0);
        assert_eq!(status.echo, EffectStatus::Off);
        assert_eq!(status.reverb, EffectStatus::On);
    }

    #[test]
    fn test_status_view_serialization() {
        let status: StatusView = ParameterState {
            echo_enabled: true,
            ..Default::default()
        }
        .into();

        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["echo"], "ON");
        assert_eq!(json["reverb"], "OFF");
        assert_eq!(json["volume"], 1.0);
    }

    #[test]
    fn test_status_display() {
        let status = StatusView::from(ParameterState::default());
        let line = status.to_string();
        assert!(line.contains("Bass: +0.0"));
        assert!(line.contains("Volume: 1.00"));
        assert!(line.contains("Echo: OFF"));
    }

    #[test]
    fn test_concurrent_applies_keep_invariants() {
        let store = Arc::new(ParameterStore::default());

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        let action = Action::ALL[(i * 7 + n) % Action::ALL.len()];
                        store.apply(action);
                    }
                })
            })
            .collect();

        for _ in 0..1000 {
            let state = store.snapshot();
            assert!((-2.0..=2.0).contains(&state.bass_gain));
            assert!((-2.0..=2.0).contains(&state.treble_gain));
            assert!((-2.0..=2.0).contains(&state.speech_gain));
            assert!((0.0..=2.0).contains(&state.volume));
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ParameterStore::default();
        let snapshot = store.snapshot();

        store.apply(Action::IncreaseVolume);

        assert_eq!(snapshot.volume, 1.0);
        assert!(store.snapshot().volume > 1.0);
    }
}
