//! Render Pipeline
//!
//! Turns one buffer of source audio into one buffer of device audio:
//!
//! ```text
//! EQ ──▶ echo? ──▶ reverb? ──▶ × volume ──▶ peak normalize
//! ```
//!
//! The pipeline owns the delay-effect history and all scratch space, so a
//! render never allocates once the scratch covers the callback size, and it
//! never fails: a stage that produces non-finite output is discarded and the
//! buffer it received continues down the chain.

use tracing::{info, warn};

use gesture_fx_dsp::{apply_gain, peak_normalize, Echo, FilterBank, Reverb};

use crate::config::EffectsConfig;
use crate::error::EngineResult;
use crate::params::ParameterState;

#[derive(Clone)]
pub struct RenderPipeline {
    sample_rate: u32,
    filter_bank: FilterBank,
    echo: Echo,
    reverb: Reverb,
    // Effect state as of the previous render, to reset history on re-enable
    echo_active: bool,
    reverb_active: bool,
    // Copy of the buffer entering the stage currently being guarded
    stage_input: Vec<f32>,
}

impl RenderPipeline {
    /// Build and validate the signal chain for `sample_rate`
    ///
    /// EQ bands that cannot exist at this rate are disabled here, once, with a
    /// warning. Invalid effect settings are an error.
    pub fn new(sample_rate: u32, effects: &EffectsConfig) -> EngineResult<Self> {
        let rate = sample_rate as f32;
        let filter_bank = FilterBank::new(rate)?;

        for (band, reason) in filter_bank.disabled_bands() {
            warn!(
                "{} band disabled for this session at {}Hz: {}",
                band.name(),
                sample_rate,
                reason
            );
        }

        let echo = Echo::new(rate, effects.echo_delay_secs, effects.echo_decay)?;
        let reverb = Reverb::new(rate, effects.reverb_decay)?;

        info!(
            "Render pipeline ready at {}Hz (echo {} samples, min buffer {} frames)",
            sample_rate,
            echo.delay(),
            filter_bank.min_frames()
        );

        Ok(Self {
            sample_rate,
            filter_bank,
            echo,
            reverb,
            echo_active: false,
            reverb_active: false,
            stage_input: Vec::new(),
        })
    }

    /// Pre-size scratch space for callbacks up to `max_frames`
    pub fn reserve(&mut self, max_frames: usize) {
        self.filter_bank.reserve(max_frames);
        self.stage_input
            .reserve(max_frames.saturating_sub(self.stage_input.len()));
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn filter_bank(&self) -> &FilterBank {
        &self.filter_bank
    }

    /// Render `buffer` in place using one parameter snapshot
    ///
    /// The length never changes and every output sample lies in [-1.0, 1.0].
    ///
    /// # Real-time Safety
    /// No locks, no logging, no allocations after [`RenderPipeline::reserve`].
    pub fn render(&mut self, buffer: &mut [f32], params: &ParameterState) {
        let gains = params.eq_gains();
        let filter_bank = &mut self.filter_bank;
        Self::guarded(&mut self.stage_input, buffer, |buf| filter_bank.apply_eq(buf, gains));

        if params.echo_enabled {
            if !self.echo_active {
                self.echo.reset();
            }
            let echo = &mut self.echo;
            Self::guarded(&mut self.stage_input, buffer, |buf| echo.process(buf));
        }
        self.echo_active = params.echo_enabled;

        if params.reverb_enabled {
            if !self.reverb_active {
                self.reverb.reset();
            }
            let reverb = &mut self.reverb;
            Self::guarded(&mut self.stage_input, buffer, |buf| reverb.process(buf));
        }
        self.reverb_active = params.reverb_enabled;

        apply_gain(buffer, params.volume);

        if buffer.iter().any(|s| !s.is_finite()) {
            // Non-finite source data; silence rather than noise
            buffer.fill(0.0);
        }

        peak_normalize(buffer);
    }

    /// Run `stage` on `buffer`, restoring its input if it yields NaN/inf
    fn guarded<F>(scratch: &mut Vec<f32>, buffer: &mut [f32], stage: F)
    where
        F: FnOnce(&mut [f32]),
    {
        scratch.clear();
        scratch.extend_from_slice(buffer);

        stage(buffer);

        if buffer.iter().any(|s| !s.is_finite()) {
            buffer.copy_from_slice(scratch);
        }
    }
}
