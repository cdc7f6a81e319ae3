//! Audio Engine - Main Entry Point
//!
//! The AudioEngine ties the pieces together for the process that owns them:
//! it shares the parameter store with the control side, hands a playback
//! driver to the output backend and reports what happened over an event
//! channel.
//!
//! ```text
//! control thread ──apply()──▶ ParameterStore ◀──snapshot── audio callback
//!                                                              │
//! AudioEngine ──start/stop──▶ Transport ──open──▶ OutputStream ┘
//!      ▲                                              │
//!      └──────────── crossbeam-channel ◀── device errors
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::config::{EngineConfig, StreamConfig};
use crate::error::{EngineError, EngineResult};
use crate::message::Event;
use crate::params::{Action, ParameterState, ParameterStore, StatusView};
use crate::pipeline::RenderPipeline;
use crate::playback::PlaybackDriver;
use crate::source::AudioSource;
use crate::stream::{CpalBackend, OutputBackend, Transport};

/// The main audio engine controller
///
/// Lives on the control/main thread. The audio thread only ever sees the
/// playback driver, the shared parameter store and the stop flag.
pub struct AudioEngine<B: OutputBackend = CpalBackend> {
    /// Parameters shared with the audio callback
    store: Arc<ParameterStore>,

    /// Device stream lifecycle
    transport: Transport<B>,

    /// Checked by the audio callback before every buffer
    stop_flag: Arc<AtomicBool>,

    /// Event channel (the sender is also given to the backend)
    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,

    /// Current configuration
    config: EngineConfig,

    sample_rate: u32,
    shut_down: bool,
}

impl AudioEngine<CpalBackend> {
    /// Create an engine that plays `source` on the default output device
    pub fn new(source: AudioSource, config: EngineConfig) -> EngineResult<Self> {
        Self::with_backend(source, config, |stream, sender| {
            CpalBackend::default_output(stream.clone(), sender)
        })
    }
}

impl<B: OutputBackend> AudioEngine<B> {
    /// Create an engine over a custom output backend
    ///
    /// `make_backend` receives the stream settings and a sender for
    /// asynchronous device errors. Everything that can fail at startup
    /// (config, filter validation, device lookup) fails here.
    pub fn with_backend<F>(source: AudioSource, config: EngineConfig, make_backend: F) -> EngineResult<Self>
    where
        F: FnOnce(&StreamConfig, Sender<Event>) -> EngineResult<B>,
    {
        config.validate()?;

        let sample_rate = source.sample_rate();
        let (event_sender, event_receiver) = unbounded::<Event>();

        let store = Arc::new(ParameterStore::new(config.control));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let pipeline = RenderPipeline::new(sample_rate, &config.effects)?;
        let mut driver = PlaybackDriver::new(
            Arc::new(source),
            Arc::clone(&store),
            pipeline,
            Arc::clone(&stop_flag),
        );
        driver.reserve(config.stream.buffer_size as usize);

        let backend = make_backend(&config.stream, event_sender.clone())?;

        info!(
            "Audio engine ready: {}Hz source, {} channel(s), {} frame buffer",
            sample_rate, config.stream.channels, config.stream.buffer_size
        );

        Ok(Self {
            store,
            transport: Transport::new(backend, driver),
            stop_flag,
            event_sender,
            event_receiver,
            config,
            sample_rate,
            shut_down: false,
        })
    }

    /// Apply a control action
    pub fn apply(&self, action: Action) {
        self.store.apply(action);
        debug!("Applied {}", action);
    }

    /// Apply an action by name; unknown names are ignored
    pub fn apply_named(&self, name: &str) -> bool {
        let known = self.store.apply_named(name);
        if !known {
            debug!("Ignoring unknown action: {}", name);
        }
        known
    }

    pub fn snapshot(&self) -> ParameterState {
        self.store.snapshot()
    }

    pub fn status_view(&self) -> StatusView {
        self.store.status_view()
    }

    /// Shared handle to the parameter store, for a separate control thread
    pub fn store(&self) -> Arc<ParameterStore> {
        Arc::clone(&self.store)
    }

    /// Start audio output; a no-op if already running
    pub fn start(&mut self) -> EngineResult<()> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        match self.transport.start() {
            Ok(true) => {
                info!("Playback started");
                self.send(Event::Started);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                error!("Failed to start playback: {}", e);
                self.stop_flag.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Stop audio output; a no-op if not running
    pub fn stop(&mut self) -> EngineResult<()> {
        // Silence from the next callback on, even if the pause is slow
        self.stop_flag.store(true, Ordering::SeqCst);
        if self.transport.stop()? {
            info!("Playback stopped");
            self.send(Event::Stopped);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_playing()
    }

    /// Stop and release the device stream for good
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let was_playing = self.transport.is_playing();

        self.stop_flag.store(true, Ordering::SeqCst);
        self.transport.close();
        self.shut_down = true;

        if was_playing {
            self.send(Event::Stopped);
        }
        info!("Audio engine shut down");
    }

    /// Queue a `StateUpdate` with the current parameters
    pub fn request_state(&self) {
        self.send(Event::StateUpdate(self.status_view()));
    }

    /// Poll for events (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&self, event: Event) {
        // The receiver lives in self, so this only fails during teardown
        let _ = self.event_sender.send(event);
    }
}

impl<B: OutputBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
