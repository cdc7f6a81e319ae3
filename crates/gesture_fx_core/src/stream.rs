//! Output Stream Management
//!
//! The host audio subsystem is abstracted as an [`OutputBackend`] that can
//! open a stream around a [`PlaybackDriver`]; the stream then calls the
//! driver from its own real-time thread. [`Transport`] layers idempotent
//! start/stop on top and guarantees the stream is paused and released when
//! it goes away.
//!
//! ```text
//! Transport::start ──open──▶ OutputStream (device thread)
//!                                 │ every callback
//!                                 ▼
//!                  PlaybackDriver::fill ─▶ RenderPipeline::render
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::Event;
use crate::playback::PlaybackDriver;

/// A running (or paused) device stream
pub trait OutputStream {
    fn play(&self) -> EngineResult<()>;
    fn pause(&self) -> EngineResult<()>;
}

/// Something that can turn a playback driver into a device stream
pub trait OutputBackend {
    type Stream: OutputStream;

    /// Build a stream that invokes `driver` from the device callback
    ///
    /// The stream starts paused.
    fn open(&mut self, driver: PlaybackDriver) -> EngineResult<Self::Stream>;
}

/// Idempotent start/stop over an [`OutputBackend`]
///
/// The stream is opened lazily on the first successful `start`. Stopping
/// pauses it, so the playback cursor survives a stop/start cycle; `close`
/// (or dropping the transport) releases it.
pub struct Transport<B: OutputBackend> {
    backend: B,
    // Fresh driver handed to the backend each time a stream is opened
    driver: PlaybackDriver,
    stream: Option<B::Stream>,
    playing: bool,
}

impl<B: OutputBackend> Transport<B> {
    pub fn new(backend: B, driver: PlaybackDriver) -> Self {
        Self {
            backend,
            driver,
            stream: None,
            playing: false,
        }
    }

    /// Start streaming; returns `false` if already playing
    pub fn start(&mut self) -> EngineResult<bool> {
        if self.playing {
            return Ok(false);
        }

        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.backend.open(self.driver.clone())?,
        };
        // Keep the stream even if play fails so a retry need not rebuild it
        let played = stream.play();
        self.stream = Some(stream);
        played?;

        self.playing = true;
        Ok(true)
    }

    /// Pause streaming; returns `false` if nothing was playing
    pub fn stop(&mut self) -> EngineResult<bool> {
        if !self.playing {
            return Ok(false);
        }
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        self.playing = false;
        Ok(true)
    }

    /// Pause and release the device stream
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Ignoring pause error while closing stream: {}", e);
            }
        }
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: OutputBackend> Drop for Transport<B> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Production backend: the default cpal output device
pub struct CpalBackend {
    device: Device,
    config: StreamConfig,
    event_sender: Sender<Event>,
}

impl CpalBackend {
    /// Use the host's default output device
    pub fn default_output(config: StreamConfig, event_sender: Sender<Event>) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ConfigError)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;

        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        Ok(Self {
            device,
            config,
            event_sender,
        })
    }

    fn build(
        &self,
        cpal_config: &CpalStreamConfig,
        mut driver: PlaybackDriver,
    ) -> EngineResult<Stream> {
        // Vec capacity does not survive a clone, so size the copy that moves
        // into the callback here
        driver.reserve(self.config.buffer_size as usize);
        let channels = cpal_config.channels as usize;
        let err_sender = self.event_sender.clone();

        self.device
            .build_output_stream(
                cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time audio callback - NO allocations allowed here
                    driver.fill(data, channels);
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None, // No timeout
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))
    }
}

impl OutputBackend for CpalBackend {
    type Stream = Stream;

    fn open(&mut self, driver: PlaybackDriver) -> EngineResult<Stream> {
        let sample_rate = driver.sample_rate();

        let fixed = CpalStreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.buffer_size),
        };

        let stream = match self.build(&fixed, driver.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                // Some hosts reject fixed sizes; let the device pick instead.
                // Larger callbacks are then rendered in buffer_size blocks.
                warn!(
                    "Fixed buffer of {} frames rejected ({}), using device default",
                    self.config.buffer_size, e
                );
                let flexible = CpalStreamConfig {
                    buffer_size: cpal::BufferSize::Default,
                    ..fixed
                };
                self.build(&flexible, driver)?
            }
        };

        info!(
            "Output stream opened: {}Hz, {} channel(s), {:.1}ms buffer",
            sample_rate,
            self.config.channels,
            self.config.latency_ms(sample_rate)
        );

        // cpal may auto-start on some hosts; the transport decides when to play
        StreamTrait::pause(&stream).ok();
        Ok(stream)
    }
}

impl OutputStream for Stream {
    fn play(&self) -> EngineResult<()> {
        StreamTrait::play(self).map_err(|e| EngineError::StreamPlayError(e.to_string()))
    }

    fn pause(&self) -> EngineResult<()> {
        StreamTrait::pause(self).map_err(|e| EngineError::StreamPauseError(e.to_string()))
    }
}
