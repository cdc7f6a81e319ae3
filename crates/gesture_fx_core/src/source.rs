//! Audio Source Loading
//!
//! The whole file is decoded once at startup (any container/codec symphonia
//! knows: WAV, FLAC, OGG/Vorbis, MP3, AIFF, ...) and collapsed to mono by
//! averaging channels. Samples are sanitized to [-1.0, 1.0] here, off the
//! audio thread. After that they are immutable and shared read-only with the
//! playback driver.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// Decoded mono audio plus its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSource {
    /// Wrap mono samples
    ///
    /// Non-finite samples become silence and everything else is clamped to
    /// full scale, so the render path never sees NaN from the source.
    pub fn from_mono(mut samples: Vec<f32>, sample_rate: u32) -> EngineResult<Self> {
        if sample_rate == 0 {
            return Err(EngineError::ConfigError("Sample rate must be positive".into()));
        }
        if samples.is_empty() {
            return Err(EngineError::EmptySource);
        }

        let mut repaired = 0usize;
        for sample in samples.iter_mut() {
            let value = *sample;
            let clean = if value.is_finite() {
                value.clamp(-1.0, 1.0)
            } else {
                0.0
            };
            if clean != value {
                repaired += 1;
                *sample = clean;
            }
        }
        if repaired > 0 {
            warn!(
                "{} source sample(s) were non-finite or beyond full scale and have been repaired",
                repaired
            );
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Collapse interleaved multi-channel samples to mono by averaging
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> EngineResult<Self> {
        let mono = match channels {
            0 => return Err(EngineError::ConfigError("Channel count must be positive".into())),
            1 => samples.to_vec(),
            n => {
                let n = n as usize;
                samples
                    .chunks_exact(n)
                    .map(|frame| frame.iter().sum::<f32>() / n as f32)
                    .collect()
            }
        };
        Self::from_mono(mono, sample_rate)
    }

    /// Decode an audio file, using its extension as a format hint
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::SourceNotFound(path.to_path_buf()));
        }

        let (interleaved, sample_rate, channels) = Self::decode(path)?;
        let source = Self::from_interleaved(&interleaved, channels, sample_rate)?;

        info!(
            "Loaded {} ({:.1}s, {}Hz, {} channel(s) -> mono)",
            path.display(),
            source.duration_secs(),
            source.sample_rate,
            channels
        );
        Ok(source)
    }

    fn decode(path: &Path) -> EngineResult<(Vec<f32>, u32, u16)> {
        let file = File::open(path).map_err(|e| EngineError::DecodeError(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| EngineError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| EngineError::UnsupportedFormat("No audio track found".into()))?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| EngineError::UnsupportedFormat("Unknown sample rate".into()))?;
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::UnsupportedFormat(e.to_string()))?;

        debug!(
            "Decoding {}: {}Hz, {} channel(s)",
            path.display(),
            sample_rate,
            channels
        );

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("Skipping corrupt packet in {}: {}", path.display(), reason);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;

            // Sized by the first packet; grown if a later one is larger
            let needed = decoded.capacity() * spec.channels.count();
            if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
        }

        Ok((samples, sample_rate, channels))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}
