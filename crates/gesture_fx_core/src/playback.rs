//! Playback Driver
//!
//! The body of the device callback. Each invocation pulls the next slice of
//! the looping source, renders it with the latest parameter snapshot and
//! copies the mono result into every channel of the device buffer.
//!
//! The driver is moved into the output stream's callback, so the playback
//! cursor is owned by the audio thread alone. The only shared reads are the
//! parameter snapshot and the stop flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::params::ParameterStore;
use crate::pipeline::RenderPipeline;
use crate::source::AudioSource;

#[derive(Clone)]
pub struct PlaybackDriver {
    source: Arc<AudioSource>,
    store: Arc<ParameterStore>,
    pipeline: RenderPipeline,
    stop_flag: Arc<AtomicBool>,
    cursor: usize,
    // Mono render buffer, reused for every callback
    scratch: Vec<f32>,
    // Largest block rendered at once; 0 until `reserve` is called
    block_frames: usize,
}

impl PlaybackDriver {
    pub fn new(
        source: Arc<AudioSource>,
        store: Arc<ParameterStore>,
        pipeline: RenderPipeline,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            store,
            pipeline,
            stop_flag,
            cursor: 0,
            scratch: Vec::new(),
            block_frames: 0,
        }
    }

    /// Pre-size buffers for blocks of up to `max_frames`
    ///
    /// Larger device callbacks are rendered in blocks of this size, so the
    /// buffers never grow on the audio thread.
    pub fn reserve(&mut self, max_frames: usize) {
        self.block_frames = max_frames;
        self.pipeline.reserve(max_frames);
        self.scratch
            .reserve(max_frames.saturating_sub(self.scratch.len()));
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    /// The next `frame_count` source samples, looping at the end
    ///
    /// A request that runs past the end continues from the start; the cursor
    /// lands wherever the request finished.
    pub fn next_buffer(&mut self, frame_count: usize) -> &[f32] {
        self.load(frame_count);
        &self.scratch
    }

    fn load(&mut self, frame_count: usize) {
        let samples = self.source.samples();
        let len = samples.len();

        self.scratch.clear();
        let mut remaining = frame_count;
        while remaining > 0 {
            let take = remaining.min(len - self.cursor);
            self.scratch
                .extend_from_slice(&samples[self.cursor..self.cursor + take]);
            self.cursor = (self.cursor + take) % len;
            remaining -= take;
        }
    }

    /// Fill an interleaved device buffer with `channels` channels
    ///
    /// After the stop flag is raised this writes silence and leaves the
    /// cursor where it is.
    ///
    /// # Real-time Safety
    /// One short lock per block for the parameter snapshot; no allocations
    /// once [`PlaybackDriver::reserve`] has been called.
    pub fn fill(&mut self, output: &mut [f32], channels: usize) {
        if self.stop_flag.load(Ordering::Relaxed) || channels == 0 {
            output.fill(0.0);
            return;
        }

        let block = match self.block_frames {
            0 => output.len().max(1),
            frames => frames * channels,
        };
        for chunk in output.chunks_mut(block) {
            self.fill_block(chunk, channels);
        }
    }

    fn fill_block(&mut self, output: &mut [f32], channels: usize) {
        let frames = output.len() / channels;
        self.load(frames);

        let params = self.store.snapshot();
        self.pipeline.render(&mut self.scratch, &params);

        for (frame, &sample) in output.chunks_exact_mut(channels).zip(self.scratch.iter()) {
            frame.fill(sample);
        }
        output[frames * channels..].fill(0.0);
    }
}
