//! Render path
//!
//! [`RouteRenderer`] is moved into the device callback and owned by the audio
//! thread from then on. Each block it:
//!
//! 1. Drains pending [`RouteCommand`]s (schedule / stop)
//! 2. Mixes every voice into a pre-allocated stereo buffer
//! 3. Writes the mix interleaved into the device buffer
//! 4. Advances and publishes the device clock
//!
//! Nothing here allocates, locks or logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::command::RouteCommand;
use super::voice::Voice;
use crate::audio::MAX_BUFFER_SIZE;
use crate::types::{OutputFormat, StereoSample};

/// Audio-thread half of a route
pub struct RouteRenderer {
    format: OutputFormat,
    voices: Vec<Voice>,
    commands: rtrb::Consumer<RouteCommand>,
    clock: Arc<AtomicU64>,
    frames_rendered: u64,
    mix: Vec<StereoSample>,
}

impl RouteRenderer {
    pub(crate) fn new(
        format: OutputFormat,
        voices: Vec<Voice>,
        commands: rtrb::Consumer<RouteCommand>,
        clock: Arc<AtomicU64>,
    ) -> Self {
        Self {
            format,
            voices,
            commands,
            clock,
            frames_rendered: 0,
            mix: vec![StereoSample::silence(); MAX_BUFFER_SIZE],
        }
    }

    /// Format the device stream must be opened with
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Apply every queued command (RT-safe)
    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                RouteCommand::Schedule(segment) => {
                    for voice in &mut self.voices {
                        voice.begin(segment);
                    }
                }
                RouteCommand::Stop => {
                    for voice in &mut self.voices {
                        voice.stop();
                    }
                }
            }
        }
    }

    /// Fill an interleaved device buffer
    ///
    /// Channels beyond the first two are silenced; a mono device gets the
    /// left channel.
    pub fn render(&mut self, data: &mut [f32]) {
        let channels = self.format.channels.max(1) as usize;

        self.process_commands();

        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            let mix = &mut self.mix[..n_frames];
            mix.fill(StereoSample::silence());

            for voice in &mut self.voices {
                voice.render_add(mix, self.frames_rendered);
            }

            for (frame, sample) in chunk.chunks_mut(channels).zip(mix.iter()) {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }

            self.frames_rendered += n_frames as u64;
        }

        self.clock.store(self.frames_rendered, Ordering::Release);
    }
}
