//! Live output routing for the current song
//!
//! A [`Route`] is the control-path handle to everything the render path is
//! currently doing: the output format it was built for, one set of voice
//! atomics per track, the command producer and the device clock. It is
//! always built together with its [`RouteRenderer`] and replaced as a whole
//! when the song or the device format changes; nothing in it is patched in
//! place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::command::{command_channel, RouteCommand};
use super::renderer::RouteRenderer;
use super::voice::{Segment, Voice, VoiceAtomics};
use crate::mute_solo;
use crate::song::Song;
use crate::types::{OutputFormat, Sample};

/// Control-path half of a route
pub struct Route {
    format: OutputFormat,
    voices: Vec<Arc<VoiceAtomics>>,
    commands: rtrb::Producer<RouteCommand>,
    clock: Arc<AtomicU64>,
    generation: u64,
    active: Option<Segment>,
}

impl Route {
    /// Attach one voice per track of `song` for output `format`
    pub fn build(song: &Song, format: OutputFormat) -> (Route, RouteRenderer) {
        let (producer, consumer) = command_channel();
        let clock = Arc::new(AtomicU64::new(0));
        let recorded_rate = song.recorded_sample_rate();
        let gains = mute_solo::gains(song);

        let mut atomics = Vec::with_capacity(song.tracks().len());
        let mut voices = Vec::with_capacity(song.tracks().len());
        for (track, gain) in song.tracks().iter().zip(gains) {
            let shared = Arc::new(VoiceAtomics::new(gain));
            voices.push(Voice::new(
                track.source().clone(),
                shared.clone(),
                recorded_rate,
                format.rate(),
            ));
            atomics.push(shared);
        }

        log::info!(
            "Route built for '{}': {} voices, recorded {} -> output {}",
            song.name(),
            voices.len(),
            recorded_rate,
            format
        );

        let renderer = RouteRenderer::new(format, voices, consumer, clock.clone());
        let route = Route {
            format,
            voices: atomics,
            commands: producer,
            clock,
            generation: 0,
            active: None,
        };
        (route, renderer)
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, index: usize) -> Option<&VoiceAtomics> {
        self.voices.get(index).map(|v| v.as_ref())
    }

    /// Frames the device has consumed since this route went live
    pub fn device_clock(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Push gains to the live voices, in track order
    pub fn set_gains(&self, gains: &[Sample]) {
        for (voice, gain) in self.voices.iter().zip(gains) {
            voice.set_gain(*gain);
        }
    }

    /// The segment currently in effect, if any
    pub fn active_segment(&self) -> Option<Segment> {
        self.active
    }

    /// Queue a segment for every voice
    ///
    /// Returns the segment on success; on a full ring nothing is queued and
    /// the generation is not consumed.
    pub(crate) fn schedule(
        &mut self,
        start_at: u64,
        start_frame: i64,
        frame_count: u64,
    ) -> Result<Segment, RouteCommand> {
        let segment = Segment {
            generation: self.generation + 1,
            start_at,
            start_frame,
            frame_count,
        };
        self.commands
            .push(RouteCommand::Schedule(segment))
            .map_err(|e| match e {
                rtrb::PushError::Full(cmd) => cmd,
            })?;
        self.generation = segment.generation;
        self.active = Some(segment);
        Ok(segment)
    }

    /// Stop every voice
    ///
    /// Returns false when the ring is full, in which case the route can no
    /// longer be trusted and must be rebuilt.
    pub(crate) fn stop(&mut self) -> bool {
        self.active = None;
        self.commands.push(RouteCommand::Stop).is_ok()
    }

    /// Output frames the reference voice has played of the active segment
    pub fn elapsed_output_frames(&self) -> u64 {
        let (Some(segment), Some(reference)) = (self.active, self.voices.first()) else {
            return 0;
        };
        reference.rendered_for(segment.generation).unwrap_or(0)
    }

    /// Whether the active segment has been played to its end
    pub fn segment_finished(&self) -> bool {
        match self.active {
            Some(segment) => self.elapsed_output_frames() >= segment.frame_count,
            None => false,
        }
    }
}
