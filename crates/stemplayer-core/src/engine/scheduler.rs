//! Synchronized scheduling of a song's tracks onto a route
//!
//! All voices receive the same [`Segment`](super::Segment) in one command,
//! so they start on the same device frame from the same offset. The offset
//! is converted from recorded to output frame space here and nowhere else.

use std::time::Duration;

use thiserror::Error;

use super::route::Route;
use crate::mute_solo;
use crate::rate::scale_frame_across_rates;
use crate::song::Song;
use crate::types::FramePosition;

/// Result of a scheduling attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Every voice will start at device frame `start_at`
    Scheduled { start_at: u64, frame_count: u64 },
    /// Nothing left to play from this position
    Exhausted,
    /// The route has no usable output format yet
    Deferred,
}

/// Scheduling failures; the caller rebuilds the route and tries again
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Route command queue is full")]
    QueueFull,

    #[error("Route has {voices} voices but the song has {tracks} tracks")]
    VoiceCountMismatch { voices: usize, tracks: usize },
}

/// Schedules songs onto routes
#[derive(Debug, Clone)]
pub struct Scheduler {
    start_lead_per_track: Duration,
}

impl Scheduler {
    pub fn new(start_lead_per_track: Duration) -> Self {
        Self {
            start_lead_per_track,
        }
    }

    /// Time between issuing a schedule and the voices starting
    ///
    /// Grows with the track count so that larger songs get more headroom
    /// before the first block that must carry all of them.
    pub fn start_lead(&self, track_count: usize) -> Duration {
        self.start_lead_per_track * track_count as u32
    }

    /// Schedule the remainder of `song` from `starting_frame` (recorded space)
    pub fn schedule(
        &self,
        song: &Song,
        starting_frame: FramePosition,
        route: &mut Route,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let format = route.format();
        if !format.is_valid() {
            log::warn!("Scheduling deferred: output format is {}", format);
            return Ok(ScheduleOutcome::Deferred);
        }

        let starting_frame = starting_frame.max(0);
        if song.total_frames() as FramePosition - starting_frame <= 0 {
            return Ok(ScheduleOutcome::Exhausted);
        }

        let start_frame =
            scale_frame_across_rates(starting_frame, song.recorded_sample_rate(), format.rate());
        log::debug!(
            "Recorded frame {} is output frame {}",
            starting_frame,
            start_frame
        );
        self.schedule_output(song, start_frame, route)
    }

    /// Schedule the remainder of `song` from an output-space frame
    ///
    /// Used to resume exactly where the route left off, without a round
    /// trip through recorded frames.
    pub fn schedule_output(
        &self,
        song: &Song,
        start_frame: FramePosition,
        route: &mut Route,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let format = route.format();
        if !format.is_valid() {
            log::warn!("Scheduling deferred: output format is {}", format);
            return Ok(ScheduleOutcome::Deferred);
        }

        let tracks = song.tracks().len();
        if route.voice_count() != tracks {
            return Err(ScheduleError::VoiceCountMismatch {
                voices: route.voice_count(),
                tracks,
            });
        }

        let output = format.rate();
        let start_frame = start_frame.max(0);
        let end_frame = scale_frame_across_rates(
            song.total_frames() as FramePosition,
            song.recorded_sample_rate(),
            output,
        );
        if end_frame <= start_frame {
            return Ok(ScheduleOutcome::Exhausted);
        }
        let frame_count = (end_frame - start_frame) as u64;

        route.set_gains(&mute_solo::gains(song));

        let lead_frames =
            (self.start_lead(tracks).as_secs_f64() * output.as_f64()).round() as u64;
        let start_at = route.device_clock() + lead_frames;

        let segment = route
            .schedule(start_at, start_frame, frame_count)
            .map_err(|_| ScheduleError::QueueFull)?;

        log::debug!(
            "Scheduled {} voices: gen {}, output frame {} (+{} frames) at device frame {}",
            tracks,
            segment.generation,
            start_frame,
            frame_count,
            start_at
        );

        Ok(ScheduleOutcome::Scheduled {
            start_at,
            frame_count,
        })
    }
}
