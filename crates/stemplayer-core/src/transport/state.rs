//! Observable transport state

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crate::song::{PadType, SongId, TrackId};
use crate::types::OutputFormat;

/// Playback state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No position established; starting frame is 0
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    fn as_u8(self) -> u8 {
        match self {
            TransportState::Stopped => 0,
            TransportState::Playing => 1,
            TransportState::Paused => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Paused,
            _ => TransportState::Stopped,
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// One track as seen by a UI
#[derive(Debug, Clone, PartialEq)]
pub struct TrackView {
    pub id: TrackId,
    pub name: String,
    pub pad_type: Option<PadType>,
    pub is_muted: bool,
    pub is_soloed: bool,
    pub gain: f32,
}

/// Everything a UI needs to draw the player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub song_id: SongId,
    pub song_name: String,
    pub song_index: usize,
    pub song_count: usize,
    pub tracks: Vec<TrackView>,
    pub state: TransportState,
    pub is_scrubbing: bool,
    pub current_seconds: f64,
    pub total_seconds: f64,
    pub current_time: String,
    pub total_time: String,
    pub has_pads: bool,
    /// Format of the live route, if one is up
    pub output_format: Option<OutputFormat>,
}

impl PlayerSnapshot {
    /// Slider range for binding a position control
    pub fn slider_range(&self) -> std::ops::RangeInclusive<f64> {
        0.0..=self.total_seconds
    }

    /// Position as a fraction of the song (0.0 for an empty song)
    pub fn progress(&self) -> f64 {
        if self.total_seconds > 0.0 {
            (self.current_seconds / self.total_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Lock-free mirror of the transport for UI reads
///
/// Written by the control loop after every command and tick. Frame values
/// are in the current song's recorded frame space.
#[derive(Debug, Default)]
pub struct TransportAtomics {
    state: AtomicU8,
    position_frames: AtomicU64,
    duration_frames: AtomicU64,
    sample_rate: AtomicU64,
    song_index: AtomicUsize,
    scrubbing: AtomicBool,
}

impl TransportAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    #[inline]
    pub fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn duration_frames(&self) -> u64 {
        self.duration_frames.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn song_index(&self) -> usize {
        self.song_index.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing.load(Ordering::Relaxed)
    }

    /// Position in seconds (0.0 before the first publish)
    pub fn position_seconds(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.position_frames() as f64 / rate as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.duration_frames() as f64 / rate as f64
    }

    pub(crate) fn publish_state(&self, state: TransportState, scrubbing: bool) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
        self.scrubbing.store(scrubbing, Ordering::Relaxed);
    }

    pub(crate) fn publish_song(&self, index: usize, duration_frames: u64, sample_rate: u32) {
        self.song_index.store(index, Ordering::Relaxed);
        self.duration_frames.store(duration_frames, Ordering::Relaxed);
        self.sample_rate.store(sample_rate as u64, Ordering::Relaxed);
    }

    pub(crate) fn publish_position(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomics() {
        let atomics = TransportAtomics::new();
        assert_eq!(atomics.state(), TransportState::Stopped);

        atomics.publish_state(TransportState::Paused, true);
        assert_eq!(atomics.state(), TransportState::Paused);
        assert!(atomics.is_scrubbing());

        atomics.publish_state(TransportState::Playing, false);
        assert!(atomics.is_playing());
    }

    #[test]
    fn test_seconds_from_frames() {
        let atomics = TransportAtomics::new();
        assert_eq!(atomics.position_seconds(), 0.0);

        atomics.publish_song(1, 441_000, 44100);
        atomics.publish_position(88_200);

        assert_eq!(atomics.song_index(), 1);
        assert!((atomics.position_seconds() - 2.0).abs() < 1e-9);
        assert!((atomics.duration_seconds() - 10.0).abs() < 1e-9);
    }
}
