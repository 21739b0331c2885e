//! Track & song model
//!
//! Songs and tracks are built once from the catalog. After construction the
//! only mutable state is each track's mute/solo flags, and those are only
//! touched from the control path through [`crate::mute_solo`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use basedrop::Shared;
use serde::{Deserialize, Serialize};

use crate::engine::gc_handle;
use crate::error::CatalogError;
use crate::rate::duration_seconds;
use crate::types::{SampleRate, StereoBuffer};

/// Semantic label for a stem (grouping and display only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadType {
    Soprano,
    Alto,
    Tenor,
    Bass,
}

impl PadType {
    pub const ALL: [PadType; 4] = [PadType::Soprano, PadType::Alto, PadType::Tenor, PadType::Bass];

    pub fn display_name(&self) -> &'static str {
        match self {
            PadType::Soprano => "Soprano",
            PadType::Alto => "Alto",
            PadType::Tenor => "Tenor",
            PadType::Bass => "Bass",
        }
    }

    /// Parse a pad name case-insensitively ("soprano", "Alto", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.display_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

static NEXT_TRACK_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_SONG_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique track identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

impl TrackId {
    fn next() -> Self {
        Self(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Process-unique song identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongId(pub u32);

impl SongId {
    fn next() -> Self {
        Self(NEXT_SONG_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "song-{}", self.0)
    }
}

/// Decoded stem audio, shareable with the render path
///
/// Wrapped in `basedrop::Shared` so that when the render thread holds the
/// last reference, deallocation is deferred to the collector thread.
#[derive(Clone)]
pub struct StemSource {
    frames: Shared<StereoBuffer>,
}

impl StemSource {
    pub fn new(buffer: StereoBuffer) -> Self {
        Self {
            frames: Shared::new(&gc_handle(), buffer),
        }
    }

    /// Length in recorded frames
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    #[inline]
    pub fn buffer(&self) -> &StereoBuffer {
        &self.frames
    }
}

impl fmt::Debug for StemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemSource")
            .field("frames", &self.frame_count())
            .finish()
    }
}

/// One stem of a song
#[derive(Debug)]
pub struct Track {
    id: TrackId,
    name: String,
    pad_type: Option<PadType>,
    source: StemSource,
    pub(crate) is_muted: bool,
    pub(crate) is_soloed: bool,
}

impl Track {
    pub fn new(name: impl Into<String>, source: StemSource, pad_type: Option<PadType>) -> Self {
        Self {
            id: TrackId::next(),
            name: name.into(),
            pad_type,
            source,
            is_muted: false,
            is_soloed: false,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pad_type(&self) -> Option<PadType> {
        self.pad_type
    }

    pub fn source(&self) -> &StemSource {
        &self.source
    }

    pub fn frame_count(&self) -> u64 {
        self.source.frame_count()
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn is_soloed(&self) -> bool {
        self.is_soloed
    }

    /// Audible means not muted; solo is expressed through the others' mutes
    pub fn is_audible(&self) -> bool {
        !self.is_muted
    }
}

/// A set of time-aligned stems of one performance
#[derive(Debug)]
pub struct Song {
    id: SongId,
    name: String,
    tracks: Vec<Track>,
    recorded_sample_rate: SampleRate,
}

impl Song {
    /// Build a song, enforcing that every track has the same length
    pub fn new(
        name: impl Into<String>,
        recorded_sample_rate: SampleRate,
        tracks: Vec<Track>,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        if !recorded_sample_rate.is_valid() {
            return Err(CatalogError::InvalidSampleRate {
                song: name,
                rate: recorded_sample_rate.value(),
            });
        }
        let Some(reference) = tracks.first() else {
            return Err(CatalogError::EmptySong(name));
        };

        let expected = reference.frame_count();
        if let Some(odd) = tracks.iter().find(|t| t.frame_count() != expected) {
            return Err(CatalogError::FrameCountMismatch {
                song: name,
                track: odd.name.clone(),
                expected,
                found: odd.frame_count(),
            });
        }

        Ok(Self {
            id: SongId::next(),
            name,
            tracks,
            recorded_sample_rate,
        })
    }

    pub fn id(&self) -> SongId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// The first track; its length stands for every track's
    pub fn reference_track(&self) -> &Track {
        &self.tracks[0]
    }

    pub fn recorded_sample_rate(&self) -> SampleRate {
        self.recorded_sample_rate
    }

    /// Song length in recorded frames
    pub fn total_frames(&self) -> u64 {
        self.reference_track().frame_count()
    }

    pub fn duration_seconds(&self) -> f64 {
        duration_seconds(self.total_frames(), self.recorded_sample_rate)
    }

    /// Whether any track carries a pad label
    pub fn has_pads(&self) -> bool {
        self.tracks.iter().any(|t| t.pad_type.is_some())
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::StereoSample;

    /// A constant-level stem of `seconds` at `rate`
    pub fn tone_source(seconds: f64, rate: u32, level: f32) -> StemSource {
        let frames = (seconds * rate as f64).round() as usize;
        StemSource::new(StereoBuffer::from_vec(vec![StereoSample::mono(level); frames]))
    }

    /// A song with `track_count` stems of `seconds` each
    pub fn test_song(name: &str, track_count: usize, seconds: f64, rate: u32) -> Song {
        let tracks = (0..track_count)
            .map(|i| {
                Track::new(
                    format!("Stem {}", i + 1),
                    tone_source(seconds, rate, 0.25),
                    PadType::ALL.get(i).copied(),
                )
            })
            .collect();
        Song::new(name, SampleRate::hz(rate), tracks).expect("valid test song")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_song_rejects_empty_track_list() {
        let result = Song::new("Empty", SampleRate::hz(44100), Vec::new());
        assert!(matches!(result, Err(CatalogError::EmptySong(_))));
    }

    #[test]
    fn test_song_rejects_mismatched_lengths() {
        let tracks = vec![
            Track::new("a", tone_source(1.0, 44100, 0.1), None),
            Track::new("b", tone_source(1.5, 44100, 0.1), None),
        ];
        let result = Song::new("Ragged", SampleRate::hz(44100), tracks);
        assert!(matches!(
            result,
            Err(CatalogError::FrameCountMismatch { expected: 44100, found: 66150, .. })
        ));
    }

    #[test]
    fn test_song_rejects_zero_rate() {
        let tracks = vec![Track::new("a", tone_source(1.0, 44100, 0.1), None)];
        let result = Song::new("Zero", SampleRate::hz(0), tracks);
        assert!(matches!(result, Err(CatalogError::InvalidSampleRate { .. })));
    }

    #[test]
    fn test_song_duration_and_pads() {
        let song = test_song("Holy", 3, 10.0, 44100);
        assert_eq!(song.total_frames(), 441_000);
        assert!((song.duration_seconds() - 10.0).abs() < 1e-9);
        assert!(song.has_pads());
        assert_eq!(song.reference_track().pad_type(), Some(PadType::Soprano));
    }

    #[test]
    fn test_track_ids_are_unique() {
        let a = test_song("A", 2, 0.1, 8000);
        let b = test_song("B", 2, 0.1, 8000);
        let mut ids: Vec<_> = a.tracks().iter().chain(b.tracks()).map(|t| t.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_pad_type_from_name() {
        assert_eq!(PadType::from_name("alto"), Some(PadType::Alto));
        assert_eq!(PadType::from_name("BASS"), Some(PadType::Bass));
        assert_eq!(PadType::from_name("kazoo"), None);
    }
}
