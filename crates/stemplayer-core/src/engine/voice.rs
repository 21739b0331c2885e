//! Per-track output voices
//!
//! A [`Voice`] lives on the render thread and plays one track's stem from a
//! [`Segment`]. Its [`VoiceAtomics`] are the only state shared with the
//! control path:
//!
//! - `gain` is written by the control path and read every block
//! - `generation` and `rendered` are written by the render path and tell
//!   the control path how far the current segment has played
//!
//! The generation check means a position read can never be attributed to
//! the wrong segment: until the render path has picked up a new schedule,
//! the control path sees "nothing rendered yet" rather than the leftovers
//! of the previous one.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::song::StemSource;
use crate::types::{FramePosition, Sample, SampleRate, StereoSample};

/// One scheduled stretch of playback, identical for every voice of a route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Schedule counter this segment belongs to
    pub generation: u64,
    /// Device clock frame at which rendering begins
    pub start_at: u64,
    /// First frame to play, in output frame space
    pub start_frame: FramePosition,
    /// Frames to play, in output frame space
    pub frame_count: u64,
}

/// Voice state visible to the control path (lock-free)
pub struct VoiceAtomics {
    gain: AtomicU32,
    generation: AtomicU64,
    rendered: AtomicU64,
}

impl VoiceAtomics {
    pub fn new(gain: Sample) -> Self {
        Self {
            gain: AtomicU32::new(gain.to_bits()),
            generation: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn gain(&self) -> Sample {
        Sample::from_bits(self.gain.load(Ordering::Relaxed))
    }

    /// Takes effect from the next rendered block, no rescheduling needed
    #[inline]
    pub fn set_gain(&self, gain: Sample) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Output frames rendered of segment `generation`
    ///
    /// Returns `None` while the render path has not picked that segment up.
    #[inline]
    pub fn rendered_for(&self, generation: u64) -> Option<u64> {
        if self.generation.load(Ordering::Acquire) != generation {
            return None;
        }
        Some(self.rendered.load(Ordering::Acquire))
    }
}

/// Render-side player of one track
pub struct Voice {
    source: StemSource,
    atomics: Arc<VoiceAtomics>,
    segment: Option<Segment>,
    rendered: u64,
    /// Recorded frames advanced per output frame (R / O)
    step: f64,
}

impl Voice {
    pub fn new(
        source: StemSource,
        atomics: Arc<VoiceAtomics>,
        recorded: SampleRate,
        output: SampleRate,
    ) -> Self {
        Self {
            source,
            atomics,
            segment: None,
            rendered: 0,
            step: recorded.ratio_to(output),
        }
    }

    pub(crate) fn begin(&mut self, segment: Segment) {
        self.segment = Some(segment);
        self.rendered = 0;
        self.atomics.rendered.store(0, Ordering::Relaxed);
        self.atomics
            .generation
            .store(segment.generation, Ordering::Release);
    }

    pub(crate) fn stop(&mut self) {
        self.segment = None;
    }

    /// Mix this voice into `out`, whose first frame is device frame `block_start`
    pub(crate) fn render_add(&mut self, out: &mut [StereoSample], block_start: u64) {
        let Some(segment) = self.segment else {
            return;
        };
        let gain = self.atomics.gain();
        let buffer = self.source.buffer();

        // Frames before start_at stay silent so every voice starts on the same frame
        let skip = segment.start_at.saturating_sub(block_start).min(out.len() as u64) as usize;

        for frame in out[skip..].iter_mut() {
            if self.rendered >= segment.frame_count {
                break;
            }
            let output_frame = segment.start_frame + self.rendered as FramePosition;
            let position = output_frame as f64 * self.step;
            *frame += buffer.read_linear(position) * gain;
            self.rendered += 1;
        }

        self.atomics.rendered.store(self.rendered, Ordering::Release);
        if self.rendered >= segment.frame_count {
            self.stop();
        }
    }
}
