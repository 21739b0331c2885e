//! Common types for the stem player
//!
//! Sample and buffer types shared by the catalog, the render path and the
//! converter, plus the small value types (sample rates, frame positions,
//! output formats) that cross the control/render boundary.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// A position within a stem, in frames
///
/// Signed so that out-of-range requests (negative frames) can be expressed
/// and rejected by the converter instead of wrapping.
pub type FramePosition = i64;

/// Sample rate in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRate(pub u32);

impl SampleRate {
    pub const fn hz(hz: u32) -> Self {
        Self(hz)
    }

    /// Rate in Hz
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// A zero rate means the device has not reported its format yet
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }

    /// This rate expressed as a fraction of `other` (e.g. 48k of 44.1k = 1.088)
    #[inline]
    pub fn ratio_to(&self, other: SampleRate) -> f64 {
        self.as_f64() / other.as_f64()
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

/// Live format of the output route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Both rate and channel count must be non-zero before anything is scheduled
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }

    #[inline]
    pub fn rate(&self) -> SampleRate {
        SampleRate(self.sample_rate)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

/// A single stereo sample (left and right channels)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Linear interpolation towards `other` by `t` (0.0..=1.0)
    #[inline]
    pub fn lerp(&self, other: StereoSample, t: f32) -> Self {
        Self {
            left: self.left + (other.left - self.left) * t,
            right: self.right + (other.right - self.right) * t,
        }
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// A buffer of stereo samples
///
/// Stem audio is decoded into one of these at catalog load time and then
/// only read, never resized, by the render path.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Number of stereo frames in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame at `index`, or silence past either end
    #[inline]
    pub fn get_or_silence(&self, index: i64) -> StereoSample {
        if index < 0 {
            return StereoSample::silence();
        }
        self.samples
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Read at a fractional frame position with linear interpolation
    #[inline]
    pub fn read_linear(&self, position: f64) -> StereoSample {
        let index = position.floor() as i64;
        let frac = (position - position.floor()) as f32;
        let s0 = self.get_or_silence(index);
        if frac == 0.0 {
            return s0;
        }
        s0.lerp(self.get_or_silence(index + 1), frac)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_read_linear_interpolates_between_frames() {
        let buffer = StereoBuffer::from_vec(vec![StereoSample::mono(0.0), StereoSample::mono(1.0)]);

        assert_eq!(buffer.read_linear(0.0).left, 0.0);
        assert!((buffer.read_linear(0.25).left - 0.25).abs() < 1e-6);
        // Past the end fades towards silence instead of panicking
        assert!((buffer.read_linear(1.5).left - 0.5).abs() < 1e-6);
        assert_eq!(buffer.read_linear(5.0), StereoSample::silence());
        assert_eq!(buffer.read_linear(-3.0), StereoSample::silence());
    }

    #[test]
    fn test_output_format_validity() {
        assert!(OutputFormat::new(48000, 2).is_valid());
        assert!(!OutputFormat::new(0, 2).is_valid());
        assert!(!OutputFormat::new(48000, 0).is_valid());
        assert!(!OutputFormat::default().is_valid());
    }

    #[test]
    fn test_sample_rate_ratio() {
        let recorded = SampleRate::hz(44100);
        let output = SampleRate::hz(48000);
        assert!((output.ratio_to(recorded) - 48000.0 / 44100.0).abs() < 1e-12);
        assert!(!SampleRate::hz(0).is_valid());
    }
}
