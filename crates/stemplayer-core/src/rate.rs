//! Seconds ↔ frames conversion across recorded and output sample rates
//!
//! Every stored position and every stem length lives in the *recorded* frame
//! space of its song. Only at the boundary to the device (scheduling a
//! segment, reading back how far a voice has rendered) is a frame offset
//! scaled into or out of the *output* frame space. Keeping the conversion at
//! that single boundary stops rounding error from compounding over repeated
//! pause/resume cycles.

use thiserror::Error;

use crate::types::{FramePosition, SampleRate};

/// Conversion request outside the representable range
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RateError {
    #[error("Position out of range: {0} seconds")]
    SecondsOutOfRange(f64),

    #[error("Position out of range: frame {0}")]
    FrameOutOfRange(FramePosition),

    #[error("Invalid sample rate: {0}")]
    InvalidRate(SampleRate),
}

/// Duration in seconds of `total_frames` recorded at `rate`
pub fn duration_seconds(total_frames: u64, rate: SampleRate) -> f64 {
    if !rate.is_valid() {
        return 0.0;
    }
    total_frames as f64 / rate.as_f64()
}

/// Map a time position onto a frame in the recorded frame space
///
/// No upper clamp is applied: seconds past the end yield frames past the
/// end. Callers that need clamping do it themselves.
pub fn seconds_to_recorded_frame(
    seconds: f64,
    rate: SampleRate,
    total_frames: u64,
) -> Result<FramePosition, RateError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(RateError::SecondsOutOfRange(seconds));
    }
    if !rate.is_valid() {
        return Err(RateError::InvalidRate(rate));
    }
    if total_frames == 0 {
        return Ok(0);
    }

    let ratio = seconds / duration_seconds(total_frames, rate);
    Ok((ratio * total_frames as f64).floor() as FramePosition)
}

/// Map a recorded frame back onto a time position
pub fn recorded_frame_to_seconds(
    frame: FramePosition,
    rate: SampleRate,
    total_frames: u64,
) -> Result<f64, RateError> {
    if frame < 0 {
        return Err(RateError::FrameOutOfRange(frame));
    }
    if !rate.is_valid() {
        return Err(RateError::InvalidRate(rate));
    }
    if total_frames == 0 {
        return Ok(0.0);
    }

    let fraction_of_song = frame as f64 / total_frames as f64;
    Ok(fraction_of_song * duration_seconds(total_frames, rate))
}

/// Re-express a frame offset from one rate's frame space in another's
///
/// `floor(frame × to/from)`, computed in integers so equal-duration offsets
/// map exactly (44100 frames at 44.1k is 48000 frames at 48k, not 47999).
/// A zero `from` rate yields frame 0.
#[inline]
pub fn scale_frame_across_rates(frame: FramePosition, from: SampleRate, to: SampleRate) -> FramePosition {
    if !from.is_valid() {
        return 0;
    }
    (frame as i128 * to.value() as i128).div_euclid(from.value() as i128) as FramePosition
}

#[cfg(test)]
mod tests {
    use super::*;

    const R44: SampleRate = SampleRate::hz(44100);
    const R48: SampleRate = SampleRate::hz(48000);

    #[test]
    fn test_negative_inputs_are_out_of_range() {
        assert_eq!(
            seconds_to_recorded_frame(-0.5, R44, 44100),
            Err(RateError::SecondsOutOfRange(-0.5))
        );
        assert_eq!(
            recorded_frame_to_seconds(-1, R44, 44100),
            Err(RateError::FrameOutOfRange(-1))
        );
        assert!(seconds_to_recorded_frame(f64::NAN, R44, 44100).is_err());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        assert!(seconds_to_recorded_frame(1.0, SampleRate::hz(0), 44100).is_err());
        assert!(recorded_frame_to_seconds(10, SampleRate::hz(0), 44100).is_err());
        assert_eq!(scale_frame_across_rates(1000, SampleRate::hz(0), R48), 0);
    }

    #[test]
    fn test_no_upper_clamp() {
        // 10 second song, asking for 12 seconds gives a frame past the end
        let total = 10 * 44100;
        let frame = seconds_to_recorded_frame(12.0, R44, total).unwrap();
        assert!(frame > total as i64);
    }

    #[test]
    fn test_seconds_frame_round_trip_within_one_frame() {
        let total: u64 = 441_000; // 10s at 44.1kHz
        let one_frame = 1.0 / R44.as_f64();
        let mut seconds = 0.0;
        while seconds <= 10.0 {
            let frame = seconds_to_recorded_frame(seconds, R44, total).unwrap();
            let back = recorded_frame_to_seconds(frame, R44, total).unwrap();
            assert!(
                (back - seconds).abs() <= one_frame,
                "{} -> {} -> {}",
                seconds,
                frame,
                back
            );
            seconds += 0.137;
        }
    }

    #[test]
    fn test_scale_across_rates_round_trip() {
        let pairs = [(R44, R48), (R48, R44), (SampleRate::hz(22050), SampleRate::hz(96000))];
        for (recorded, output) in pairs {
            let tolerance = recorded.ratio_to(output).ceil() as i64 + 1;
            for frame in [0i64, 1, 999, 44_100, 123_457, 9_999_999] {
                let there = scale_frame_across_rates(frame, recorded, output);
                let back = scale_frame_across_rates(there, output, recorded);
                assert!(
                    (back - frame).abs() <= tolerance,
                    "{} {} -> {} -> {}",
                    recorded,
                    output,
                    there,
                    back
                );
            }
        }
    }

    #[test]
    fn test_scale_is_identity_at_equal_rates() {
        assert_eq!(scale_frame_across_rates(12345, R48, R48), 12345);
    }

    #[test]
    fn test_scale_is_exact_on_whole_seconds() {
        assert_eq!(scale_frame_across_rates(44_100, R44, R48), 48_000);
        assert_eq!(scale_frame_across_rates(480_000, R48, R44), 441_000);
        assert_eq!(scale_frame_across_rates(-1, R44, R48), -2);
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(seconds_to_recorded_frame(3.0, R44, 0), Ok(0));
        assert_eq!(recorded_frame_to_seconds(0, R44, 0), Ok(0.0));
    }
}
