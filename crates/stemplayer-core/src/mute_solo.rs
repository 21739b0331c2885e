//! Mute/solo gain state over a song's tracks
//!
//! Solo is exclusive: soloing a track mutes every other one, so "audible"
//! is always just `!is_muted`. The flags only ever become per-voice gain;
//! they never touch the scheduled position.

use crate::song::{PadType, Song, TrackId};
use crate::types::Sample;

/// Linear gain for an audible track
pub const UNITY_GAIN: Sample = 1.0;

/// Flip a track's mute flag
///
/// A solo flag survives only on the single audible track; see
/// [`reconcile_solo`]. Unknown ids are ignored.
pub fn toggle_mute(song: &mut Song, id: TrackId) {
    let Some(index) = song.track_index(id) else {
        log::debug!("toggle_mute: unknown {}", id);
        return;
    };
    let track = &mut song.tracks_mut()[index];
    track.is_muted = !track.is_muted;
    reconcile_solo(song);
}

/// Make a track the only audible one
pub fn solo(song: &mut Song, id: TrackId) {
    if song.track_index(id).is_none() {
        log::debug!("solo: unknown {}", id);
        return;
    }
    for track in song.tracks_mut() {
        let target = track.id() == id;
        track.is_muted = !target;
        track.is_soloed = target;
    }
}

/// Toggle every track labelled with `pad`
///
/// The group follows its first member: if that track is muted the whole
/// group is unmuted, otherwise the whole group is muted.
pub fn toggle_mute_pad(song: &mut Song, pad: PadType) {
    let Some(first_muted) = song
        .tracks()
        .iter()
        .find(|t| t.pad_type() == Some(pad))
        .map(|t| t.is_muted())
    else {
        log::debug!("toggle_mute_pad: no track carries pad {}", pad);
        return;
    };
    for track in song.tracks_mut() {
        if track.pad_type() == Some(pad) {
            track.is_muted = !first_muted;
        }
    }
    reconcile_solo(song);
}

/// Keep solo flags consistent with which tracks can be heard
///
/// A soloed track must be the only audible one. With several audible tracks
/// every flag goes; with exactly one, only that track may keep its flag.
/// When everything is muted the flags are left alone so re-enabling the
/// soloed track restores the solo.
fn reconcile_solo(song: &mut Song) {
    let audible = song.tracks().iter().filter(|t| t.is_audible()).count();
    for track in song.tracks_mut() {
        if audible > 1 || (audible == 1 && !track.is_audible()) {
            track.is_soloed = false;
        }
    }
}

/// Gain a track's voice should currently run at
pub fn gain_for(song: &Song, id: TrackId) -> Sample {
    match song.track(id) {
        Some(track) if track.is_audible() => UNITY_GAIN,
        _ => 0.0,
    }
}

/// Gains for every track, in mix order
pub fn gains(song: &Song) -> Vec<Sample> {
    song.tracks()
        .iter()
        .map(|t| if t.is_audible() { UNITY_GAIN } else { 0.0 })
        .collect()
}
