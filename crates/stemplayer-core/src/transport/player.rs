//! Transport state machine
//!
//! [`StemPlayer`] owns the catalog, the transport state, the authoritative
//! starting frame and the live route. Every method runs on the control path;
//! the render path only ever sees the route's command ring and atomics.
//!
//! The starting frame is kept in the song's recorded frame space. It only
//! moves on pause (commit what was played), seek, song change and device
//! change; while playing, the displayed position is derived from it plus the
//! reference voice's rendered frames.
//!
//! Alongside it an [`OutputAnchor`] remembers where the current stretch of
//! playback began in output frames, so pause and resume on an unchanged
//! output rate continue from the exact output frame that was reached.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver};

use super::recovery::{await_valid_format, RetryPolicy};
use super::state::{PlayerSnapshot, TrackView, TransportAtomics, TransportState};
use crate::audio::AudioBackend;
use crate::config::EngineConfig;
use crate::engine::{Route, ScheduleOutcome, Scheduler};
use crate::error::{CatalogError, EngineResult};
use crate::mute_solo;
use crate::rate::{recorded_frame_to_seconds, scale_frame_across_rates, seconds_to_recorded_frame};
use crate::song::{PadType, Song, SongId, TrackId};
use crate::time::format_time;
use crate::types::{FramePosition, SampleRate};

/// Result of trying to start the voices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PlaybackStart {
    Started,
    Exhausted,
    NoRoute,
}

/// Output-space origin of the current stretch of playback
///
/// Valid only for `rate`; seek, song change and device change drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct OutputAnchor {
    rate: SampleRate,
    /// Recorded frame the stretch began at
    recorded: FramePosition,
    /// `recorded` in output frames
    output: FramePosition,
    /// Output frames played since `output`, committed on pause
    played: FramePosition,
}

impl OutputAnchor {
    fn recorded_after(&self, played: FramePosition, recorded_rate: SampleRate) -> FramePosition {
        self.recorded + scale_frame_across_rates(played, self.rate, recorded_rate)
    }
}

/// The stem player: catalog, transport and output route
pub struct StemPlayer {
    pub(super) songs: Vec<Song>,
    pub(super) current: usize,
    pub(super) state: TransportState,
    pub(super) starting_frame: FramePosition,
    pub(super) scrubbing: bool,
    pub(super) backend: Box<dyn AudioBackend>,
    pub(super) route: Option<Route>,
    pub(super) scheduler: Scheduler,
    pub(super) retry: RetryPolicy,
    pub(super) recovery_pending: bool,
    pub(super) anchor: Option<OutputAnchor>,
    auto_advance_threshold: Duration,
    format_check_ticks: u32,
    ticks_since_format_check: u32,
    atomics: Arc<TransportAtomics>,
    device_events: Receiver<()>,
}

impl StemPlayer {
    /// Load the catalog onto an output backend, stopped at the first song
    ///
    /// Fails (fatally) on an empty catalog, or when the device never reports
    /// a usable format or refuses to start.
    pub fn new(
        songs: Vec<Song>,
        mut backend: Box<dyn AudioBackend>,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        if songs.is_empty() {
            return Err(CatalogError::EmptyCatalog.into());
        }

        let (device_tx, device_rx) = unbounded();
        backend.set_device_listener(device_tx);

        let retry = config.format_retry;
        let format = await_valid_format(backend.as_mut(), &retry)?;

        let mut player = Self {
            songs,
            current: 0,
            state: TransportState::Stopped,
            starting_frame: 0,
            scrubbing: false,
            backend,
            route: None,
            scheduler: Scheduler::new(config.start_lead_per_track()),
            retry,
            recovery_pending: false,
            anchor: None,
            auto_advance_threshold: config.auto_advance_threshold(),
            format_check_ticks: config.format_check_ticks(),
            ticks_since_format_check: 0,
            atomics: Arc::new(TransportAtomics::new()),
            device_events: device_rx,
        };

        player.start_route(format)?;
        log::info!(
            "Stem player ready on {} output: {} songs, first '{}'",
            player.backend.name(),
            player.songs.len(),
            player.song().name()
        );
        player.publish_song();
        player.publish();
        Ok(player)
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn song(&self) -> &Song {
        &self.songs[self.current]
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn song_index(&self) -> usize {
        self.current
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    pub fn is_recovery_pending(&self) -> bool {
        self.recovery_pending
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// The committed starting frame (recorded space)
    pub fn starting_frame(&self) -> FramePosition {
        self.starting_frame
    }

    pub fn atomics(&self) -> Arc<TransportAtomics> {
        self.atomics.clone()
    }

    /// Receiver for device notifications, for an event loop to select on
    pub fn device_events(&self) -> Receiver<()> {
        self.device_events.clone()
    }

    /// Position now, in recorded frames, clamped to the song
    pub fn current_frame(&self) -> FramePosition {
        let song = self.song();
        let total = song.total_frames() as FramePosition;
        let frame = match (&self.route, self.state) {
            (Some(route), TransportState::Playing) => match route.active_segment() {
                Some(segment) => {
                    let elapsed = route.elapsed_output_frames() as FramePosition;
                    let output = route.format().rate();
                    match self.anchor {
                        Some(anchor) if anchor.rate == output => anchor.recorded_after(
                            segment.start_frame + elapsed - anchor.output,
                            song.recorded_sample_rate(),
                        ),
                        _ => {
                            self.starting_frame
                                + scale_frame_across_rates(
                                    elapsed,
                                    output,
                                    song.recorded_sample_rate(),
                                )
                        }
                    }
                }
                None => self.starting_frame,
            },
            _ => self.starting_frame,
        };
        frame.clamp(0, total)
    }

    pub fn current_seconds(&self) -> f64 {
        let song = self.song();
        recorded_frame_to_seconds(
            self.current_frame(),
            song.recorded_sample_rate(),
            song.total_frames(),
        )
        .unwrap_or(0.0)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.song().duration_seconds()
    }

    // ─────────────────────────────────────────────────────────────
    // Transport commands
    // ─────────────────────────────────────────────────────────────

    /// Start playback from the starting frame
    ///
    /// A no-op while already playing. At the end of the song this moves on
    /// to the next song and plays that instead.
    pub fn play(&mut self) {
        if self.state == TransportState::Playing {
            return;
        }

        match self.start_playback() {
            PlaybackStart::Started => {
                self.state = TransportState::Playing;
            }
            PlaybackStart::Exhausted => {
                log::info!("'{}' is at its end, moving on", self.song().name());
                let next = self.next_index();
                self.change_song(next, true);
            }
            PlaybackStart::NoRoute => {
                // Playing without a route: voices start once recovery succeeds
                log::warn!("No output route; playback will start when the device recovers");
                self.state = TransportState::Playing;
                self.recovery_pending = true;
            }
        }
        self.publish();
    }

    /// Commit the played position and stop every voice
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        self.starting_frame = self.current_frame();
        if let (Some(anchor), Some(route)) = (self.anchor.as_mut(), self.route.as_ref()) {
            if let Some(segment) = route.active_segment() {
                anchor.played =
                    segment.start_frame + route.elapsed_output_frames() as FramePosition
                        - anchor.output;
            }
        }
        self.stop_voices();
        self.state = TransportState::Paused;
        log::debug!("Paused at frame {}", self.starting_frame);
        self.publish();
    }

    pub fn toggle(&mut self) {
        if self.state == TransportState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move to `seconds`, clamped to the song's duration
    ///
    /// Negative or non-finite targets are ignored. Playing stays playing
    /// from the new position; otherwise nothing is started.
    pub fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            log::debug!("Ignoring seek to {}", seconds);
            return;
        }

        let song = self.song();
        let total = song.total_frames() as FramePosition;
        let target = seconds.min(song.duration_seconds());
        let frame = match seconds_to_recorded_frame(target, song.recorded_sample_rate(), song.total_frames()) {
            Ok(frame) => frame.min(total),
            Err(e) => {
                log::debug!("Ignoring seek: {}", e);
                return;
            }
        };

        self.stop_voices();
        self.starting_frame = frame;
        self.anchor = None;

        match self.state {
            TransportState::Playing => {
                if self.start_playback() == PlaybackStart::NoRoute {
                    self.recovery_pending = true;
                }
            }
            TransportState::Stopped if frame > 0 => {
                self.state = TransportState::Paused;
            }
            _ => {}
        }
        log::debug!("Seek to {:.3}s (frame {})", target, frame);
        self.publish();
    }

    /// Seek relative to the current position, clamped to the song
    pub fn skip(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let target = (self.current_seconds() + seconds).clamp(0.0, self.duration_seconds());
        self.seek(target);
    }

    pub fn next_song(&mut self) {
        let next = self.next_index();
        let resume = self.state == TransportState::Playing;
        self.change_song(next, resume);
    }

    pub fn previous_song(&mut self) {
        let len = self.songs.len();
        let previous = (self.current + len - 1) % len;
        let resume = self.state == TransportState::Playing;
        self.change_song(previous, resume);
    }

    /// Jump to a song by id; the current song or an unknown id is a no-op
    pub fn select_song(&mut self, id: SongId) {
        let Some(index) = self.songs.iter().position(|s| s.id() == id) else {
            log::debug!("select_song: unknown {}", id);
            return;
        };
        if index == self.current {
            return;
        }
        let resume = self.state == TransportState::Playing;
        self.change_song(index, resume);
    }

    pub fn toggle_mute(&mut self, id: TrackId) {
        mute_solo::toggle_mute(&mut self.songs[self.current], id);
        self.push_gains();
    }

    pub fn solo(&mut self, id: TrackId) {
        mute_solo::solo(&mut self.songs[self.current], id);
        self.push_gains();
    }

    pub fn toggle_mute_pad(&mut self, pad: PadType) {
        mute_solo::toggle_mute_pad(&mut self.songs[self.current], pad);
        self.push_gains();
    }

    /// Suspend auto-advance and position publishing while the user drags
    pub fn begin_scrub(&mut self) {
        self.scrubbing = true;
        self.publish();
    }

    pub fn end_scrub(&mut self, final_seconds: f64) {
        self.scrubbing = false;
        self.seek(final_seconds);
        self.publish();
    }

    /// Periodic control-path step
    ///
    /// Handles pending device notifications, retries a failed route
    /// rebuild, watches for silent format drift, advances at the end of a
    /// song and publishes the position.
    pub fn tick(&mut self) {
        let mut device_changed = false;
        while self.device_events.try_recv().is_ok() {
            device_changed = true;
        }

        if device_changed {
            self.handle_device_change();
        } else if self.recovery_pending {
            self.retry_recovery();
        } else {
            self.check_format_drift();
        }

        if self.should_auto_advance() {
            log::info!("End of '{}', advancing", self.song().name());
            let next = self.next_index();
            self.change_song(next, true);
        }

        self.publish();
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let song = self.song();
        let current_seconds = self.current_seconds();
        let total_seconds = song.duration_seconds();
        let tracks = song
            .tracks()
            .iter()
            .map(|t| TrackView {
                id: t.id(),
                name: t.name().to_string(),
                pad_type: t.pad_type(),
                is_muted: t.is_muted(),
                is_soloed: t.is_soloed(),
                gain: mute_solo::gain_for(song, t.id()),
            })
            .collect();

        PlayerSnapshot {
            song_id: song.id(),
            song_name: song.name().to_string(),
            song_index: self.current,
            song_count: self.songs.len(),
            tracks,
            state: self.state,
            is_scrubbing: self.scrubbing,
            current_seconds,
            total_seconds,
            current_time: format_time(current_seconds),
            total_time: format_time(total_seconds),
            has_pads: song.has_pads(),
            output_format: self.route.as_ref().map(|r| r.format()),
        }
    }

    /// Stop output and release the device
    pub fn shutdown(&mut self) {
        self.stop_voices();
        self.teardown_route();
        log::info!("Stem player shut down");
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    fn next_index(&self) -> usize {
        (self.current + 1) % self.songs.len()
    }

    /// Schedule every voice from the starting frame
    ///
    /// Resumes from the anchored output frame when the route still runs at
    /// the anchor's rate; otherwise anchors afresh at the starting frame.
    pub(super) fn start_playback(&mut self) -> PlaybackStart {
        let Some(route) = self.route.as_mut() else {
            return PlaybackStart::NoRoute;
        };

        let song = &self.songs[self.current];
        let output = route.format().rate();
        let resume_at = match self.anchor {
            Some(anchor) if anchor.rate == output => Some(anchor.output + anchor.played),
            _ => {
                let recorded = self.starting_frame.max(0);
                self.anchor = output.is_valid().then(|| OutputAnchor {
                    rate: output,
                    recorded,
                    output: scale_frame_across_rates(recorded, song.recorded_sample_rate(), output),
                    played: 0,
                });
                None
            }
        };

        let scheduled = match resume_at {
            Some(frame) => self.scheduler.schedule_output(song, frame, route),
            None => self.scheduler.schedule(song, self.starting_frame, route),
        };
        let outcome = match scheduled {
            Ok(outcome) => outcome,
            Err(e) => {
                // Never leave a half-applied schedule: rebuild every voice and retry once
                log::warn!("Scheduling failed ({}), rebuilding route", e);
                if !self.rebuild_route(false) {
                    return PlaybackStart::NoRoute;
                }
                let Some(route) = self.route.as_mut() else {
                    return PlaybackStart::NoRoute;
                };
                let song = &self.songs[self.current];
                let resume_at = if route.format().rate() == output {
                    resume_at
                } else {
                    self.anchor = None;
                    None
                };
                let retried = match resume_at {
                    Some(frame) => self.scheduler.schedule_output(song, frame, route),
                    None => self.scheduler.schedule(song, self.starting_frame, route),
                };
                match retried {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("Scheduling failed after rebuild: {}", e);
                        self.recovery_pending = true;
                        return PlaybackStart::NoRoute;
                    }
                }
            }
        };

        match outcome {
            ScheduleOutcome::Scheduled { .. } => PlaybackStart::Started,
            ScheduleOutcome::Exhausted => PlaybackStart::Exhausted,
            ScheduleOutcome::Deferred => {
                self.recovery_pending = true;
                PlaybackStart::NoRoute
            }
        }
    }

    fn stop_voices(&mut self) {
        if let Some(route) = self.route.as_mut() {
            if !route.stop() {
                log::warn!("Route command queue full, rebuilding route");
                self.rebuild_route(false);
            }
        }
    }

    fn push_gains(&mut self) {
        if let Some(route) = &self.route {
            route.set_gains(&mute_solo::gains(self.song()));
        }
        self.publish();
    }

    /// Switch to song `index`, starting at its beginning
    fn change_song(&mut self, index: usize, resume: bool) {
        self.teardown_route();
        self.current = index;
        self.starting_frame = 0;
        self.anchor = None;
        self.state = if resume {
            TransportState::Playing
        } else {
            TransportState::Stopped
        };

        log::info!(
            "Song {}/{}: '{}' ({})",
            index + 1,
            self.songs.len(),
            self.song().name(),
            format_time(self.song().duration_seconds())
        );

        if self.rebuild_route(true) && resume {
            self.start_playback();
        }
        self.publish_song();
        self.publish();
    }

    fn should_auto_advance(&self) -> bool {
        if self.state != TransportState::Playing || self.scrubbing {
            return false;
        }
        let Some(route) = &self.route else {
            return false;
        };
        // The last output frame can map short of the last recorded frame
        if route.segment_finished() {
            return true;
        }
        let song = self.song();
        let remaining = song.total_frames() as FramePosition - self.current_frame();
        let remaining_seconds = remaining as f64 / song.recorded_sample_rate().as_f64();
        remaining_seconds <= self.auto_advance_threshold.as_secs_f64()
    }

    fn check_format_drift(&mut self) {
        self.ticks_since_format_check += 1;
        if self.ticks_since_format_check < self.format_check_ticks {
            return;
        }
        self.ticks_since_format_check = 0;

        let Some(route_format) = self.route.as_ref().map(|r| r.format()) else {
            return;
        };
        let live = self.backend.output_format();
        if live != route_format {
            log::info!("Output format drifted from {} to {}", route_format, live);
            self.handle_device_change();
        }
    }

    fn publish_song(&self) {
        let song = self.song();
        self.atomics.publish_song(
            self.current,
            song.total_frames(),
            song.recorded_sample_rate().value(),
        );
    }

    /// Mirror state (and, unless scrubbing, position) into the atomics
    pub(super) fn publish(&self) {
        self.atomics.publish_state(self.state, self.scrubbing);
        if !self.scrubbing {
            self.atomics.publish_position(self.current_frame() as u64);
        }
    }
}

impl Drop for StemPlayer {
    fn drop(&mut self) {
        self.teardown_route();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineBackend, OfflineDevice};
    use crate::engine::ROUTE_QUEUE_CAPACITY;
    use crate::error::EngineError;
    use crate::song::test_support::test_song;
    use crate::types::OutputFormat;

    const TOLERANCE: f64 = 0.05;

    fn test_config() -> EngineConfig {
        EngineConfig {
            format_retry: RetryPolicy::immediate(5),
            ..EngineConfig::default()
        }
    }

    fn player_with(songs: Vec<Song>, format: OutputFormat) -> (StemPlayer, OfflineDevice) {
        player_with_config(songs, format, &test_config())
    }

    fn player_with_config(
        songs: Vec<Song>,
        format: OutputFormat,
        config: &EngineConfig,
    ) -> (StemPlayer, OfflineDevice) {
        let (backend, device) = OfflineBackend::new(format);
        let player = StemPlayer::new(songs, Box::new(backend), config).unwrap();
        (player, device)
    }

    fn catalog() -> Vec<Song> {
        vec![
            test_song("One", 3, 10.0, 44100),
            test_song("Two", 2, 5.0, 44100),
            test_song("Three", 4, 3.0, 48000),
        ]
    }

    fn assert_near(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= TOLERANCE,
            "expected {:.3}s, got {:.3}s",
            expected,
            actual
        );
    }

    #[test]
    fn test_starts_stopped_on_first_song() {
        let (player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        assert_eq!(player.state(), TransportState::Stopped);
        assert_eq!(player.song_index(), 0);
        assert_eq!(player.current_seconds(), 0.0);
        assert!(device.is_running());
        assert_eq!(player.atomics().duration_frames(), 441_000);
    }

    #[test]
    fn test_empty_catalog_is_fatal() {
        let (backend, _device) = OfflineBackend::new(OutputFormat::new(44100, 2));
        let result = StemPlayer::new(Vec::new(), Box::new(backend), &test_config());
        assert!(matches!(result, Err(EngineError::Catalog(CatalogError::EmptyCatalog))));
    }

    #[test]
    fn test_play_pause_scenario_with_auto_advance() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        assert_eq!(player.state(), TransportState::Playing);
        assert!(device.render_seconds(4.0) > 0.0);
        player.pause();

        assert_eq!(player.state(), TransportState::Paused);
        assert_near(player.current_seconds(), 4.0);

        player.seek(8.0);
        assert_eq!(player.state(), TransportState::Paused);
        assert_near(player.current_seconds(), 8.0);

        player.play();
        device.render_seconds(2.1);
        assert_near(player.current_seconds(), 10.0);

        player.tick();
        assert_eq!(player.song_index(), 1);
        assert_eq!(player.state(), TransportState::Playing);
        assert!(player.current_seconds() < TOLERANCE);
        assert_eq!(player.route().map(|r| r.voice_count()), Some(2));
    }

    #[test]
    fn test_auto_advance_wraps_to_first_song() {
        let songs = vec![test_song("Only", 2, 1.0, 8000)];
        let (mut player, device) = player_with(songs, OutputFormat::new(8000, 2));
        let first = player.song().id();

        player.play();
        device.render_seconds(1.1);
        player.tick();

        assert_eq!(player.song_index(), 0);
        assert_eq!(player.song().id(), first);
        assert_eq!(player.state(), TransportState::Playing);
        assert!(player.current_seconds() < TOLERANCE);
    }

    #[test]
    fn test_auto_advance_at_end_across_rates_with_zero_threshold() {
        let config = EngineConfig {
            auto_advance_threshold_ms: Some(0),
            ..test_config()
        };
        // 44101 recorded frames become 48001 output frames, which map back to 44100
        let songs = vec![
            test_song("Odd", 2, 44101.0 / 44100.0, 44100),
            test_song("Next", 2, 1.0, 44100),
        ];
        let (mut player, device) =
            player_with_config(songs, OutputFormat::new(48000, 2), &config);

        player.play();
        device.render_seconds(1.1);
        assert!(player.route().map_or(false, |r| r.segment_finished()));

        player.tick();
        assert_eq!(player.song_index(), 1);
        assert_eq!(player.state(), TransportState::Playing);
    }

    #[test]
    fn test_pause_resume_keeps_position() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        device.render_seconds(2.0);
        player.pause();
        let paused_at = player.current_seconds();

        // Nothing moves while paused
        device.render_seconds(1.0);
        assert_eq!(player.current_seconds(), paused_at);

        player.play();
        device.render_seconds(1.0);
        assert_near(player.current_seconds(), paused_at + 1.0 - 0.03);
    }

    #[test]
    fn test_pause_resume_cycles_do_not_drift_across_rates() {
        let config = EngineConfig {
            start_lead_per_track_ms: 0,
            ..test_config()
        };
        let (mut player, device) = player_with_config(
            vec![test_song("One", 2, 10.0, 44100)],
            OutputFormat::new(48000, 2),
            &config,
        );

        for _ in 0..200 {
            player.play();
            device.render_frames(7);
            player.pause();
        }

        // 1400 output frames at 48kHz, floored once into 44.1kHz
        assert_eq!(player.current_frame(), 1286);
        assert_eq!(player.route().and_then(|r| r.active_segment()), None);

        player.play();
        assert_eq!(
            player.route().and_then(|r| r.active_segment()).map(|s| s.start_frame),
            Some(1400)
        );
    }

    #[test]
    fn test_seek_drops_output_anchor() {
        let config = EngineConfig {
            start_lead_per_track_ms: 0,
            ..test_config()
        };
        let (mut player, device) = player_with_config(
            vec![test_song("One", 2, 10.0, 44100)],
            OutputFormat::new(48000, 2),
            &config,
        );

        player.play();
        device.render_frames(7);
        player.pause();
        player.seek(1.0);
        player.play();

        assert_eq!(player.current_frame(), 44100);
        assert_eq!(
            player.route().and_then(|r| r.active_segment()).map(|s| s.start_frame),
            Some(48000)
        );
    }

    #[test]
    fn test_repeated_play_does_not_reschedule() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        device.render_seconds(1.0);
        let generation = player.route().and_then(|r| r.active_segment()).map(|s| s.generation);
        player.play();
        player.play();

        assert_eq!(
            player.route().and_then(|r| r.active_segment()).map(|s| s.generation),
            generation
        );
        device.render_seconds(1.0);
        assert_near(player.current_seconds(), 2.0 - 0.03);
    }

    #[test]
    fn test_seek_while_playing_stays_playing() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        device.render_seconds(0.5);
        player.seek(6.0);

        assert_eq!(player.state(), TransportState::Playing);
        assert_near(player.current_seconds(), 6.0);
        device.render_seconds(1.0);
        assert_near(player.current_seconds(), 7.0 - 0.03);
    }

    #[test]
    fn test_seek_while_paused_starts_nothing() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(3.0);
        assert_eq!(player.state(), TransportState::Paused);
        assert!(player.route().and_then(|r| r.active_segment()).is_none());
        assert_eq!(device.render_seconds(0.5), 0.0);
        assert_near(player.current_seconds(), 3.0);
    }

    #[test]
    fn test_seek_policy() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(2.0);
        player.seek(-1.0);
        assert_near(player.current_seconds(), 2.0);

        player.seek(f64::NAN);
        assert_near(player.current_seconds(), 2.0);

        player.seek(99.0);
        assert_eq!(player.current_frame(), 441_000);

        player.seek(0.0);
        assert_eq!(player.current_frame(), 0);
    }

    #[test]
    fn test_skip_is_clamped() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.skip(-5.0);
        assert_eq!(player.current_frame(), 0);
        player.skip(4.0);
        assert_near(player.current_seconds(), 4.0);
        player.skip(60.0);
        assert_near(player.current_seconds(), 10.0);
    }

    #[test]
    fn test_play_at_end_moves_to_next_song() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(10.0);
        player.play();

        assert_eq!(player.song_index(), 1);
        assert_eq!(player.state(), TransportState::Playing);
        assert!(device.render_seconds(0.5) > 0.0);
    }

    #[test]
    fn test_next_song_cycles_back() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));
        let first = player.song().id();

        for _ in 0..player.songs().len() {
            player.next_song();
        }

        assert_eq!(player.song().id(), first);
        assert_eq!(player.state(), TransportState::Stopped);
    }

    #[test]
    fn test_previous_song_wraps() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.previous_song();
        assert_eq!(player.song_index(), 2);
        assert_eq!(player.route().map(|r| r.voice_count()), Some(4));
        assert_eq!(player.atomics().song_index(), 2);
    }

    #[test]
    fn test_song_change_while_paused_resets_position() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(4.0);
        player.next_song();

        assert_eq!(player.state(), TransportState::Stopped);
        assert_eq!(player.current_frame(), 0);
        assert_near(player.duration_seconds(), 5.0);
    }

    #[test]
    fn test_select_song() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));
        let third = player.songs()[2].id();

        player.play();
        device.render_seconds(0.5);
        player.select_song(third);

        assert_eq!(player.song_index(), 2);
        assert_eq!(player.state(), TransportState::Playing);

        // Current song: nothing happens
        let generation = player.route().and_then(|r| r.active_segment()).map(|s| s.generation);
        player.select_song(third);
        assert_eq!(
            player.route().and_then(|r| r.active_segment()).map(|s| s.generation),
            generation
        );
    }

    #[test]
    fn test_mute_all_silences_output() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));
        let ids: Vec<_> = player.song().tracks().iter().map(|t| t.id()).collect();

        player.play();
        assert!(device.render_seconds(0.1) > 0.0);

        for id in &ids {
            player.toggle_mute(*id);
        }
        assert_eq!(device.render_seconds(0.1), 0.0);

        player.toggle_mute(ids[1]);
        let peak = device.render_seconds(0.1);
        assert!((peak - 0.25).abs() < 1e-3);

        let snapshot = player.snapshot();
        assert!(snapshot.tracks[0].is_muted);
        assert!(!snapshot.tracks[1].is_muted);
        assert!(snapshot.tracks[2].is_muted);
        assert_eq!(snapshot.tracks.iter().map(|t| t.gain).sum::<f32>(), 1.0);
    }

    #[test]
    fn test_solo_keeps_sync() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));
        let target = player.song().tracks()[2].id();

        player.play();
        device.render_seconds(1.0);
        let before = player.current_frame();
        player.solo(target);

        assert_eq!(player.current_frame(), before);
        let peak = device.render_seconds(0.1);
        assert!((peak - 0.25).abs() < 1e-3);
        let soloed: Vec<_> = player
            .snapshot()
            .tracks
            .iter()
            .filter(|t| t.is_soloed)
            .map(|t| t.id)
            .collect();
        assert_eq!(soloed, vec![target]);
    }

    #[test]
    fn test_scrubbing_suspends_auto_advance_and_publishing() {
        let songs = vec![test_song("A", 1, 1.0, 8000), test_song("B", 1, 1.0, 8000)];
        let (mut player, device) = player_with(songs, OutputFormat::new(8000, 2));
        let atomics = player.atomics();

        player.play();
        device.render_seconds(0.5);
        player.tick();
        let published = atomics.position_frames();

        player.begin_scrub();
        device.render_seconds(0.7);
        player.tick();

        assert_eq!(player.song_index(), 0);
        assert_eq!(atomics.position_frames(), published);
        assert!(atomics.is_scrubbing());

        player.end_scrub(0.25);
        assert!(!player.is_scrubbing());
        assert_eq!(player.state(), TransportState::Playing);
        assert_near(player.current_seconds(), 0.25);
        assert_eq!(atomics.position_frames(), 2000);
    }

    #[test]
    fn test_device_change_keeps_position() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        device.render_seconds(3.0);
        let before = player.current_seconds();

        device.change_format(OutputFormat::new(48000, 2));
        player.tick();

        assert_eq!(player.state(), TransportState::Playing);
        assert_eq!(device.stream_format(), Some(OutputFormat::new(48000, 2)));
        assert!((player.current_seconds() - before).abs() < 1.0 / 44100.0 + 1e-9);

        assert!(device.render_seconds(1.0) > 0.0);
        assert_near(player.current_seconds(), before + 1.0 - 0.03);
    }

    #[test]
    fn test_device_change_while_paused_does_not_start() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(5.0);
        device.change_format(OutputFormat::new(48000, 2));
        player.tick();

        assert_eq!(player.state(), TransportState::Paused);
        assert_near(player.current_seconds(), 5.0);
        assert_eq!(device.render_seconds(0.2), 0.0);
    }

    #[test]
    fn test_failed_recovery_is_retried_on_tick() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.play();
        device.render_seconds(1.0);
        let before = player.current_seconds();

        device.report_zero_format_for(100);
        device.change_format(OutputFormat::new(48000, 2));
        player.tick();

        assert!(player.is_recovery_pending());
        assert_eq!(player.state(), TransportState::Playing);
        assert!(player.route().is_none());
        assert_near(player.current_seconds(), before);

        device.report_zero_format_for(0);
        player.tick();

        assert!(!player.is_recovery_pending());
        assert!(device.render_seconds(0.5) > 0.0);
        assert_near(player.current_seconds(), before + 0.5 - 0.03);
    }

    #[test]
    fn test_silent_format_drift_is_detected() {
        let (backend, device) = OfflineBackend::new(OutputFormat::new(44100, 2));
        let config = EngineConfig {
            format_retry: RetryPolicy::immediate(5),
            format_check_interval_ms: 0,
            ..EngineConfig::default()
        };
        let mut player = StemPlayer::new(catalog(), Box::new(backend), &config).unwrap();

        // Format changes without a notification reaching the player
        let (_tx, rx) = unbounded();
        player.device_events = rx;
        device.change_format(OutputFormat::new(96000, 2));
        player.tick();

        assert_eq!(player.route().map(|r| r.format()), Some(OutputFormat::new(96000, 2)));
    }

    #[test]
    fn test_cold_start_retries_until_format_is_valid() {
        let (backend, device) = OfflineBackend::new(OutputFormat::new(48000, 2));
        device.report_zero_format_for(3);

        let player = StemPlayer::new(catalog(), Box::new(backend), &test_config());

        assert!(player.is_ok());
        assert!(device.is_running());
    }

    #[test]
    fn test_cold_start_gives_up() {
        let (backend, device) = OfflineBackend::new(OutputFormat::new(48000, 2));
        device.report_zero_format_for(10);

        let result = StemPlayer::new(catalog(), Box::new(backend), &test_config());

        assert!(matches!(
            result,
            Err(EngineError::OutputFormatUnavailable { attempts: 5 })
        ));
        assert!(!device.is_running());
    }

    #[test]
    fn test_cold_start_stream_failure_is_fatal() {
        let (backend, device) = OfflineBackend::new(OutputFormat::new(48000, 2));
        device.fail_next_starts(1);

        let result = StemPlayer::new(catalog(), Box::new(backend), &test_config());

        assert!(matches!(result, Err(EngineError::Audio(_))));
    }

    #[test]
    fn test_full_command_ring_rebuilds_route() {
        let (mut player, device) = player_with(catalog(), OutputFormat::new(44100, 2));

        // Nothing drains the ring while the device is not rendering
        for _ in 0..ROUTE_QUEUE_CAPACITY {
            player.play();
            player.pause();
        }

        player.play();
        assert_eq!(player.state(), TransportState::Playing);
        assert!(device.render_seconds(0.5) > 0.0);
    }

    #[test]
    fn test_snapshot_reports_time_labels() {
        let (mut player, _device) = player_with(catalog(), OutputFormat::new(44100, 2));

        player.seek(7.5);
        let snapshot = player.snapshot();

        assert_eq!(snapshot.song_name, "One");
        assert_eq!(snapshot.song_count, 3);
        assert_eq!(snapshot.current_time, "0:07");
        assert_eq!(snapshot.total_time, "0:10");
        assert_eq!(snapshot.slider_range(), 0.0..=10.0);
        assert!(snapshot.has_pads);
        assert_eq!(snapshot.output_format, Some(OutputFormat::new(44100, 2)));
    }
}
