//! Output route (re)construction and device-change recovery
//!
//! A device that has just been (re)configured may briefly report a zero
//! sample rate or channel count. Building a route at that moment would
//! schedule nothing, so the format is polled with exponential backoff up to
//! a fixed number of attempts.
//!
//! At first launch running out of attempts is fatal. After a device change
//! it is not: the transport keeps its state and position, marks recovery as
//! pending, and every tick tries once more.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::player::StemPlayer;
use super::state::TransportState;
use crate::audio::AudioBackend;
use crate::engine::Route;
use crate::error::{EngineError, EngineResult};
use crate::types::OutputFormat;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and offline runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Poll the backend until it reports a usable format
pub fn await_valid_format(
    backend: &mut dyn AudioBackend,
    policy: &RetryPolicy,
) -> EngineResult<OutputFormat> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let format = backend.output_format();
        if format.is_valid() {
            if attempt > 1 {
                log::info!(
                    "{} output ready at {} after {} attempts",
                    backend.name(),
                    format,
                    attempt
                );
            }
            return Ok(format);
        }

        if attempt == 1 {
            log::warn!(
                "{} output reports unusable format {}, retrying",
                backend.name(),
                format
            );
        } else {
            log::debug!("Format attempt {}/{}: {}", attempt, attempts, format);
        }

        if attempt < attempts {
            thread::sleep(policy.backoff(attempt));
        }
    }

    Err(EngineError::OutputFormatUnavailable { attempts })
}

impl StemPlayer {
    /// React to an "output format changed" notification
    ///
    /// The position is captured against the old route before it is torn
    /// down, so a rate change (44.1k -> 48k, say) resumes at the same point
    /// in the song.
    pub fn handle_device_change(&mut self) {
        let position = self.current_frame();
        let old_format = self.route.as_ref().map(|r| r.format());
        self.starting_frame = position;
        self.anchor = None;
        self.teardown_route();

        log::info!(
            "Output format changed (was {}), rebuilding route at frame {}",
            old_format.map_or_else(|| "none".to_string(), |f| f.to_string()),
            position
        );

        if self.rebuild_route(true) {
            if self.state == TransportState::Playing {
                self.start_playback();
            }
        } else {
            log::warn!("Route rebuild failed; will retry on the next tick");
        }
        self.publish();
    }

    /// One quick rebuild attempt while recovery is pending
    pub(super) fn retry_recovery(&mut self) {
        if self.rebuild_route(false) {
            log::info!("Output route recovered");
            if self.state == TransportState::Playing {
                self.start_playback();
            }
        }
    }

    /// Replace the route for the current song
    ///
    /// With `wait` the format is awaited under the retry policy; otherwise a
    /// single query decides. Returns whether a route is live afterwards.
    pub(super) fn rebuild_route(&mut self, wait: bool) -> bool {
        self.teardown_route();

        let format = if wait {
            match await_valid_format(self.backend.as_mut(), &self.retry) {
                Ok(format) => format,
                Err(e) => {
                    log::warn!("{}", e);
                    self.recovery_pending = true;
                    return false;
                }
            }
        } else {
            let format = self.backend.output_format();
            if !format.is_valid() {
                self.recovery_pending = true;
                return false;
            }
            format
        };

        match self.start_route(format) {
            Ok(()) => {
                self.recovery_pending = false;
                true
            }
            Err(e) => {
                log::warn!("Failed to start output route: {}", e);
                self.recovery_pending = true;
                false
            }
        }
    }

    /// Build a route for the current song and hand its renderer to the backend
    pub(super) fn start_route(&mut self, format: OutputFormat) -> crate::audio::AudioResult<()> {
        self.teardown_route();
        let (route, renderer) = Route::build(self.song(), format);
        self.backend.start(renderer)?;
        self.route = Some(route);
        Ok(())
    }

    /// Drop the route; the old renderer is gone before any new one exists
    pub(super) fn teardown_route(&mut self) {
        if self.route.take().is_some() {
            self.backend.stop();
        }
    }
}
