//! Offline backend with an explicit render clock
//!
//! Nothing runs on its own: audio only advances when the holder of the
//! [`OfflineDevice`] calls [`OfflineDevice::render_frames`]. That makes
//! "play for four seconds" a deterministic four seconds of rendered frames,
//! and lets tests flip the device format, report a not-yet-ready device or
//! refuse to start a stream on cue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::Sender;

use super::backend::AudioBackend;
use super::error::{AudioError, AudioResult};
use crate::engine::RouteRenderer;
use crate::types::OutputFormat;

/// Frames per simulated device callback
pub const OFFLINE_BLOCK_FRAMES: usize = 512;

struct OfflineState {
    format: OutputFormat,
    zero_format_queries: u32,
    failing_starts: u32,
    renderer: Option<RouteRenderer>,
    listener: Option<Sender<()>>,
    starts: u32,
    format_queries: u32,
}

fn lock(state: &Mutex<OfflineState>) -> MutexGuard<'_, OfflineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend half, handed to the transport
pub struct OfflineBackend {
    state: Arc<Mutex<OfflineState>>,
}

/// Device half, kept by whoever drives the clock
#[derive(Clone)]
pub struct OfflineDevice {
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineBackend {
    pub fn new(format: OutputFormat) -> (Self, OfflineDevice) {
        let state = Arc::new(Mutex::new(OfflineState {
            format,
            zero_format_queries: 0,
            failing_starts: 0,
            renderer: None,
            listener: None,
            starts: 0,
            format_queries: 0,
        }));
        (
            Self {
                state: state.clone(),
            },
            OfflineDevice { state },
        )
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn output_format(&mut self) -> OutputFormat {
        let mut state = lock(&self.state);
        state.format_queries += 1;
        if state.zero_format_queries > 0 {
            state.zero_format_queries -= 1;
            return OutputFormat::default();
        }
        state.format
    }

    fn start(&mut self, renderer: RouteRenderer) -> AudioResult<()> {
        let mut state = lock(&self.state);
        state.renderer = None;
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(AudioError::StreamBuildError(
                "offline device refused to start".to_string(),
            ));
        }
        if !renderer.format().is_valid() {
            return Err(AudioError::InvalidFormat(renderer.format().to_string()));
        }
        state.renderer = Some(renderer);
        state.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        lock(&self.state).renderer = None;
    }

    fn set_device_listener(&mut self, listener: Sender<()>) {
        lock(&self.state).listener = Some(listener);
    }
}

impl OfflineDevice {
    /// Run the device for `frames` frames and return the peak output level
    ///
    /// Renders in fixed-size blocks like a real callback. Returns 0.0 when no
    /// stream is running.
    pub fn render_frames(&self, frames: usize) -> f32 {
        let mut state = lock(&self.state);
        let Some(renderer) = state.renderer.as_mut() else {
            return 0.0;
        };
        let channels = renderer.format().channels.max(1) as usize;
        let mut block = vec![0.0f32; OFFLINE_BLOCK_FRAMES * channels];
        let mut remaining = frames;
        let mut peak = 0.0f32;

        while remaining > 0 {
            let n = remaining.min(OFFLINE_BLOCK_FRAMES);
            let data = &mut block[..n * channels];
            renderer.render(data);
            peak = data.iter().fold(peak, |p, s| p.max(s.abs()));
            remaining -= n;
        }
        peak
    }

    /// Run the device for `seconds` at the running stream's rate
    pub fn render_seconds(&self, seconds: f64) -> f32 {
        let rate = {
            let state = lock(&self.state);
            match &state.renderer {
                Some(renderer) => renderer.format().sample_rate,
                None => return 0.0,
            }
        };
        self.render_frames((seconds * rate as f64).round() as usize)
    }

    /// Switch the device to a new format and notify the listener
    ///
    /// The running stream keeps its old format until the route is rebuilt.
    pub fn change_format(&self, format: OutputFormat) {
        let listener = {
            let mut state = lock(&self.state);
            state.format = format;
            state.listener.clone()
        };
        if let Some(listener) = listener {
            let _ = listener.send(());
        }
    }

    /// Report a zero format for the next `queries` format queries
    pub fn report_zero_format_for(&self, queries: u32) {
        lock(&self.state).zero_format_queries = queries;
    }

    /// Refuse the next `count` stream starts
    pub fn fail_next_starts(&self, count: u32) {
        lock(&self.state).failing_starts = count;
    }

    pub fn format(&self) -> OutputFormat {
        lock(&self.state).format
    }

    /// Format of the running stream, if any
    pub fn stream_format(&self) -> Option<OutputFormat> {
        lock(&self.state).renderer.as_ref().map(|r| r.format())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).renderer.is_some()
    }

    /// Successful stream starts so far
    pub fn start_count(&self) -> u32 {
        lock(&self.state).starts
    }

    pub fn format_queries(&self) -> u32 {
        lock(&self.state).format_queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Route;
    use crate::song::test_support::test_song;

    #[test]
    fn test_renders_only_when_started() {
        let (mut backend, device) = OfflineBackend::new(OutputFormat::new(8000, 2));
        assert_eq!(device.render_frames(100), 0.0);

        let song = test_song("O", 2, 1.0, 8000);
        let (mut route, renderer) = Route::build(&song, backend.output_format());
        backend.start(renderer).unwrap();
        route.schedule(0, 0, 8000).unwrap();

        assert!((device.render_frames(1000) - 0.5).abs() < 1e-6);
        assert_eq!(route.device_clock(), 1000);

        backend.stop();
        assert!(!device.is_running());
    }

    #[test]
    fn test_zero_format_window() {
        let (mut backend, device) = OfflineBackend::new(OutputFormat::new(44100, 2));
        device.report_zero_format_for(2);

        assert!(!backend.output_format().is_valid());
        assert!(!backend.output_format().is_valid());
        assert_eq!(backend.output_format(), OutputFormat::new(44100, 2));
        assert_eq!(device.format_queries(), 3);
    }

    #[test]
    fn test_change_format_notifies_listener() {
        let (mut backend, device) = OfflineBackend::new(OutputFormat::new(44100, 2));
        let (tx, rx) = crossbeam::channel::unbounded();
        backend.set_device_listener(tx);

        device.change_format(OutputFormat::new(48000, 2));

        assert!(rx.try_recv().is_ok());
        assert_eq!(backend.output_format(), OutputFormat::new(48000, 2));
    }

    #[test]
    fn test_failing_starts() {
        let (mut backend, device) = OfflineBackend::new(OutputFormat::new(8000, 2));
        device.fail_next_starts(1);
        let song = test_song("O", 1, 0.1, 8000);

        let (_route, renderer) = Route::build(&song, OutputFormat::new(8000, 2));
        assert!(backend.start(renderer).is_err());
        let (_route, renderer) = Route::build(&song, OutputFormat::new(8000, 2));
        assert!(backend.start(renderer).is_ok());
        assert_eq!(device.start_count(), 1);
    }
}
