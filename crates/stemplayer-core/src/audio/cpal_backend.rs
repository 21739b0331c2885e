//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐   RouteCommand    ┌─────────────────────┐
//! │   Control loop   │──push()──────────►│   rtrb ring (SPSC)  │
//! │  (owns Route)    │                   └──────────┬──────────┘
//! └──────────────────┘                              │ pop()
//!         ▲                                         ▼
//!         │ acquire loads               ┌─────────────────────┐
//!  VoiceAtomics / clock ◄───────────────│  CPAL audio thread  │
//!                                       │ (owns RouteRenderer)│
//!                                       └─────────────────────┘
//! ```
//!
//! The renderer is moved into the data callback, so nothing is shared with
//! the audio thread except the ring and the atomics. A `DeviceNotAvailable`
//! stream error is forwarded to the device listener so the transport can
//! rebuild the route.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use crossbeam::channel::Sender;

use super::backend::AudioBackend;
use super::config::{AudioConfig, DEFAULT_SAMPLE_RATE};
use super::device::find_output_device;
use super::error::{AudioError, AudioResult};
use crate::engine::RouteRenderer;
use crate::types::OutputFormat;

/// Backend driving a real output device
pub struct CpalBackend {
    config: AudioConfig,
    device: Option<cpal::Device>,
    stream: Option<Stream>,
    listener: Option<Sender<()>>,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            device: None,
            stream: None,
            listener: None,
        }
    }

    fn device(&mut self) -> AudioResult<&cpal::Device> {
        if self.device.is_none() {
            let device = find_output_device(self.config.device.as_deref())?;
            log::info!(
                "Using audio device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );
            self.device = Some(device);
        }
        self.device
            .as_ref()
            .ok_or_else(|| AudioError::NoDefaultDevice("No output device".to_string()))
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn output_format(&mut self) -> OutputFormat {
        let config = self.config.clone();
        let result = self.device().and_then(|device| get_output_config(device, &config));
        match result {
            Ok(supported) => OutputFormat::new(supported.sample_rate().0, supported.channels()),
            Err(e) => {
                log::debug!("Output format unavailable: {}", e);
                // The device may have been unplugged; look it up again next time
                self.device = None;
                OutputFormat::default()
            }
        }
    }

    fn start(&mut self, mut renderer: RouteRenderer) -> AudioResult<()> {
        self.stop();

        let format = renderer.format();
        if !format.is_valid() {
            return Err(AudioError::InvalidFormat(format.to_string()));
        }

        let stream_config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.buffer_size.as_frames()),
        };

        log::info!(
            "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
            stream_config.channels,
            format.sample_rate,
            self.config.buffer_size.as_frames(),
            self.config.buffer_size.latency_ms(format.sample_rate)
        );

        let listener = self.listener.clone();
        let device = self.device()?;
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    renderer.render(data);
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        log::error!("Audio device no longer available");
                        if let Some(listener) = &listener {
                            let _ = listener.send(());
                        }
                    }
                    other => log::error!("Audio stream error: {}", other),
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!("Audio stream started at {}", format);
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Audio stream stopped");
        }
    }

    fn set_device_listener(&mut self, listener: Sender<()>) {
        self.listener = Some(listener);
    }
}

/// Pick the stream configuration for a device
///
/// Prefers f32 stereo at the configured rate (48kHz by default), falling back
/// to the closest thing the device offers.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    let best_config = supported_configs
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2 && in_range(c))
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| AudioError::ConfigError("No supported output configurations".to_string()))?;

    let sample_rate = if in_range(best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::debug!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best_config.clone().with_sample_rate(sample_rate))
}
