//! Audio output backends
//!
//! Two implementations of [`AudioBackend`]:
//!
//! - [`CpalBackend`]: real hardware through CPAL (ALSA/PipeWire/JACK on
//!   Linux, CoreAudio on macOS, WASAPI on Windows)
//! - [`OfflineBackend`]: no device at all; the render clock advances only
//!   when the paired [`OfflineDevice`] is told to render
//!
//! Both run the same [`RouteRenderer`](crate::engine::RouteRenderer), so the
//! lock-free design is identical:
//!
//! - **Control thread**: pushes `RouteCommand`s into an rtrb ring
//! - **Audio thread**: owns the renderer exclusively, drains the ring per block
//! - **Atomics**: the control thread reads render progress without locks

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod offline;

pub use backend::AudioBackend;
pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
pub use cpal_backend::CpalBackend;
pub use device::{find_output_device, list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use offline::{OfflineBackend, OfflineDevice, OFFLINE_BLOCK_FRAMES};
