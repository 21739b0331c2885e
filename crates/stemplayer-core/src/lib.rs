//! Stem Player Core - synchronized multi-stem playback engine
//!
//! Plays the stems of one song in lockstep on a single output device, with
//! live per-stem mute/solo, scrubbing, song navigation and transparent
//! recovery from output reconfiguration.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod mute_solo;
pub mod rate;
pub mod song;
pub mod time;
pub mod transport;
pub mod types;

pub use control::{ControlHandle, ControlLoop, PlayerCommand};
pub use error::{CatalogError, EngineError, EngineResult};
pub use song::{PadType, Song, SongId, Track, TrackId};
pub use transport::{PlayerSnapshot, StemPlayer, TransportState};
pub use types::*;
