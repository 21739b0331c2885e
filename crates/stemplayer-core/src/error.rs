//! Engine-level error types
//!
//! Only *fatal* conditions are represented here: a catalog that cannot be
//! loaded, or an output route that cannot be started at first launch.
//! Transient device trouble is recovered inside the transport and invalid
//! transport requests are ignored, so neither ever reaches a caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;

/// Errors raised while loading the song catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode stem {path:?}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Invalid catalog manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Catalog contains no songs")]
    EmptyCatalog,

    #[error("Song '{0}' has no tracks")]
    EmptySong(String),

    #[error("Track '{track}' of '{song}' has {found} frames, expected {expected}")]
    FrameCountMismatch {
        song: String,
        track: String,
        expected: u64,
        found: u64,
    },

    #[error("Song '{song}' declares an invalid sample rate: {rate}")]
    InvalidSampleRate { song: String, rate: u32 },
}

/// Fatal startup errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Output device never reported a usable format after {attempts} attempts")]
    OutputFormatUnavailable { attempts: u32 },

    #[error("Failed to spawn control thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Control loop is not running")]
    ControlLoopGone,
}

/// Result type for engine construction
pub type EngineResult<T> = Result<T, EngineError>;
