//! Transport: playback state, position and device-change recovery
//!
//! [`StemPlayer`] is the single owner of transport state. It is driven from
//! one control thread (see [`crate::control`]) and publishes a lock-free
//! mirror in [`TransportAtomics`] for UI reads.

mod player;
mod recovery;
mod state;

pub use player::StemPlayer;
pub use recovery::{await_valid_format, RetryPolicy};
pub use state::{PlayerSnapshot, TrackView, TransportAtomics, TransportState};
