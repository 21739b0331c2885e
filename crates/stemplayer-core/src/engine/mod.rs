//! Playback engine - routes, voices, scheduling
//!
//! The engine is split along the thread boundary:
//!
//! - **Control path**: [`Route`] and [`Scheduler`], owned by the transport
//! - **Render path**: [`RouteRenderer`] and its voices, owned by the device
//!   callback once the backend starts it
//!
//! The two halves talk through a lock-free [`RouteCommand`] ring one way and
//! [`VoiceAtomics`] the other.

mod command;
pub mod gc;
mod renderer;
mod route;
mod scheduler;
mod voice;

pub use command::{command_channel, RouteCommand, ROUTE_QUEUE_CAPACITY};
pub use gc::gc_handle;
pub use renderer::RouteRenderer;
pub use route::Route;
pub use scheduler::{ScheduleError, ScheduleOutcome, Scheduler};
pub use voice::{Segment, Voice, VoiceAtomics};
