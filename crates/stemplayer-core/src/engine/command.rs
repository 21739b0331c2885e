//! Lock-free command ring from the control path to the render path
//!
//! The control path pushes, the render callback pops everything pending at
//! the start of each block. Both ends are wait-free, so issuing a command
//! never stalls the audio thread.

use super::voice::Segment;

/// Capacity of the route command ring
///
/// Commands arrive at human speed and are drained every block, so a small
/// ring is plenty.
pub const ROUTE_QUEUE_CAPACITY: usize = 64;

/// Commands applied by the render path at block boundaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteCommand {
    /// Start every voice on the same segment
    ///
    /// One command covers all voices, so a schedule is applied to the whole
    /// route within a single block or not at all.
    Schedule(Segment),
    /// Silence every voice and drop its segment
    Stop,
}

/// Create the producer/consumer pair for one route
pub fn command_channel() -> (rtrb::Producer<RouteCommand>, rtrb::Consumer<RouteCommand>) {
    rtrb::RingBuffer::new(ROUTE_QUEUE_CAPACITY)
}
