//! Output backend trait
//!
//! A backend owns the device side of a route: it reports the live output
//! format, runs a [`RouteRenderer`] on its audio thread, and raises a
//! payload-free notification when the device's format changes underneath
//! it. The transport never talks to a device any other way.

use crossbeam::channel::Sender;

use super::error::AudioResult;
use crate::engine::RouteRenderer;
use crate::types::OutputFormat;

pub trait AudioBackend {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Query the device's current format
    ///
    /// A zero rate or channel count means the device is not ready yet.
    fn output_format(&mut self) -> OutputFormat;

    /// Start rendering `renderer`, replacing whatever was running
    fn start(&mut self, renderer: RouteRenderer) -> AudioResult<()>;

    /// Stop rendering and release the stream
    fn stop(&mut self);

    /// Where to send "output format changed" notifications
    fn set_device_listener(&mut self, listener: Sender<()>);
}
