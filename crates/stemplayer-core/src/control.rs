//! Control loop: the single serialized queue in front of the transport
//!
//! Commands, snapshot queries, periodic ticks and device notifications all
//! arrive as one [`ControlEvent`] type and are handled one at a time on the
//! `stem-control` thread, which owns the [`StemPlayer`]. Nothing else ever
//! touches transport state.
//!
//! The player is built *on* the control thread by a factory closure: a CPAL
//! stream is not `Send` on every platform, so the backend must live where it
//! was created.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::song::{PadType, SongId, TrackId};
use crate::transport::{PlayerSnapshot, StemPlayer, TransportAtomics};

/// Transport commands accepted by the control loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Skip(f64),
    NextSong,
    PreviousSong,
    SelectSong(SongId),
    ToggleMute(TrackId),
    Solo(TrackId),
    ToggleMutePad(PadType),
    BeginScrub,
    EndScrub(f64),
}

impl PlayerCommand {
    pub fn apply(self, player: &mut StemPlayer) {
        match self {
            PlayerCommand::Play => player.play(),
            PlayerCommand::Pause => player.pause(),
            PlayerCommand::Toggle => player.toggle(),
            PlayerCommand::Seek(seconds) => player.seek(seconds),
            PlayerCommand::Skip(seconds) => player.skip(seconds),
            PlayerCommand::NextSong => player.next_song(),
            PlayerCommand::PreviousSong => player.previous_song(),
            PlayerCommand::SelectSong(id) => player.select_song(id),
            PlayerCommand::ToggleMute(id) => player.toggle_mute(id),
            PlayerCommand::Solo(id) => player.solo(id),
            PlayerCommand::ToggleMutePad(pad) => player.toggle_mute_pad(pad),
            PlayerCommand::BeginScrub => player.begin_scrub(),
            PlayerCommand::EndScrub(seconds) => player.end_scrub(seconds),
        }
    }
}

/// Everything the control thread reacts to
#[derive(Debug)]
pub enum ControlEvent {
    Command(PlayerCommand),
    /// Reply with the current observable state
    Snapshot(Sender<PlayerSnapshot>),
    Tick,
    /// The output device reconfigured itself
    DeviceChanged,
    Shutdown,
}

/// Handle one event; false once the loop should exit
fn handle_event(player: &mut StemPlayer, event: ControlEvent) -> bool {
    match event {
        ControlEvent::Command(command) => {
            log::debug!("Command: {:?}", command);
            command.apply(player);
        }
        ControlEvent::Snapshot(reply) => {
            let _ = reply.send(player.snapshot());
        }
        ControlEvent::Tick => player.tick(),
        ControlEvent::DeviceChanged => player.handle_device_change(),
        ControlEvent::Shutdown => return false,
    }
    true
}

/// Spawns the control thread
pub struct ControlLoop;

impl ControlLoop {
    /// Start the control thread and build the player on it
    ///
    /// Blocks until the factory has run, so a fatal startup error (empty
    /// catalog, no usable output) is returned here rather than lost on the
    /// thread.
    pub fn spawn<F>(config: &EngineConfig, factory: F) -> EngineResult<ControlHandle>
    where
        F: FnOnce() -> EngineResult<StemPlayer> + Send + 'static,
    {
        let (events_tx, events_rx) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let poll_interval = config.poll_interval();

        let thread = thread::Builder::new()
            .name("stem-control".into())
            .spawn(move || {
                let player = match factory() {
                    Ok(player) => player,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(player.atomics()));
                run(player, events_rx, poll_interval);
            })
            .map_err(EngineError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(atomics)) => Ok(ControlHandle {
                events: events_tx,
                atomics,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(EngineError::ControlLoopGone)
            }
        }
    }
}

fn run(mut player: StemPlayer, events: Receiver<ControlEvent>, poll_interval: Duration) {
    log::info!("Control loop started (tick every {:?})", poll_interval);

    let ticker = channel::tick(poll_interval);
    let device_events = player.device_events();
    let closed = channel::never();
    let mut device_open = true;

    loop {
        let device_rx = if device_open { &device_events } else { &closed };
        let event = crossbeam::select! {
            recv(events) -> event => event.unwrap_or(ControlEvent::Shutdown),
            recv(ticker) -> _ => ControlEvent::Tick,
            recv(device_rx) -> event => match event {
                Ok(()) => ControlEvent::DeviceChanged,
                Err(_) => {
                    log::debug!("Device notification channel closed");
                    device_open = false;
                    ControlEvent::Tick
                }
            },
        };

        if !handle_event(&mut player, event) {
            break;
        }
    }

    player.shutdown();
    log::info!("Control loop stopped");
}

/// Client side of the control loop
///
/// Commands are fire-and-forget; [`snapshot`](Self::snapshot) blocks until
/// the loop has handled everything queued before it. Dropping the handle
/// shuts the loop down.
pub struct ControlHandle {
    events: Sender<ControlEvent>,
    atomics: Arc<TransportAtomics>,
    thread: Option<JoinHandle<()>>,
}

impl ControlHandle {
    pub fn send(&self, command: PlayerCommand) -> EngineResult<()> {
        self.events
            .send(ControlEvent::Command(command))
            .map_err(|_| EngineError::ControlLoopGone)
    }

    pub fn play(&self) -> EngineResult<()> {
        self.send(PlayerCommand::Play)
    }

    pub fn pause(&self) -> EngineResult<()> {
        self.send(PlayerCommand::Pause)
    }

    pub fn toggle(&self) -> EngineResult<()> {
        self.send(PlayerCommand::Toggle)
    }

    pub fn seek(&self, seconds: f64) -> EngineResult<()> {
        self.send(PlayerCommand::Seek(seconds))
    }

    pub fn skip(&self, seconds: f64) -> EngineResult<()> {
        self.send(PlayerCommand::Skip(seconds))
    }

    pub fn next_song(&self) -> EngineResult<()> {
        self.send(PlayerCommand::NextSong)
    }

    pub fn previous_song(&self) -> EngineResult<()> {
        self.send(PlayerCommand::PreviousSong)
    }

    pub fn select_song(&self, id: SongId) -> EngineResult<()> {
        self.send(PlayerCommand::SelectSong(id))
    }

    pub fn toggle_mute(&self, id: TrackId) -> EngineResult<()> {
        self.send(PlayerCommand::ToggleMute(id))
    }

    pub fn solo(&self, id: TrackId) -> EngineResult<()> {
        self.send(PlayerCommand::Solo(id))
    }

    pub fn toggle_mute_pad(&self, pad: PadType) -> EngineResult<()> {
        self.send(PlayerCommand::ToggleMutePad(pad))
    }

    pub fn begin_scrub(&self) -> EngineResult<()> {
        self.send(PlayerCommand::BeginScrub)
    }

    pub fn end_scrub(&self, final_seconds: f64) -> EngineResult<()> {
        self.send(PlayerCommand::EndScrub(final_seconds))
    }

    /// Report an output reconfiguration from outside the backend
    pub fn notify_device_change(&self) -> EngineResult<()> {
        self.events
            .send(ControlEvent::DeviceChanged)
            .map_err(|_| EngineError::ControlLoopGone)
    }

    /// Current observable state (blocking)
    pub fn snapshot(&self) -> EngineResult<PlayerSnapshot> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.events
            .send(ControlEvent::Snapshot(reply_tx))
            .map_err(|_| EngineError::ControlLoopGone)?;
        reply_rx.recv().map_err(|_| EngineError::ControlLoopGone)
    }

    /// Lock-free transport mirror for per-frame UI reads
    pub fn atomics(&self) -> Arc<TransportAtomics> {
        self.atomics.clone()
    }

    /// Stop the loop, release the device and wait for the thread
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.events.send(ControlEvent::Shutdown);
        if thread.join().is_err() {
            log::error!("Control thread panicked");
        }
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
