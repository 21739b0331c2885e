//! Line commands typed at the terminal

use anyhow::{anyhow, bail, Context, Result};
use stemplayer_core::PadType;

pub const HELP: &str = "\
Commands:
  play | pause | toggle        transport
  seek <secs> | skip <+/-secs> move the playhead
  scrub | release <secs>       hold / release the position slider
  next | prev | song <n>       navigate songs (n is 1-based)
  mute <n> | solo <n>          toggle a stem's mute / solo it (n is 1-based)
  pad <soprano|alto|tenor|bass> toggle a pad group
  status | songs | devices     show state
  help | quit";

/// One parsed terminal line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Skip(f64),
    Scrub,
    Release(f64),
    Next,
    Previous,
    /// Zero-based song index
    Song(usize),
    /// Zero-based track index in the current song
    Mute(usize),
    Solo(usize),
    Pad(PadType),
    Status,
    Songs,
    Devices,
    Help,
    Quit,
}

/// Parse a line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let input = match verb.to_ascii_lowercase().as_str() {
        "play" => Input::Play,
        "pause" => Input::Pause,
        "toggle" | "space" => Input::Toggle,
        "seek" => Input::Seek(seconds(arg)?),
        "skip" => Input::Skip(seconds(arg)?),
        "scrub" => Input::Scrub,
        "release" => Input::Release(seconds(arg)?),
        "next" | "n" => Input::Next,
        "prev" | "previous" | "p" => Input::Previous,
        "song" => Input::Song(index(arg)?),
        "mute" | "m" => Input::Mute(index(arg)?),
        "solo" | "s" => Input::Solo(index(arg)?),
        "pad" => {
            let name = arg.context("pad needs a name")?;
            Input::Pad(PadType::from_name(name).ok_or_else(|| anyhow!("unknown pad '{}'", name))?)
        }
        "status" | "st" => Input::Status,
        "songs" => Input::Songs,
        "devices" => Input::Devices,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => bail!("unknown command '{}' (try 'help')", other),
    };
    Ok(Some(input))
}

fn seconds(arg: Option<&str>) -> Result<f64> {
    let arg = arg.context("missing seconds")?;
    let value: f64 = arg
        .parse()
        .with_context(|| format!("'{}' is not a number of seconds", arg))?;
    if !value.is_finite() {
        bail!("'{}' is not a number of seconds", arg);
    }
    Ok(value)
}

/// 1-based on the terminal, 0-based internally
fn index(arg: Option<&str>) -> Result<usize> {
    let arg = arg.context("missing number")?;
    let n: usize = arg
        .parse()
        .with_context(|| format!("'{}' is not a number", arg))?;
    n.checked_sub(1).context("numbers start at 1")
}
