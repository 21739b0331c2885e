//! Stem Player - terminal front end
//!
//! Loads the song catalog, opens the output device on the control thread and
//! maps typed lines onto transport commands.
//!
//! ## Command line flags
//!
//! - `--config <path>`: engine config (default `~/Music/stemplayer/config.yaml`)
//! - `--catalog <path>`: catalog manifest, overriding the config's `catalog_path`

mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use commands::{parse_line, Input, HELP};
use stemplayer_core::audio::{list_output_devices, CpalBackend};
use stemplayer_core::catalog::load_catalog;
use stemplayer_core::config::{default_config_path, load_config, EngineConfig};
use stemplayer_core::{ControlHandle, ControlLoop, PlayerSnapshot, SongId, StemPlayer};

fn flag_value(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for scheduling detail
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path =
        flag_value(&args, "--config").unwrap_or_else(|| default_config_path("config.yaml"));
    let mut config: EngineConfig = load_config(&config_path);
    if let Some(catalog_path) = flag_value(&args, "--catalog") {
        config.catalog_path = catalog_path;
    }

    log::info!("stemplayer starting up");
    let songs = load_catalog(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {:?}", config.catalog_path))?;
    let song_list: Vec<(SongId, String)> = songs
        .iter()
        .map(|s| (s.id(), s.name().to_string()))
        .collect();

    let audio_config = config.audio.clone();
    let player_config = config.clone();
    let mut handle = ControlLoop::spawn(&config, move || {
        let backend = CpalBackend::new(audio_config);
        StemPlayer::new(songs, Box::new(backend), &player_config)
    })
    .context("Failed to start playback engine")?;

    println!("{}", HELP);
    print_status(&handle.snapshot()?);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read stdin")?;

        let input = match parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        if input == Input::Quit {
            break;
        }
        if let Err(e) = dispatch(&handle, input, &song_list) {
            println!("{:#}", e);
        }
    }

    handle.shutdown();
    log::info!("stemplayer shut down");
    Ok(())
}

fn dispatch(handle: &ControlHandle, input: Input, songs: &[(SongId, String)]) -> Result<()> {
    match input {
        Input::Play => handle.play()?,
        Input::Pause => handle.pause()?,
        Input::Toggle => handle.toggle()?,
        Input::Seek(seconds) => handle.seek(seconds)?,
        Input::Skip(seconds) => handle.skip(seconds)?,
        Input::Scrub => handle.begin_scrub()?,
        Input::Release(seconds) => handle.end_scrub(seconds)?,
        Input::Next => handle.next_song()?,
        Input::Previous => handle.previous_song()?,
        Input::Song(index) => {
            let (id, _) = songs
                .get(index)
                .with_context(|| format!("there are only {} songs", songs.len()))?;
            handle.select_song(*id)?;
        }
        Input::Mute(index) | Input::Solo(index) => {
            let snapshot = handle.snapshot()?;
            let track = snapshot
                .tracks
                .get(index)
                .with_context(|| format!("'{}' has {} stems", snapshot.song_name, snapshot.tracks.len()))?;
            if matches!(input, Input::Mute(_)) {
                handle.toggle_mute(track.id)?;
            } else {
                handle.solo(track.id)?;
            }
        }
        Input::Pad(pad) => handle.toggle_mute_pad(pad)?,
        Input::Status => {}
        Input::Songs => {
            for (i, (_, name)) in songs.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, name);
            }
            return Ok(());
        }
        Input::Devices => {
            for device in list_output_devices().context("Failed to list output devices")? {
                println!("  {}", device);
            }
            return Ok(());
        }
        Input::Help => {
            println!("{}", HELP);
            return Ok(());
        }
        Input::Quit => return Ok(()),
    }

    print_status(&handle.snapshot()?);
    Ok(())
}

fn print_status(snapshot: &PlayerSnapshot) {
    println!(
        "[{}/{}] {} - {} {} / {}{}",
        snapshot.song_index + 1,
        snapshot.song_count,
        snapshot.song_name,
        snapshot.state,
        snapshot.current_time,
        snapshot.total_time,
        if snapshot.is_scrubbing { " (scrubbing)" } else { "" }
    );
    for (i, track) in snapshot.tracks.iter().enumerate() {
        let flag = if track.is_soloed {
            "S"
        } else if track.is_muted {
            "M"
        } else {
            " "
        };
        let pad = track
            .pad_type
            .map(|p| format!(" ({})", p.display_name()))
            .unwrap_or_default();
        println!("  {} {:>2}. {}{}", flag, i + 1, track.name, pad);
    }
    if let Some(format) = snapshot.output_format {
        println!("  output {}", format);
    }
}
