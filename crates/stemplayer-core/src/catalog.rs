//! Song catalog loading
//!
//! A catalog is a YAML manifest listing songs in order, each with its stems
//! in mix order:
//!
//! ```yaml
//! songs:
//!   - name: "Holy, Holy, Holy - 4 Parts"
//!     sample_rate: 44100
//!     tracks:
//!       - file: 01_Soprano.wav
//!         pad: soprano
//!         name: Soprano
//! ```
//!
//! Stem paths are relative to the manifest's directory. Every stem is fully
//! decoded at load time; any unreadable file aborts the load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::song::{PadType, Song, StemSource, Track};
use crate::types::{SampleRate, StereoBuffer, StereoSample};

/// Parsed catalog manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub songs: Vec<SongEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongEntry {
    pub name: String,
    /// Declared recorded rate; when absent the first stem's rate is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<SampleRate>,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEntry {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<PadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A decoded stem file
pub struct DecodedStem {
    pub buffer: StereoBuffer,
    pub sample_rate: SampleRate,
}

/// Load every song listed in the manifest at `path`
pub fn load_catalog(path: &Path) -> Result<Vec<Song>, CatalogError> {
    log::info!("Loading catalog from {:?}", path);

    let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: CatalogManifest =
        serde_yaml::from_str(&contents).map_err(|source| CatalogError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let songs = load_manifest(&manifest, base)?;

    log::info!("Catalog loaded: {} songs", songs.len());
    Ok(songs)
}

/// Build songs from an already-parsed manifest, resolving stems against `base`
pub fn load_manifest(manifest: &CatalogManifest, base: &Path) -> Result<Vec<Song>, CatalogError> {
    if manifest.songs.is_empty() {
        return Err(CatalogError::EmptyCatalog);
    }
    manifest
        .songs
        .iter()
        .map(|entry| load_song(entry, base))
        .collect()
}

fn load_song(entry: &SongEntry, base: &Path) -> Result<Song, CatalogError> {
    if entry.tracks.is_empty() {
        return Err(CatalogError::EmptySong(entry.name.clone()));
    }

    let mut rate = entry.sample_rate;
    let mut tracks = Vec::with_capacity(entry.tracks.len());

    for track_entry in &entry.tracks {
        let path = base.join(&track_entry.file);
        let stem = decode_wav(&path)?;

        match rate {
            None => rate = Some(stem.sample_rate),
            Some(declared) if declared != stem.sample_rate => {
                log::warn!(
                    "{:?} is {} but '{}' declares {}; playing at the declared rate",
                    path,
                    stem.sample_rate,
                    entry.name,
                    declared
                );
            }
            Some(_) => {}
        }

        let name = track_entry
            .name
            .clone()
            .or_else(|| {
                track_entry
                    .file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| format!("Track {}", tracks.len() + 1));

        tracks.push(Track::new(
            name,
            StemSource::new(stem.buffer),
            track_entry.pad,
        ));
    }

    let rate = rate.unwrap_or(SampleRate::hz(0));
    let song = Song::new(entry.name.clone(), rate, tracks)?;
    log::debug!(
        "Loaded '{}': {} tracks, {:.2}s at {}",
        song.name(),
        song.tracks().len(),
        song.duration_seconds(),
        rate
    );
    Ok(song)
}

/// Decode a WAV file into stereo frames
///
/// Mono files are duplicated to both channels; files with more than two
/// channels keep the first two.
pub fn decode_wav(path: &Path) -> Result<DecodedStem, CatalogError> {
    let wav_error = |source| CatalogError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_error)?
        }
    };

    let frames = samples
        .chunks_exact(channels)
        .map(|frame| match frame {
            [mono] => StereoSample::mono(*mono),
            [left, right, ..] => StereoSample::new(*left, *right),
            [] => StereoSample::silence(),
        })
        .collect();

    Ok(DecodedStem {
        buffer: StereoBuffer::from_vec(frames),
        sample_rate: SampleRate::hz(spec.sample_rate),
    })
}
