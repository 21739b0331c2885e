//! Configuration for the stem player
//!
//! - Generic YAML config loading/saving
//! - Default data paths under `~/Music/stemplayer`
//! - [`EngineConfig`]: timing, retry and audio output settings

mod engine;
mod io;
mod paths;

pub use engine::EngineConfig;
pub use io::{load_config, save_config};
pub use paths::{default_catalog_path, default_config_path, default_data_dir};
