//! Default locations for the catalog and config files

use std::path::PathBuf;

/// `~/Music/stemplayer`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("stemplayer")
}

/// `~/Music/stemplayer/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_data_dir().join(filename)
}

/// `~/Music/stemplayer/catalog.yaml`
pub fn default_catalog_path() -> PathBuf {
    default_data_dir().join("catalog.yaml")
}
