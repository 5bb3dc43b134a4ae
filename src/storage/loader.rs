//! Locating and loading the configuration file.
//!
//! Searched in order, first existing file wins:
//! - `./fan_control.json`
//! - Linux: `~/.config/chassis-fan-control/fan_control.json`
//! - `/opt/fan_control/fan_control.json`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::{FanControlError, Result};
use crate::storage::types::ConfigFile;

// =============================================================================
// Config Path
// =============================================================================

const APP_NAME: &str = "chassis-fan-control";
const CONFIG_FILE: &str = "fan_control.json";
const SYSTEM_CONFIG_DIR: &str = "/opt/fan_control";

/// Per-user configuration directory, if the platform has one.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}

/// Candidate paths. An explicit path replaces the whole search list.
pub fn config_search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }

    let mut paths = vec![PathBuf::from(CONFIG_FILE)];
    if let Some(dir) = get_config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    paths.push(Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE));
    paths
}

/// First existing file among `paths`.
pub fn find_config(paths: &[PathBuf]) -> Result<PathBuf> {
    paths
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| FanControlError::ConfigNotFound {
            searched: paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Read and parse the document at `path` without validating it.
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path).map_err(|source| FanControlError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::from_json(&content)
}

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    debug!("Loading configuration from {}", path.display());
    read_config_file(path)?.into_controller_config()
}

/// Search for the configuration and load the first file found.
///
/// Returns the path it was loaded from alongside the configuration.
pub fn locate_and_load(explicit: Option<&Path>) -> Result<(PathBuf, ControllerConfig)> {
    let path = find_config(&config_search_paths(explicit))?;
    let config = load_config(&path)?;
    Ok((path, config))
}
