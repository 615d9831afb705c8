//! On-disk state locations for Chuckterm
//!
//! Everything Chuckterm persists sits in a single directory under the
//! platform config root (~/.config/chuckterm on Linux): the message
//! cache database, the OAuth client secret, and the cached token. This
//! crate resolves those paths and reads the JSON files among them.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory name under the platform config root
const APP_DIR: &str = "chuckterm";

/// Filename of the message cache database
const DB_FILE: &str = "chuckterm.db";

/// The Chuckterm state directory. Not created here; writers create it
/// on first write.
pub fn state_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|root| root.join(APP_DIR))
        .ok_or_else(|| anyhow!("no config directory on this platform"))
}

/// Path of a file inside the state directory
pub fn state_path(filename: &str) -> Result<PathBuf> {
    Ok(state_dir()?.join(filename))
}

/// Where the message cache database lives
pub fn db_path() -> Result<PathBuf> {
    state_path(DB_FILE)
}

/// Whether the named file is present in the state directory
pub fn state_file_exists(filename: &str) -> bool {
    state_path(filename).map(|p| p.exists()).unwrap_or(false)
}

/// Read and deserialize a JSON file from the state directory
pub fn read_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    read_json_path(&state_path(filename)?)
}

/// Read and deserialize a JSON file at an explicit path
pub fn read_json_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}
