// SPDX-License-Identifier: MIT

//! Loads the packfile the engine executes. Parsing the packfile's own
//! file format is explicitly out of scope for the engine itself — since
//! [`strata_core::Packfile`] already derives `serde::Deserialize`, reading
//! it is just TOML decoding; this module only decides *where* to look.

use crate::exit_error::ExitError;
use std::path::PathBuf;
use strata_core::Packfile;

/// Env var naming the packfile path, falling back to `packfile.toml` in
/// the current directory (the lifecycle binaries run with the app
/// directory as their working directory).
pub const PACKFILE_PATH_VAR: &str = "STRATA_PACKFILE_PATH";

/// `PF_CONFIG_PATH` (spec.md §6): a TOML descriptor for the dependency
/// downloader, surfaced to runners but otherwise opaque to the engine.
pub const PF_CONFIG_PATH_VAR: &str = "PF_CONFIG_PATH";

pub fn packfile_path() -> PathBuf {
    std::env::var(PACKFILE_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("packfile.toml"))
}

pub async fn load_packfile() -> Result<Packfile, ExitError> {
    let path = packfile_path();
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ExitError::new(1, format!("reading packfile '{}': {e}", path.display())))?;
    Ok(toml::from_str(&text)?)
}
