// SPDX-License-Identifier: MIT

//! `<layers-dir>/launch.toml` (spec.md §6). Image assembly is a declared
//! Non-goal, so the engine only ever writes the empty form of this file;
//! the schema is carried so a downstream image builder has somewhere to
//! read `processes`/`slices` from once one exists.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LaunchManifest {
    #[serde(default)]
    pub processes: Vec<LaunchProcess>,
    #[serde(default)]
    pub slices: Vec<LaunchSlice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchProcess {
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchSlice {
    pub paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_round_trips() {
        let manifest = LaunchManifest::default();
        let text = toml::to_string(&manifest).unwrap();
        let back: LaunchManifest = toml::from_str(&text).unwrap();
        assert_eq!(manifest, back);
    }
}
