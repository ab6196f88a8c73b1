// SPDX-License-Identifier: MIT

//! Plan TOML (spec.md §6 "Plan TOML", §3 "Plan entry (`Require`)"). Detect
//! writes `{requires, provides}`; build reads `{entries}` and rewrites
//! `{entries}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanRequire {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProvideEntry {
    pub name: String,
}

/// What `detect` writes to `<plan-path>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectPlan {
    #[serde(default)]
    pub requires: Vec<PlanRequire>,
    #[serde(default)]
    pub provides: Vec<ProvideEntry>,
}

/// What `build` reads from, and rewrites to, `<plan-path>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildPlan {
    #[serde(default)]
    pub entries: Vec<PlanRequire>,
}

impl BuildPlan {
    /// Group requires by name — spec.md §4.7 step 2 ("group requires by
    /// name").
    pub fn entries_for(&self, name: &str) -> Vec<&PlanRequire> {
        self.entries.iter().filter(|e| e.name == name).collect()
    }
}
