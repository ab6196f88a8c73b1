// SPDX-License-Identifier: MIT

//! `EnvMap` (grounded on `original_source/interface.go`'s `EnvMap`): the
//! process environment representation threaded through runners and the
//! link-env assembly step (spec.md §4.9).

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap(BTreeMap<String, String>);

impl EnvMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Seeds from the current process environment, as the kernel does
    /// before applying link-env overlays (spec.md §4.9).
    pub fn from_process_env() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Environ()` in the original: flattens to `KEY=VALUE` pairs for
    /// `std::process::Command::envs`.
    pub fn environ(&self) -> Vec<(String, String)> {
        self.0.clone().into_iter().collect()
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
