// SPDX-License-Identifier: MIT

//! The packfile-shaped specification structs (spec.md §3 "Layer
//! specification", §6 "Layer descriptor TOML"). Deserialized from the
//! spec file by an external parser (out of scope, spec.md §1); this crate
//! only agrees on the shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The default shell used to execute inline/path scripts when a layer or
/// the top-level config doesn't override it.
pub const DEFAULT_SHELL: &str = "/usr/bin/env bash";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packfile {
    #[serde(default)]
    pub config: PackfileConfig,
    #[serde(default)]
    pub caches: Vec<Cache>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackfileConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shell: Option<String>,
}

/// A named directory persisted between builds (spec.md §3 "Cache
/// specification").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cache {
    pub name: String,
    #[serde(default)]
    pub setup: Option<Exec>,
}

/// One layer entry (spec.md §3 "Layer specification"). At most one of
/// `provide`/`build` may be set — enforced by [`Layer::find_provide`]'s
/// caller via [`crate::SpecError::BothProvideAndBuild`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub expose: bool,
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub require: Option<Require>,
    #[serde(default)]
    pub provide: Option<Provide>,
    #[serde(default)]
    pub build: Option<Provide>,
}

impl Layer {
    /// Returns whichever of `provide`/`build` is set. Callers that need to
    /// reject both being set should check before calling this.
    pub fn find_provide(&self) -> Option<&Provide> {
        self.provide.as_ref().or(self.build.as_ref())
    }

    pub fn has_both_provide_and_build(&self) -> bool {
        self.provide.is_some() && self.build.is_some()
    }
}

/// Detect-time contribution (spec.md §3, §4.7 "Detect").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Require {
    #[serde(flatten)]
    pub exec: Exec,
}

/// Build-time work (spec.md §3 "provide/build").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provide {
    #[serde(flatten)]
    pub exec: Exec,
    #[serde(default)]
    pub test: Option<Test>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub deps: Vec<Dep>,
    #[serde(default)]
    pub env: Envs,
    #[serde(default)]
    pub profile: Vec<ProfileFile>,
    #[serde(rename = "lock-app", default)]
    pub lock_app: bool,
}

/// An inline script, a path to one, and the shell to run it with — or, in
/// place of a script, a glob pattern selecting the built-in glob-match
/// adapter (spec.md §4.3: "two default adapters", shell-exec and
/// glob-match). `glob` is mutually exclusive with `inline`/`path`; when
/// set, the engine runs the glob-match adapter instead of a shell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exec {
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
}

impl Exec {
    pub fn shell_or(&self, default_shell: &str) -> String {
        self.shell.clone().unwrap_or_else(|| default_shell.to_string())
    }
}

/// Optional test phase of a provide block (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    #[serde(flatten)]
    pub exec: Exec,
    /// spec.md §4.5.2 Shape B: the test itself needs full upstream outputs.
    #[serde(rename = "use-links", default)]
    pub use_links: bool,
    /// spec.md §4.9: construct the full link-env (not just version/path-as)
    /// before running `Test`, not only before `Run`.
    #[serde(rename = "full-env", default)]
    pub full_env: bool,
}

/// A declared dependency from one layer on another's outputs (spec.md §3
/// "Link (declared)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    #[serde(rename = "path-as", default)]
    pub path_as: Option<String>,
    #[serde(rename = "version-as", default)]
    pub version_as: Option<String>,
    #[serde(rename = "metadata-as", default)]
    pub metadata_as: Option<String>,
    #[serde(rename = "link-content", default)]
    pub link_content: bool,
    #[serde(rename = "link-version", default)]
    pub link_version: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dep {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envs {
    #[serde(default)]
    pub build: Vec<Env>,
    #[serde(default)]
    pub launch: Vec<Env>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Env {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub op: EnvOp,
    #[serde(default)]
    pub delim: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvOp {
    #[default]
    Override,
    Prepend,
    Append,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
