// SPDX-License-Identifier: MIT

use crate::error::EngineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strata_core::{Env, EnvMap, EnvOp, Envs};

/// What a downstream layer needs to know about one upstream it links to,
/// already resolved by the caller (spec.md §4.9 step 1).
pub struct UpstreamBinding<'a> {
    pub path_as: Option<&'a str>,
    pub version_as: Option<&'a str>,
    pub layer_dir: Option<&'a Path>,
    pub version: Option<&'a str>,
}

/// Step 1 of link-env assembly: bind each `Require` link's `path_as`/
/// `version_as` names into `env`.
pub fn bind_require_links(env: &mut EnvMap, bindings: &[UpstreamBinding<'_>]) {
    for binding in bindings {
        if let (Some(name), Some(dir)) = (binding.path_as, binding.layer_dir) {
            env.set(name.to_string(), dir.display().to_string());
        }
        if let (Some(name), Some(version)) = (binding.version_as, binding.version) {
            env.set(name.to_string(), version.to_string());
        }
    }
}

/// `bin` -> `PATH`, `lib` -> `LIBRARY_PATH`, etc. (spec.md §4.9 step 2).
const POSIX_PREFIX_DIRS: &[(&str, &str)] = &[
    ("bin", "PATH"),
    ("lib", "LIBRARY_PATH"),
    ("include", "CPATH"),
    ("lib/pkgconfig", "PKG_CONFIG_PATH"),
];

/// Prefixes `PATH`/`LIBRARY_PATH`/`CPATH`/`PKG_CONFIG_PATH` with the
/// well-known subdirectories of every upstream layer directory that has
/// them, most-recently-linked first.
pub fn apply_posix_overlay(env: &mut EnvMap, upstream_dirs: &[PathBuf]) {
    for (subdir, var) in POSIX_PREFIX_DIRS {
        let additions: Vec<String> = upstream_dirs
            .iter()
            .map(|dir| dir.join(subdir))
            .filter(|candidate| candidate.is_dir())
            .map(|candidate| candidate.display().to_string())
            .collect();
        if additions.is_empty() {
            continue;
        }
        let mut parts = additions;
        if let Some(existing) = env.get(var) {
            if !existing.is_empty() {
                parts.push(existing.to_string());
            }
        }
        env.set(*var, parts.join(":"));
    }
}

fn split_op(filename: &str) -> (&str, EnvOp) {
    for (suffix, op) in [
        (".override", EnvOp::Override),
        (".prepend", EnvOp::Prepend),
        (".append", EnvOp::Append),
        (".default", EnvOp::Default),
    ] {
        if let Some(name) = filename.strip_suffix(suffix) {
            return (name, op);
        }
    }
    (filename, EnvOp::Override)
}

fn apply_op(env: &mut EnvMap, name: &str, op: EnvOp, content: &str, delim: &str) {
    let existing = env.get(name).map(str::to_string);
    let value = match op {
        EnvOp::Override => content.to_string(),
        EnvOp::Default => match existing {
            Some(e) if !e.is_empty() => return,
            _ => content.to_string(),
        },
        EnvOp::Prepend => match existing {
            Some(e) if !e.is_empty() => format!("{content}{delim}{e}"),
            _ => content.to_string(),
        },
        EnvOp::Append => match existing {
            Some(e) if !e.is_empty() => format!("{e}{delim}{content}"),
            _ => content.to_string(),
        },
    };
    env.set(name.to_string(), value);
}

/// Reads one `env`/`env.build`-style directory and applies every entry to
/// `env`, honoring `<name>.<op>` suffixes and sibling `<name>.delim` files
/// (spec.md §4.9 step 2).
pub async fn apply_env_dir(env: &mut EnvMap, dir: &Path) -> Result<(), EngineError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();

    let mut delims: HashMap<String, String> = HashMap::new();
    for path in &paths {
        let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        if let Some(name) = filename.strip_suffix(".delim") {
            let content = tokio::fs::read_to_string(path).await?;
            delims.insert(name.to_string(), content.trim_end_matches('\n').to_string());
        }
    }

    for path in &paths {
        let filename = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        if filename.ends_with(".delim") {
            continue;
        }
        let (name, op) = split_op(&filename);
        let content = tokio::fs::read_to_string(path).await?;
        let content = content.trim_end_matches('\n');
        let delim = delims.get(name).map(String::as_str).unwrap_or(":");
        apply_op(env, name, op, content, delim);
    }
    Ok(())
}

/// Materializes a layer's declared `env`/`env.build` entries to disk under
/// its layer directory, the counterpart [`apply_env_dir`] reads back for
/// every downstream linking to it.
pub async fn write_layer_env_files(layer_dir: &Path, envs: &Envs) -> Result<(), EngineError> {
    write_env_entries(&layer_dir.join("env.build"), &envs.build).await?;
    write_env_entries(&layer_dir.join("env"), &envs.launch).await?;
    Ok(())
}

async fn write_env_entries(dir: &Path, entries: &[Env]) -> Result<(), EngineError> {
    if entries.is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;
    for entry in entries {
        let suffix = match entry.op {
            EnvOp::Override => ".override",
            EnvOp::Prepend => ".prepend",
            EnvOp::Append => ".append",
            EnvOp::Default => ".default",
        };
        tokio::fs::write(dir.join(format!("{}{suffix}", entry.name)), &entry.value).await?;
        if let Some(delim) = &entry.delim {
            tokio::fs::write(dir.join(format!("{}.delim", entry.name)), delim).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn override_wins_regardless_of_existing_value() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("FOO.override"), "new").await.unwrap();
        let mut env = EnvMap::new();
        env.set("FOO", "old");
        apply_env_dir(&mut env, dir.path()).await.unwrap();
        assert_eq!(env.get("FOO"), Some("new"));
    }

    #[tokio::test]
    async fn default_does_not_clobber_existing_value() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("FOO.default"), "fallback").await.unwrap();
        let mut env = EnvMap::new();
        env.set("FOO", "existing");
        apply_env_dir(&mut env, dir.path()).await.unwrap();
        assert_eq!(env.get("FOO"), Some("existing"));
    }

    #[tokio::test]
    async fn prepend_uses_custom_delimiter() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("FOO.prepend"), "a").await.unwrap();
        tokio::fs::write(dir.path().join("FOO.delim"), ";").await.unwrap();
        let mut env = EnvMap::new();
        env.set("FOO", "b");
        apply_env_dir(&mut env, dir.path()).await.unwrap();
        assert_eq!(env.get("FOO"), Some("a;b"));
    }

    #[test]
    fn posix_overlay_prefixes_path_with_bin_dirs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        let mut env = EnvMap::new();
        env.set("PATH", "/usr/bin");
        apply_posix_overlay(&mut env, &[dir.path().to_path_buf()]);
        let path = env.get("PATH").unwrap();
        assert!(path.starts_with(&dir.path().join("bin").display().to_string()));
        assert!(path.ends_with("/usr/bin"));
    }

    #[tokio::test]
    async fn write_then_read_env_files_round_trips() {
        let dir = tempdir().unwrap();
        let envs = Envs {
            build: vec![Env {
                name: "FOO".to_string(),
                value: "bar".to_string(),
                op: EnvOp::Override,
                delim: None,
            }],
            launch: vec![],
        };
        write_layer_env_files(dir.path(), &envs).await.unwrap();
        let mut env = EnvMap::new();
        apply_env_dir(&mut env, &dir.path().join("env.build")).await.unwrap();
        assert_eq!(env.get("FOO"), Some("bar"));
    }
}
