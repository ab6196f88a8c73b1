// SPDX-License-Identifier: MIT

use sha2::{Digest, Sha256};
use strata_core::{Dep, Env, Layer, Link};
use std::collections::BTreeMap;

/// Inputs to a build layer's code digest that require I/O to resolve
/// (spec.md §4.8 "profile file: inline content (or the file's bytes)"),
/// kept separate from [`build_layer_digest`] so the digest itself stays a
/// pure, easily-tested function.
pub async fn resolve_profile_contents(layer: &Layer) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    if let Some(provide) = layer.find_provide() {
        for profile in &provide.profile {
            if let Some(inline) = &profile.inline {
                out.push(inline.clone());
            } else if let Some(path) = &profile.path {
                out.push(tokio::fs::read_to_string(path).await?);
            }
        }
    }
    Ok(out)
}

fn metadata_field(metadata: &BTreeMap<String, toml::Value>) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

fn env_field(env: &Env) -> String {
    format!(
        "{},{},{:?},{}",
        env.name,
        env.value,
        env.op,
        env.delim.as_deref().unwrap_or("")
    )
}

fn link_field(link: &Link) -> String {
    format!(
        "{},{},{},{},{},{}",
        link.name,
        link.path_as.as_deref().unwrap_or(""),
        link.version_as.as_deref().unwrap_or(""),
        link.metadata_as.as_deref().unwrap_or(""),
        link.link_content,
        link.link_version
    )
}

fn dep_field(dep: &Dep) -> String {
    format!(
        "{},{},{},{},{}",
        dep.name,
        dep.version,
        dep.uri,
        dep.sha,
        metadata_field(&dep.metadata)
    )
}

/// The SHA-256 code digest for a build layer (spec.md §4.8): a
/// newline-separated canonical field stream, excluding any volatile state
/// like temp-file paths or timestamps.
pub fn build_layer_digest(layer: &Layer, runner_version: &str, profile_contents: &[String]) -> String {
    let mut fields = vec!["build".to_string(), layer.version.clone(), metadata_field(&layer.metadata)];
    fields.push(runner_version.to_string());

    if let Some(provide) = layer.find_provide() {
        for dep in &provide.deps {
            fields.push(dep_field(dep));
        }
        for content in profile_contents {
            fields.push(content.clone());
        }
        for env in provide.env.build.iter().chain(provide.env.launch.iter()) {
            fields.push(env_field(env));
        }
        for link in &provide.links {
            fields.push(link_field(link));
        }
    }

    hash_fields(&fields)
}

/// The code digest for a cache (spec.md §4.8): just the setup runner's
/// own version contribution.
pub fn cache_digest(runner_version: &str) -> String {
    hash_fields(&["cache".to_string(), runner_version.to_string()])
}

fn hash_fields(fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fields.join("\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strata_core::{Envs, Provide};

    fn empty_provide() -> Provide {
        Provide {
            exec: Default::default(),
            test: None,
            links: vec![],
            deps: vec![],
            env: Envs::default(),
            profile: vec![],
            lock_app: false,
        }
    }

    fn layer_with(version: &str, metadata: BTreeMap<String, toml::Value>) -> Layer {
        Layer {
            name: "deps".into(),
            export: true,
            expose: false,
            store: false,
            version: version.to_string(),
            metadata,
            require: None,
            provide: Some(empty_provide()),
            build: None,
        }
    }

    #[test]
    fn same_inputs_produce_same_digest() {
        let layer = layer_with("1.0", BTreeMap::new());
        let a = build_layer_digest(&layer, "runner-v1", &[]);
        let b = build_layer_digest(&layer, "runner-v1", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn version_bump_changes_digest() {
        let a = layer_with("1.0", BTreeMap::new());
        let b = layer_with("2.0", BTreeMap::new());
        assert_ne!(
            build_layer_digest(&a, "runner-v1", &[]),
            build_layer_digest(&b, "runner-v1", &[])
        );
    }

    #[test]
    fn metadata_order_does_not_affect_digest() {
        let mut m1 = BTreeMap::new();
        m1.insert("a".to_string(), toml::Value::String("1".into()));
        m1.insert("b".to_string(), toml::Value::String("2".into()));
        let mut m2 = BTreeMap::new();
        m2.insert("b".to_string(), toml::Value::String("2".into()));
        m2.insert("a".to_string(), toml::Value::String("1".into()));
        let a = layer_with("1.0", m1);
        let b = layer_with("1.0", m2);
        assert_eq!(
            build_layer_digest(&a, "runner-v1", &[]),
            build_layer_digest(&b, "runner-v1", &[])
        );
    }

    #[test]
    fn cache_digest_depends_only_on_runner_version() {
        assert_ne!(cache_digest("a"), cache_digest("b"));
        assert_eq!(cache_digest("a"), cache_digest("a"));
    }
}
