// SPDX-License-Identifier: MIT

//! On-disk descriptor schemas (spec.md §6 "Layer descriptor TOML", "Store
//! TOML"). These are the only cross-build memory of what a previous
//! invocation did (spec.md §3 "Layer descriptor").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `<layers-dir>/<name>.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerDescriptor {
    #[serde(default)]
    pub launch: bool,
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub metadata: LayerMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "build-id", default, skip_serializing_if = "String::is_empty")]
    pub build_id: String,
    #[serde(rename = "code-digest", default, skip_serializing_if = "String::is_empty")]
    pub code_digest: String,
    #[serde(default)]
    pub saved: BTreeMap<String, toml::Value>,
}

/// `<layers-dir>/cache/<name>.toml`: the only cross-build memory of a
/// cache's `setup` step (spec.md §4.7 point 3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheDescriptor {
    #[serde(default)]
    pub metadata: CacheMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheMetadata {
    #[serde(rename = "code-digest", default, skip_serializing_if = "String::is_empty")]
    pub code_digest: String,
}

/// `<layers-dir>/store.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreDescriptor {
    pub metadata: StoreMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreMetadata {
    #[serde(rename = "build-id", default)]
    pub build_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let mut descriptor = LayerDescriptor {
            launch: true,
            build: false,
            cache: true,
            metadata: LayerMetadata {
                version: Some("1.2.3".into()),
                build_id: "abc-123".into(),
                code_digest: "deadbeef".into(),
                saved: BTreeMap::new(),
            },
        };
        descriptor
            .metadata
            .saved
            .insert("installed_from".into(), toml::Value::String("cache".into()));

        let text = toml::to_string(&descriptor).unwrap();
        let back: LayerDescriptor = toml::from_str(&text).unwrap();
        assert_eq!(descriptor, back);
    }

    #[test]
    fn cache_descriptor_round_trips() {
        let descriptor = CacheDescriptor {
            metadata: CacheMetadata { code_digest: "deadbeef".into() },
        };
        let text = toml::to_string(&descriptor).unwrap();
        let back: CacheDescriptor = toml::from_str(&text).unwrap();
        assert_eq!(descriptor, back);
    }

    #[test]
    fn store_descriptor_round_trips() {
        let store = StoreDescriptor {
            metadata: StoreMetadata { build_id: "11111111-1111-1111-1111-111111111111".into() },
        };
        let text = toml::to_string(&store).unwrap();
        let back: StoreDescriptor = toml::from_str(&text).unwrap();
        assert_eq!(store, back);
    }
}
