// SPDX-License-Identifier: MIT

use crate::{MetadataError, Value};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-memory backing for [`crate::Metadata`] (spec.md §4.1), grounded on the
/// original's `memory.go` nested-map store. Used by tests and by any layer
/// that opts out of persisting its metadata to disk.
#[derive(Default)]
pub struct MemMetadata {
    root: Mutex<BTreeMap<String, Value>>,
}

impl MemMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from an existing tree, e.g. in tests.
    pub fn with_tree(tree: BTreeMap<String, Value>) -> Self {
        Self {
            root: Mutex::new(tree),
        }
    }
}

fn dotted(keys: &[&str]) -> String {
    keys.join(".")
}

/// Walks `keys[..keys.len()-1]` as nested maps starting from `root`,
/// returning the containing map and the leaf key name.
fn descend<'a>(
    root: &'a BTreeMap<String, Value>,
    keys: &[&str],
) -> Result<(&'a BTreeMap<String, Value>, &'a str), MetadataError> {
    if keys.is_empty() {
        return Err(MetadataError::NoKeys);
    }
    let mut current = root;
    for key in &keys[..keys.len() - 1] {
        match current.get(*key) {
            Some(Value::Map(m)) => current = m,
            Some(_) => return Err(MetadataError::NotValue(dotted(keys))),
            None => return Err(MetadataError::NotExist(dotted(keys))),
        }
    }
    Ok((current, keys[keys.len() - 1]))
}

/// Same as [`descend`] but creates intermediate maps as needed, for writes.
fn descend_mut<'a>(
    root: &'a mut BTreeMap<String, Value>,
    keys: &[&str],
) -> Result<(&'a mut BTreeMap<String, Value>, &'a str), MetadataError> {
    if keys.is_empty() {
        return Err(MetadataError::NoKeys);
    }
    let mut current = root;
    for key in &keys[..keys.len() - 1] {
        let entry = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        match entry {
            Value::Map(m) => current = m,
            _ => return Err(MetadataError::NotKey(dotted(keys))),
        }
    }
    Ok((current, keys[keys.len() - 1]))
}

fn strip_hidden(tree: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    tree.iter()
        .filter(|(k, _)| !k.starts_with('.'))
        .map(|(k, v)| {
            let v = match v {
                Value::Map(m) => Value::Map(strip_hidden(m)),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

impl crate::Metadata for MemMetadata {
    fn read(&self, keys: &[&str]) -> Result<String, MetadataError> {
        let root = self.root.lock();
        let (map, leaf) = descend(&root, keys)?;
        match map.get(leaf) {
            Some(Value::Map(_)) => Err(MetadataError::NotValue(dotted(keys))),
            Some(v) => v
                .as_leaf_string()
                .ok_or_else(|| MetadataError::NotValue(dotted(keys))),
            None => Err(MetadataError::NotExist(dotted(keys))),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, MetadataError> {
        let root = self.root.lock();
        Ok(strip_hidden(&root))
    }

    fn write(&self, value: &str, keys: &[&str]) -> Result<(), MetadataError> {
        let mut root = self.root.lock();
        let (map, leaf) = descend_mut(&mut root, keys)?;
        if matches!(map.get(leaf), Some(Value::Map(_))) {
            return Err(MetadataError::NotKey(dotted(keys)));
        }
        map.insert(leaf.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn write_all(&self, values: BTreeMap<String, Value>) -> Result<(), MetadataError> {
        let mut root = self.root.lock();
        *root = values;
        Ok(())
    }

    fn delete(&self, keys: &[&str]) -> Result<(), MetadataError> {
        if keys.is_empty() {
            return Err(MetadataError::NoKeys);
        }
        let mut root = self.root.lock();
        let (map, leaf) = match descend_mut(&mut root, keys) {
            Ok(pair) => pair,
            Err(MetadataError::NotExist(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        map.remove(leaf);
        Ok(())
    }

    fn delete_all(&self) -> Result<(), MetadataError> {
        let mut root = self.root.lock();
        root.retain(|k, _| k.starts_with('.'));
        Ok(())
    }
}
