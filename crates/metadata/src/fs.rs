// SPDX-License-Identifier: MIT

use crate::{MetadataError, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem backing for [`crate::Metadata`] (spec.md §4.1): directory
/// components address keys, a leaf is a file holding the value with its
/// trailing newline stripped, a nested map is a subdirectory.
pub struct FsMetadata {
    root: PathBuf,
}

impl FsMetadata {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, keys: &[&str]) -> PathBuf {
        let mut path = self.root.clone();
        for key in keys {
            path.push(key);
        }
        path
    }
}

fn dotted(keys: &[&str]) -> String {
    keys.join(".")
}

fn io_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

impl crate::Metadata for FsMetadata {
    fn read(&self, keys: &[&str]) -> Result<String, MetadataError> {
        if keys.is_empty() {
            return Err(MetadataError::NoKeys);
        }
        let path = self.path_for(keys);
        if path.is_dir() {
            return Err(MetadataError::NotValue(dotted(keys)));
        }
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.trim_end_matches('\n').to_string()),
            Err(e) if io_not_found(&e) => Err(MetadataError::NotExist(dotted(keys))),
            Err(e) => Err(MetadataError::Io(e)),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, MetadataError> {
        read_tree(&self.root)
    }

    fn write(&self, value: &str, keys: &[&str]) -> Result<(), MetadataError> {
        if keys.is_empty() {
            return Err(MetadataError::NoKeys);
        }
        let path = self.path_for(keys);
        if path.is_dir() {
            return Err(MetadataError::NotKey(dotted(keys)));
        }
        if let Some(parent) = path.parent() {
            if parent.is_file() {
                return Err(MetadataError::NotKey(dotted(keys)));
            }
            fs::create_dir_all(parent).map_err(MetadataError::Io)?;
        }
        fs::write(&path, value).map_err(MetadataError::Io)
    }

    fn write_all(&self, values: BTreeMap<String, Value>) -> Result<(), MetadataError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(MetadataError::Io)?;
        }
        fs::create_dir_all(&self.root).map_err(MetadataError::Io)?;
        write_tree(&self.root, &values)
    }

    fn delete(&self, keys: &[&str]) -> Result<(), MetadataError> {
        if keys.is_empty() {
            return Err(MetadataError::NoKeys);
        }
        let path = self.path_for(keys);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path).map_err(MetadataError::Io),
            Ok(_) => fs::remove_file(&path).map_err(MetadataError::Io),
            Err(e) if io_not_found(&e) => Ok(()),
            Err(e) => Err(MetadataError::Io(e)),
        }
    }

    fn delete_all(&self) -> Result<(), MetadataError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if io_not_found(&e) => return Ok(()),
            Err(e) => return Err(MetadataError::Io(e)),
        };
        for entry in entries {
            let entry = entry.map_err(MetadataError::Io)?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(MetadataError::Io)?;
            } else {
                fs::remove_file(&path).map_err(MetadataError::Io)?;
            }
        }
        Ok(())
    }
}

fn read_tree(dir: &Path) -> Result<BTreeMap<String, Value>, MetadataError> {
    let mut out = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if io_not_found(&e) => return Ok(out),
        Err(e) => return Err(MetadataError::Io(e)),
    };
    for entry in entries {
        let entry = entry.map_err(MetadataError::Io)?;
        let name = entry.file_name();
        let name = name.to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            out.insert(name, Value::Map(read_tree(&path)?));
        } else {
            let contents = fs::read_to_string(&path).map_err(MetadataError::Io)?;
            out.insert(name, Value::String(contents.trim_end_matches('\n').to_string()));
        }
    }
    Ok(out)
}

fn write_tree(dir: &Path, values: &BTreeMap<String, Value>) -> Result<(), MetadataError> {
    for (key, value) in values {
        let path = dir.join(key);
        match value {
            Value::Map(m) => {
                fs::create_dir_all(&path).map_err(MetadataError::Io)?;
                write_tree(&path, m)?;
            }
            other => {
                let rendered = other
                    .as_leaf_string()
                    .ok_or_else(|| MetadataError::NotValue(key.clone()))?;
                fs::write(&path, rendered).map_err(MetadataError::Io)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        store.write("1.2.3", &["version"]).unwrap();
        assert_eq!(store.read(&["version"]).unwrap(), "1.2.3");
    }

    #[test]
    fn read_strips_trailing_newline() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("version"), "1.2.3\n").unwrap();
        let store = FsMetadata::new(dir.path());
        assert_eq!(store.read(&["version"]).unwrap(), "1.2.3");
    }

    #[test]
    fn nested_write_creates_subdirectories() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        store.write("x", &["a", "b"]).unwrap();
        assert_eq!(store.read(&["a", "b"]).unwrap(), "x");
        assert!(dir.path().join("a").is_dir());
    }

    #[test]
    fn reading_a_directory_as_value_errors() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        store.write("x", &["a", "b"]).unwrap();
        assert!(matches!(store.read(&["a"]), Err(MetadataError::NotValue(_))));
    }

    #[test]
    fn reading_missing_key_errors() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        assert!(matches!(
            store.read(&["missing"]),
            Err(MetadataError::NotExist(_))
        ));
    }

    #[test]
    fn delete_all_preserves_hidden_entries() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        store.write("x", &["version"]).unwrap();
        store.write("y", &[".scratch"]).unwrap();
        store.delete_all().unwrap();
        assert!(store.read(&["version"]).is_err());
        assert_eq!(store.read(&[".scratch"]).unwrap(), "y");
    }

    #[test]
    fn write_all_then_read_all_round_trips_modulo_hidden() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        let mut tree = BTreeMap::new();
        tree.insert("version".to_string(), Value::String("1.0".to_string()));
        let mut nested = BTreeMap::new();
        nested.insert("x".to_string(), Value::String("y".to_string()));
        tree.insert("sub".to_string(), Value::Map(nested));
        store.write_all(tree.clone()).unwrap();
        assert_eq!(store.read_all().unwrap(), tree);
    }

    #[test]
    fn delete_is_idempotent_on_missing_path() {
        let dir = tempdir().unwrap();
        let store = FsMetadata::new(dir.path());
        assert!(store.delete(&["missing"]).is_ok());
    }
}
