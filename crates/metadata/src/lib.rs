// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-metadata: hierarchical key/value store (spec.md §4.1), with
//! filesystem and in-memory backings sharing one [`Metadata`] contract.

mod fs;
mod memory;
mod value;

pub use fs::FsMetadata;
pub use memory::MemMetadata;
pub use value::Value;

use std::collections::BTreeMap;
use thiserror::Error;

/// spec.md §4.1 "Errors".
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("no keys given")]
    NoKeys,
    #[error("'{0}' is a map, not a value")]
    NotValue(String),
    #[error("'{0}' is a value, not a map")]
    NotKey(String),
    #[error("'{0}' does not exist")]
    NotExist(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hierarchical key/value map with string values at leaves (spec.md §4.1).
///
/// `keys` addresses a path into the tree; the last element is the leaf
/// name, earlier elements are the containing maps.
pub trait Metadata: Send + Sync {
    fn read(&self, keys: &[&str]) -> Result<String, MetadataError>;
    fn read_all(&self) -> Result<BTreeMap<String, Value>, MetadataError>;
    fn write(&self, value: &str, keys: &[&str]) -> Result<(), MetadataError>;
    fn write_all(&self, values: BTreeMap<String, Value>) -> Result<(), MetadataError>;
    fn delete(&self, keys: &[&str]) -> Result<(), MetadataError>;
    fn delete_all(&self) -> Result<(), MetadataError>;
}
