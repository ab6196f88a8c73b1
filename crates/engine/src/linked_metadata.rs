// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;
use strata_metadata::{Metadata, MetadataError, Value};

/// A metadata view that routes reads/writes addressed at a bound name to
/// an upstream's own store instead of this layer's (spec.md §4.9
/// `metadata_as`: "bind the downstream's `Metadata.Link(as)` to the
/// upstream's metadata store").
pub struct LinkedMetadata {
    own: Arc<dyn Metadata>,
    links: BTreeMap<String, Arc<dyn Metadata>>,
}

impl LinkedMetadata {
    pub fn new(own: Arc<dyn Metadata>) -> Self {
        Self {
            own,
            links: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, as_name: impl Into<String>, upstream: Arc<dyn Metadata>) {
        self.links.insert(as_name.into(), upstream);
    }

    fn route<'a>(&self, keys: &[&'a str]) -> (&dyn Metadata, &'a [&'a str]) {
        if let Some((head, rest)) = keys.split_first() {
            if let Some(upstream) = self.links.get(*head) {
                return (upstream.as_ref(), rest);
            }
        }
        (self.own.as_ref(), keys)
    }
}

impl Metadata for LinkedMetadata {
    fn read(&self, keys: &[&str]) -> Result<String, MetadataError> {
        let (store, rest) = self.route(keys);
        store.read(rest)
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, MetadataError> {
        self.own.read_all()
    }

    fn write(&self, value: &str, keys: &[&str]) -> Result<(), MetadataError> {
        let (store, rest) = self.route(keys);
        store.write(value, rest)
    }

    fn write_all(&self, values: BTreeMap<String, Value>) -> Result<(), MetadataError> {
        self.own.write_all(values)
    }

    fn delete(&self, keys: &[&str]) -> Result<(), MetadataError> {
        let (store, rest) = self.route(keys);
        store.delete(rest)
    }

    fn delete_all(&self) -> Result<(), MetadataError> {
        self.own.delete_all()
    }
}
