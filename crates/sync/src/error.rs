// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::Arc;

/// A cloneable node failure. Kernels share one outcome across every link
/// that reads it, so the underlying message is reference-counted rather
/// than owned (spec.md §4.5 "a link observes the upstream kernel's `err`").
#[derive(Debug, Clone)]
pub struct NodeError(Arc<str>);

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(Arc::from(message.into()))
    }

    /// Wraps an upstream failure the way the original's
    /// `xerrors.Errorf("link '%s' failed: %w", name, err)` does.
    pub fn link_failed(link_name: &str, source: &NodeError) -> Self {
        Self::new(format!("link '{link_name}' failed: {source}"))
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NodeError {}

impl From<String> for NodeError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for NodeError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
