// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-engine: the phase driver that turns a parsed packfile into a
//! running build graph (spec.md §4.5-§4.9, §4.7).

mod cache_node;
mod decision;
mod digest;
mod driver;
mod env_assembly;
mod error;
mod layer_node;
mod linked_metadata;

pub use cache_node::CacheNode;
pub use decision::{decide, Decision, DecisionInputs};
pub use digest::{build_layer_digest, cache_digest, resolve_profile_contents};
pub use driver::{run_build, run_detect, validate_spec, BuildArgs, DetectArgs};
pub use env_assembly::{apply_env_dir, apply_posix_overlay, bind_require_links, write_layer_env_files, UpstreamBinding};
pub use error::EngineError;
pub use layer_node::{LayerHandle, LayerNode, LayerNodeConfig, RequireBinding};
pub use linked_metadata::LinkedMetadata;
