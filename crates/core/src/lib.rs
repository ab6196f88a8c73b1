// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-core: shared data model for the layer execution engine.
//!
//! This crate holds the types every other `strata-*` crate agrees on: the
//! packfile-shaped specification structs (§3 "Layer specification"), the
//! plan/descriptor on-disk schemas, and the small `EnvMap` helper. It has no
//! opinions about execution — that lives in `strata-sync` and `strata-engine`.

pub mod descriptor;
pub mod env;
pub mod error;
pub mod launch;
pub mod plan;
pub mod spec;

pub use descriptor::{CacheDescriptor, CacheMetadata, LayerDescriptor, LayerMetadata, StoreDescriptor, StoreMetadata};
pub use env::EnvMap;
pub use error::SpecError;
pub use launch::{LaunchManifest, LaunchProcess, LaunchSlice};
pub use plan::{BuildPlan, DetectPlan, PlanRequire, ProvideEntry};
pub use spec::{
    Cache, Dep, Env, EnvOp, Envs, Exec, Layer, Link, Packfile, Provide, ProfileFile, Require, Test,
    DEFAULT_SHELL,
};
