// SPDX-License-Identifier: MIT

use crate::error::RunnerError;
use async_trait::async_trait;
use std::path::PathBuf;
use strata_core::{Dep, EnvMap};
use strata_metadata::Metadata;
use strata_sync::Streamer;

/// Directory context a runner's subprocess sees as `APP`/`MD`/`LAYER`/
/// `CACHE` (spec.md §4.3). Any of these may be absent depending on what
/// kind of node is running (a cache setup has no `LAYER`, a detect-time
/// require has no `LAYER` either).
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub app_dir: PathBuf,
    pub md_dir: Option<PathBuf>,
    pub layer_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    /// `PF_CONFIG_PATH` (spec.md §6): opaque descriptor path for the
    /// dependency downloader, forwarded to the runner's subprocess env
    /// unchanged.
    pub pf_config_path: Option<PathBuf>,
}

/// Common contract every adapter satisfies: it contributes a `version()`
/// digest component (spec.md §4.8) and runs against a streamer/env/
/// metadata triple (spec.md §4.3). `SetupRunner`/`RequireRunner`/
/// `TestRunner` share this shape exactly; `ProvideRunner` below adds deps.
#[async_trait]
pub trait Runner: Send + Sync {
    /// A stable fingerprint of this runner's configuration, folded into
    /// the layer's code digest.
    fn version(&self) -> String;

    async fn execute(
        &self,
        streamer: &Streamer,
        env: &EnvMap,
        metadata: &dyn Metadata,
        ctx: &ExecContext,
    ) -> Result<(), RunnerError>;
}

/// A provide/build runner additionally sees the layer's resolved
/// dependencies (spec.md §3 "Provide").
#[async_trait]
pub trait ProvideRunner: Send + Sync {
    fn version(&self) -> String;

    async fn provide(
        &self,
        streamer: &Streamer,
        env: &EnvMap,
        metadata: &dyn Metadata,
        deps: &[Dep],
        ctx: &ExecContext,
    ) -> Result<(), RunnerError>;
}
