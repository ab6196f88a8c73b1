// SPDX-License-Identifier: MIT

use crate::digest::cache_digest;
use crate::error::EngineError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::{CacheDescriptor, EnvMap, Exec};
use strata_metadata::MemMetadata;
use strata_runner::{ExecContext, Runner, ShellExecRunner};
use strata_sync::{Kernel, Link as SyncLink, Node, NodeError, Streamer};
use tracing::info;

/// A named cache directory (spec.md §3 "Cache specification"). Per
/// spec.md §4.7 point 3, a cache's test is "present and digest matches,
/// as in §4.5.4 but simpler" — `version` and `lock_app` don't apply to a
/// cache, but the `setup` step's own digest still does: changing `setup`
/// invalidates and reruns it even though the directory already exists.
pub struct CacheNode {
    kernel: Arc<Kernel>,
    name: String,
    cache_dir: PathBuf,
    descriptor_path: PathBuf,
    app_dir: PathBuf,
    setup: Option<Exec>,
    default_shell: String,
    owned_links: Vec<SyncLink>,
    streamer: Streamer,
    pf_config_path: Option<PathBuf>,
}

impl CacheNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel: Arc<Kernel>,
        name: impl Into<String>,
        cache_dir: PathBuf,
        descriptor_path: PathBuf,
        app_dir: PathBuf,
        setup: Option<Exec>,
        default_shell: String,
        owned_links: Vec<SyncLink>,
        streamer: Streamer,
        pf_config_path: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kernel,
            name: name.into(),
            cache_dir,
            descriptor_path,
            app_dir,
            setup,
            default_shell,
            owned_links,
            streamer,
            pf_config_path,
        })
    }

    fn runner_version(&self) -> String {
        self.setup
            .as_ref()
            .map(|exec| ShellExecRunner::new(exec.clone(), self.default_shell.clone()))
            .map(|r| Runner::version(&r))
            .unwrap_or_default()
    }

    async fn read_descriptor(&self) -> CacheDescriptor {
        match tokio::fs::read_to_string(&self.descriptor_path).await {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => CacheDescriptor::default(),
        }
    }

    async fn write_descriptor(&self, descriptor: &CacheDescriptor) -> Result<(), EngineError> {
        let text = toml::to_string_pretty(descriptor)?;
        tokio::fs::write(&self.descriptor_path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for CacheNode {
    async fn test(&self) -> Result<(bool, bool), NodeError> {
        let exists = self.cache_dir.is_dir();
        let descriptor = self.read_descriptor().await;
        let new_digest = cache_digest(&self.runner_version());
        let matched = exists && descriptor.metadata.code_digest == new_digest;

        self.write_descriptor(&CacheDescriptor {
            metadata: strata_core::CacheMetadata { code_digest: new_digest },
        })
        .await
        .map_err(|e| NodeError::new(e.to_string()))?;

        Ok((exists, matched))
    }

    async fn run(&self) -> Result<(), NodeError> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| NodeError::new(e.to_string()))?;

        let Some(exec) = &self.setup else {
            return Ok(());
        };
        let runner = ShellExecRunner::new(exec.clone(), self.default_shell.clone());
        let env = EnvMap::from_process_env();
        let metadata = MemMetadata::new();
        let ctx = ExecContext {
            app_dir: self.app_dir.clone(),
            md_dir: None,
            layer_dir: None,
            cache_dir: Some(self.cache_dir.clone()),
            pf_config_path: self.pf_config_path.clone(),
        };
        runner
            .execute(&self.streamer, &env, &metadata, &ctx)
            .await
            .map_err(|e| NodeError::new(e.to_string()))
    }

    async fn skip(&self) -> Result<(), NodeError> {
        info!(cache = %self.name, "reusing existing cache directory, setup unchanged");
        Ok(())
    }

    fn links(&self) -> (Vec<SyncLink>, bool) {
        (self.owned_links.clone(), false)
    }

    fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    fn streamer(&self) -> &Streamer {
        &self.streamer
    }
}
