// SPDX-License-Identifier: MIT

use crate::decision::{decide, DecisionInputs};
use crate::digest::{build_layer_digest, resolve_profile_contents};
use crate::env_assembly::{apply_env_dir, apply_posix_overlay, bind_require_links, write_layer_env_files, UpstreamBinding};
use crate::error::EngineError;
use crate::linked_metadata::LinkedMetadata;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::{Dep, EnvMap, Layer, LayerDescriptor};
use strata_metadata::Metadata;
use strata_runner::{build_runner, ExecContext, ProvideRunner, Runner, ShellExecRunner};
use strata_sync::{Kernel, Link as SyncLink, Node, NodeError, Streamer};
use tracing::info;

/// What a downstream's `Require` link sees once this layer has settled
/// (spec.md §4.9 step 1): its directory, version, and metadata store.
pub struct LayerHandle {
    pub name: String,
    pub layer_dir: PathBuf,
    pub metadata: Arc<dyn Metadata>,
    version: Mutex<String>,
}

impl LayerHandle {
    pub fn new(name: impl Into<String>, layer_dir: PathBuf, metadata: Arc<dyn Metadata>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            layer_dir,
            metadata,
            version: Mutex::new(String::new()),
        })
    }

    pub fn version(&self) -> String {
        self.version.lock().clone()
    }

    fn set_version(&self, version: String) {
        *self.version.lock() = version;
    }
}

/// One `Require`/`Content`/`Version` link this layer depends on, already
/// resolved to the upstream's handle (spec.md §4.6, §4.9).
pub struct RequireBinding {
    pub spec: strata_core::Link,
    pub upstream: Arc<LayerHandle>,
}

/// Everything a [`LayerNode`] needs that the phase driver resolves ahead
/// of time: the graph edges translated into live kernels, the plan's
/// merged dependency list, and the previous build's bookkeeping.
pub struct LayerNodeConfig {
    pub layer: Layer,
    pub layers_dir: PathBuf,
    pub app_dir: PathBuf,
    pub default_shell: String,
    pub base_env: EnvMap,
    pub build_id: String,
    pub last_build_id: String,
    pub plan_deps: Vec<Dep>,
    pub require_bindings: Vec<RequireBinding>,
    pub owned_links: Vec<SyncLink>,
    pub pf_config_path: Option<PathBuf>,
}

/// A build layer node: the work unit the §4.5 kernel state machine drives
/// through test/run/skip (spec.md §3 "Layer specification").
pub struct LayerNode {
    kernel: Arc<Kernel>,
    handle: Arc<LayerHandle>,
    cfg: LayerNodeConfig,
    for_test: bool,
    streamer: Streamer,
}

impl LayerNode {
    /// `streamer` is the node's half of a pair the driver created; the
    /// driver keeps the paired `StreamReader` and drains it in declaration
    /// order so concurrently-running layers still print one at a time
    /// (spec.md §4.7 point 6).
    pub fn new(kernel: Arc<Kernel>, handle: Arc<LayerHandle>, cfg: LayerNodeConfig, streamer: Streamer) -> Arc<Self> {
        let for_test = cfg
            .layer
            .find_provide()
            .and_then(|p| p.test.as_ref())
            .map(|t| t.use_links)
            .unwrap_or(false);
        Arc::new(Self {
            kernel,
            handle,
            cfg,
            for_test,
            streamer,
        })
    }

    fn descriptor_path(&self) -> PathBuf {
        self.cfg.layers_dir.join(format!("{}.toml", self.handle.name))
    }

    async fn read_descriptor(&self) -> LayerDescriptor {
        match tokio::fs::read_to_string(self.descriptor_path()).await {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => LayerDescriptor::default(),
        }
    }

    async fn write_descriptor(&self, descriptor: &LayerDescriptor) -> Result<(), EngineError> {
        let text = toml::to_string_pretty(descriptor)?;
        tokio::fs::write(self.descriptor_path(), text).await?;
        Ok(())
    }

    async fn assemble_env(&self) -> Result<EnvMap, EngineError> {
        let mut env = self.cfg.base_env.clone();
        let versions: Vec<String> = self.cfg.require_bindings.iter().map(|b| b.upstream.version()).collect();
        let bindings: Vec<UpstreamBinding<'_>> = self
            .cfg
            .require_bindings
            .iter()
            .zip(versions.iter())
            .map(|(b, v)| UpstreamBinding {
                path_as: b.spec.path_as.as_deref(),
                version_as: b.spec.version_as.as_deref(),
                layer_dir: Some(b.upstream.layer_dir.as_path()),
                version: Some(v.as_str()),
            })
            .collect();
        bind_require_links(&mut env, &bindings);

        let upstream_dirs: Vec<PathBuf> = self.cfg.require_bindings.iter().map(|b| b.upstream.layer_dir.clone()).collect();
        apply_posix_overlay(&mut env, &upstream_dirs);
        for dir in &upstream_dirs {
            apply_env_dir(&mut env, &dir.join("env.build")).await?;
            apply_env_dir(&mut env, &dir.join("env")).await?;
        }
        Ok(env)
    }

    fn linked_metadata(&self) -> LinkedMetadata {
        let mut linked = LinkedMetadata::new(Arc::clone(&self.handle.metadata));
        for binding in &self.cfg.require_bindings {
            if let Some(as_name) = &binding.spec.metadata_as {
                linked.bind(as_name.clone(), Arc::clone(&binding.upstream.metadata));
            }
        }
        linked
    }

    fn exec_ctx(&self) -> ExecContext {
        ExecContext {
            app_dir: self.cfg.app_dir.clone(),
            md_dir: Some(self.cfg.layers_dir.join(format!(".{}.md", self.handle.name))),
            layer_dir: Some(self.handle.layer_dir.clone()),
            cache_dir: None,
            pf_config_path: self.cfg.pf_config_path.clone(),
        }
    }

    fn runner(&self) -> Option<ShellExecRunner> {
        let provide = self.cfg.layer.find_provide()?;
        Some(ShellExecRunner::new(provide.exec.clone(), self.cfg.default_shell.clone()))
    }
}

#[async_trait]
impl Node for LayerNode {
    async fn test(&self) -> Result<(bool, bool), NodeError> {
        let descriptor = self.read_descriptor().await;
        let provide = self
            .cfg
            .layer
            .find_provide()
            .ok_or_else(|| NodeError::new(format!("layer '{}' has no provide/build block", self.handle.name)))?;

        let profile_contents = resolve_profile_contents(&self.cfg.layer)
            .await
            .map_err(|e| NodeError::new(e.to_string()))?;
        let runner_version = self.runner().map(|r| Runner::version(&r)).unwrap_or_default();
        let new_digest = build_layer_digest(&self.cfg.layer, &runner_version, &profile_contents);

        // A declared `test` exec (spec.md §4.3's glob-match adapter, most
        // commonly) runs before the decision matrix and may overwrite this
        // layer's own `version` metadata key, e.g. a content hash that
        // changes whenever the matched app files do.
        if let Some(test) = provide.test.as_ref() {
            let has_exec = test.exec.inline.is_some() || test.exec.path.is_some() || test.exec.glob.is_some();
            if has_exec {
                let test_env = if test.full_env {
                    self.assemble_env().await.map_err(|e| NodeError::new(e.to_string()))?
                } else {
                    self.cfg.base_env.clone()
                };
                let test_runner = build_runner(&test.exec, &self.cfg.default_shell);
                let linked_metadata = self.linked_metadata();
                let ctx = self.exec_ctx();
                test_runner
                    .execute(&self.streamer, &test_env, &linked_metadata, &ctx)
                    .await
                    .map_err(|e| NodeError::new(e.to_string()))?;
            }
        }
        let new_version = self
            .handle
            .metadata
            .read(&["version"])
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.cfg.layer.version.clone());

        let decision = decide(&DecisionInputs {
            cached_build_id: &descriptor.metadata.build_id,
            last_build_id: &self.cfg.last_build_id,
            old_version: descriptor.metadata.version.as_deref().unwrap_or(""),
            new_version: &new_version,
            old_digest: &descriptor.metadata.code_digest,
            new_digest: &new_digest,
            lock_app: provide.lock_app,
            exists_on_disk: self.handle.layer_dir.is_dir(),
            expose: self.cfg.layer.expose,
            store: self.cfg.layer.store,
        });

        self.handle.set_version(new_version.clone());

        let mut updated = descriptor;
        updated.launch = self.cfg.layer.export;
        updated.build = true;
        updated.cache = self.cfg.layer.store;
        updated.metadata.version = Some(new_version);
        updated.metadata.build_id = self.cfg.build_id.clone();
        updated.metadata.code_digest = new_digest;
        self.write_descriptor(&updated)
            .await
            .map_err(|e| NodeError::new(e.to_string()))?;

        Ok((decision.exists, decision.matched))
    }

    async fn run(&self) -> Result<(), NodeError> {
        let Some(runner) = self.runner() else {
            return Err(NodeError::new(format!("layer '{}' has no provide/build block", self.handle.name)));
        };

        if self.handle.layer_dir.is_dir() {
            tokio::fs::remove_dir_all(&self.handle.layer_dir)
                .await
                .map_err(|e| NodeError::new(e.to_string()))?;
        }
        tokio::fs::create_dir_all(&self.handle.layer_dir)
            .await
            .map_err(|e| NodeError::new(e.to_string()))?;

        let env = self.assemble_env().await.map_err(|e| NodeError::new(e.to_string()))?;
        let linked_metadata = self.linked_metadata();
        let ctx = self.exec_ctx();

        let mut deps = self.cfg.plan_deps.clone();
        if let Some(provide) = self.cfg.layer.find_provide() {
            deps.extend(provide.deps.iter().cloned());
        }

        let result = runner.provide(&self.streamer, &env, &linked_metadata, &deps, &ctx).await;
        result?;

        if let Some(provide) = self.cfg.layer.find_provide() {
            write_layer_env_files(&self.handle.layer_dir, &provide.env)
                .await
                .map_err(|e| NodeError::new(e.to_string()))?;
        }
        Ok(())
    }

    async fn skip(&self) -> Result<(), NodeError> {
        info!(layer = %self.handle.name, "unchanged, skipping");
        Ok(())
    }

    fn links(&self) -> (Vec<SyncLink>, bool) {
        (self.cfg.owned_links.clone(), self.for_test)
    }

    fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    fn streamer(&self) -> &Streamer {
        &self.streamer
    }
}
