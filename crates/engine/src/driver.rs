// SPDX-License-Identifier: MIT

use crate::cache_node::CacheNode;
use crate::error::EngineError;
use crate::layer_node::{LayerHandle, LayerNode, LayerNodeConfig, RequireBinding};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::{
    BuildPlan, Dep, DetectPlan, EnvMap, Layer, Packfile, PlanRequire, ProvideEntry, SpecError,
    StoreDescriptor, StoreMetadata, DEFAULT_SHELL,
};
use strata_metadata::FsMetadata;
use strata_runner::{ExecContext, Runner, RunnerError};
use strata_sync::{build_graph, node_error, run_node, Lock, Node, NodeDecl, LinkDecl, Kernel, StreamReader, Streamer};
use tracing::{info, warn};
use uuid::Uuid;

fn default_shell(packfile: &Packfile) -> String {
    packfile.config.shell.clone().unwrap_or_else(|| DEFAULT_SHELL.to_string())
}

/// Rejects specs the driver cannot safely run, before any node is spawned
/// (spec.md §7 "SpecError").
pub fn validate_spec(packfile: &Packfile) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for layer in &packfile.layers {
        if layer.has_both_provide_and_build() {
            return Err(SpecError::BothProvideAndBuild(layer.name.clone()));
        }
        if !seen.insert(layer.name.clone()) {
            return Err(SpecError::DuplicateLayerName(layer.name.clone()));
        }
    }
    for cache in &packfile.caches {
        if !seen.insert(cache.name.clone()) {
            return Err(SpecError::DuplicateLayerName(cache.name.clone()));
        }
    }

    let declared_by: std::collections::HashMap<&str, usize> = packfile
        .caches
        .iter()
        .map(|c| c.name.as_str())
        .chain(packfile.layers.iter().map(|l| l.name.as_str()))
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    for (li, layer) in packfile.layers.iter().enumerate() {
        let layer_idx = packfile.caches.len() + li;
        if let Some(provide) = layer.find_provide() {
            for link in &provide.links {
                match declared_by.get(link.name.as_str()) {
                    None => {
                        return Err(SpecError::UnknownLinkTarget {
                            layer: layer.name.clone(),
                            link: link.name.clone(),
                            target: link.name.clone(),
                        })
                    }
                    Some(&target_idx) if target_idx >= layer_idx => {
                        return Err(SpecError::ForwardLink {
                            layer: layer.name.clone(),
                            target: link.name.clone(),
                        })
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Arguments to the detect lifecycle phase (spec.md §4.7 "Detect", §6).
pub struct DetectArgs {
    pub packfile: Packfile,
    pub app_dir: PathBuf,
    pub platform_dir: PathBuf,
    pub pf_config_path: Option<PathBuf>,
}

/// Runs every layer's `require` check sequentially in declaration order
/// and aggregates the result (spec.md §4.7 point 1). Unlike the build
/// phase, detect-time requires have no links between them to schedule
/// concurrently, so this stays a plain sequential scan rather than
/// standing up a full node graph for it.
pub async fn run_detect(args: DetectArgs) -> Result<DetectPlan, EngineError> {
    validate_spec(&args.packfile)?;
    let shell = default_shell(&args.packfile);

    let mut any_require = false;
    let mut any_accepted = false;
    let mut requires = Vec::new();
    let mut provides = Vec::new();

    for layer in &args.packfile.layers {
        if let Some(require) = &layer.require {
            any_require = true;
            let runner = strata_runner::build_runner(&require.exec, &shell);
            let env = EnvMap::from_process_env();
            let metadata = strata_metadata::MemMetadata::new();
            let (streamer, reader) = strata_sync::Streamer::pair();
            let ctx = ExecContext {
                app_dir: args.app_dir.clone(),
                md_dir: None,
                layer_dir: None,
                cache_dir: None,
                pf_config_path: args.pf_config_path.clone(),
            };
            let name = layer.name.clone();
            let drain = tokio::spawn(async move {
                let mut out = Vec::new();
                let mut err = Vec::new();
                let _ = reader.drain_into(&mut out, &mut err).await;
                for line in String::from_utf8_lossy(&out).lines() {
                    info!(layer = %name, "{line}");
                }
                for line in String::from_utf8_lossy(&err).lines() {
                    warn!(layer = %name, "{line}");
                }
            });
            let result = runner.execute(&streamer, &env, &metadata, &ctx).await;
            streamer.close();
            let _ = drain.await;

            match result {
                Ok(()) => any_accepted = true,
                Err(RunnerError::Declined) => continue,
                Err(e) => return Err(EngineError::LayerFailed(layer.name.clone(), strata_sync::NodeError::new(e.to_string()))),
            }
        }

        if let Some(provide) = layer.find_provide() {
            any_accepted = true;
            provides.push(ProvideEntry { name: layer.name.clone() });
            for dep in &provide.deps {
                requires.push(PlanRequire {
                    name: dep.name.clone(),
                    version: dep.version.clone(),
                    metadata: dep.metadata.clone(),
                });
            }
        }
    }

    if any_require && !any_accepted {
        return Err(EngineError::DetectDeclined);
    }

    Ok(DetectPlan { requires, provides })
}

/// Arguments to the build lifecycle phase (spec.md §4.7 "Build", §6).
pub struct BuildArgs {
    pub packfile: Packfile,
    pub layers_dir: PathBuf,
    pub app_dir: PathBuf,
    pub platform_dir: PathBuf,
    pub plan: BuildPlan,
    pub pf_config_path: Option<PathBuf>,
}

/// Runs detect-free build: spins up one node per cache/layer, links them
/// per spec.md §4.6, runs them all concurrently to quiescence, and
/// persists the updated store/plan/descriptors (spec.md §4.7 "Build").
pub async fn run_build(args: BuildArgs) -> Result<BuildPlan, EngineError> {
    validate_spec(&args.packfile)?;
    let shell = default_shell(&args.packfile);
    let build_id = Uuid::new_v4().to_string();

    let store_path = args.layers_dir.join("store.toml");
    let last_build_id = match tokio::fs::read_to_string(&store_path).await {
        Ok(text) => toml::from_str::<StoreDescriptor>(&text)?.metadata.build_id,
        Err(_) => String::new(),
    };

    if !args.packfile.caches.is_empty() {
        tokio::fs::create_dir_all(args.layers_dir.join("cache")).await?;
    }

    let mut decls: Vec<NodeDecl> = Vec::new();
    for cache in &args.packfile.caches {
        decls.push(NodeDecl {
            name: cache.name.clone(),
            links: Vec::new(),
            is_cache: true,
            lock_app: false,
        });
    }
    for layer in &args.packfile.layers {
        let provide = layer.find_provide();
        let links: Vec<LinkDecl> = provide
            .map(|p| {
                p.links
                    .iter()
                    .map(|l| LinkDecl {
                        target: l.name.clone(),
                        link_content: l.link_content,
                        link_version: l.link_version,
                    })
                    .collect()
            })
            .unwrap_or_default();
        decls.push(NodeDecl {
            name: layer.name.clone(),
            links,
            is_cache: false,
            lock_app: provide.map(|p| p.lock_app).unwrap_or(false),
        });
    }

    let edges = build_graph(&decls);
    let lock = Arc::new(Lock::new());
    lock.add(decls.len() as i64);

    let kernels: Vec<Arc<Kernel>> = decls.iter().map(|d| Kernel::new(d.name.clone(), Arc::clone(&lock))).collect();

    let mut owned: Vec<Vec<strata_sync::Link>> = (0..decls.len()).map(|_| Vec::new()).collect();
    for edge in &edges {
        owned[edge.from].push(strata_sync::Link::new(edge.kind, Arc::clone(&kernels[edge.to])));
    }

    let num_caches = args.packfile.caches.len();
    let mut nodes: Vec<Arc<dyn Node>> = Vec::new();
    let mut readers: Vec<StreamReader> = Vec::with_capacity(decls.len());

    for (i, cache) in args.packfile.caches.iter().enumerate() {
        let cache_dir = args.layers_dir.join("cache").join(&cache.name);
        let descriptor_path = args.layers_dir.join("cache").join(format!("{}.toml", cache.name));
        let (streamer, reader) = Streamer::pair();
        readers.push(reader);
        nodes.push(CacheNode::new(
            Arc::clone(&kernels[i]),
            cache.name.clone(),
            cache_dir,
            descriptor_path,
            args.app_dir.clone(),
            cache.setup.clone(),
            shell.clone(),
            owned[i].clone(),
            streamer,
            args.pf_config_path.clone(),
        ));
    }

    let handles: Vec<Arc<LayerHandle>> = args
        .packfile
        .layers
        .iter()
        .map(|layer| {
            let layer_dir = args.layers_dir.join(&layer.name);
            let metadata = Arc::new(FsMetadata::new(args.layers_dir.join(format!(".{}.md", layer.name))));
            LayerHandle::new(layer.name.clone(), layer_dir, metadata)
        })
        .collect();

    let base_env = EnvMap::from_process_env();
    for (li, layer) in args.packfile.layers.iter().enumerate() {
        let idx = num_caches + li;
        let require_bindings: Vec<RequireBinding> = layer
            .find_provide()
            .map(|p| {
                p.links
                    .iter()
                    .filter_map(|l| {
                        handles
                            .iter()
                            .find(|h| h.name == l.name)
                            .map(|h| RequireBinding {
                                spec: l.clone(),
                                upstream: Arc::clone(h),
                            })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let plan_deps: Vec<Dep> = args
            .plan
            .entries_for(&layer.name)
            .into_iter()
            .map(|pr| Dep {
                name: pr.name.clone(),
                version: pr.version.clone(),
                uri: String::new(),
                sha: String::new(),
                metadata: pr.metadata.clone(),
            })
            .collect();

        let cfg = LayerNodeConfig {
            layer: layer.clone(),
            layers_dir: args.layers_dir.clone(),
            app_dir: args.app_dir.clone(),
            default_shell: shell.clone(),
            base_env: base_env.clone(),
            build_id: build_id.clone(),
            last_build_id: last_build_id.clone(),
            plan_deps,
            require_bindings,
            owned_links: owned[idx].clone(),
            pf_config_path: args.pf_config_path.clone(),
        };
        let (streamer, reader) = Streamer::pair();
        readers.push(reader);
        nodes.push(LayerNode::new(Arc::clone(&kernels[idx]), Arc::clone(&handles[li]), cfg, streamer));
    }

    let mut joins = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let node = Arc::clone(node);
        joins.push(tokio::spawn(async move {
            run_node(node).await;
        }));
    }

    // Nodes run concurrently, but their output is drained one at a time in
    // declaration order, so a layer's stdout/stderr never interleaves with
    // a peer's even though both may be executing at once (spec.md §4.7
    // point 6, §1(v)).
    for (i, reader) in readers.into_iter().enumerate() {
        let name = decls[i].name.clone();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let _ = reader.drain_into(&mut out, &mut err).await;
        for line in String::from_utf8_lossy(&out).lines() {
            info!(node = %name, "{line}");
        }
        for line in String::from_utf8_lossy(&err).lines() {
            warn!(node = %name, "{line}");
        }
    }

    for join in joins {
        let _ = join.await;
    }

    for (i, node) in nodes.iter().enumerate() {
        if let Some(e) = node_error(node) {
            return Err(EngineError::LayerFailed(decls[i].name.clone(), e));
        }
    }

    let store = StoreDescriptor {
        metadata: StoreMetadata { build_id },
    };
    tokio::fs::write(&store_path, toml::to_string_pretty(&store)?).await?;

    prune_stale_layer_dirs(&args.layers_dir, &args.packfile.layers).await?;

    let mut entries = Vec::new();
    for layer in &args.packfile.layers {
        if let Some(provide) = layer.find_provide() {
            for dep in &provide.deps {
                entries.push(PlanRequire {
                    name: dep.name.clone(),
                    version: dep.version.clone(),
                    metadata: dep.metadata.clone(),
                });
            }
        }
    }
    Ok(BuildPlan { entries })
}

async fn prune_stale_layer_dirs(layers_dir: &PathBuf, layers: &[Layer]) -> Result<(), EngineError> {
    let keep: HashSet<&str> = layers.iter().map(|l| l.name.as_str()).collect();
    let mut entries = match tokio::fs::read_dir(layers_dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "cache" || keep.contains(name.as_str()) {
            continue;
        }
        tokio::fs::remove_dir_all(entry.path()).await?;
    }
    Ok(())
}
