// SPDX-License-Identifier: MIT

use crate::node::LinkKind;

/// One declared dependency edge, prior to graph resolution (spec.md §3
/// "Link (declared)"): `target` names another node in the same layer set.
#[derive(Debug, Clone)]
pub struct LinkDecl {
    pub target: String,
    pub link_content: bool,
    pub link_version: bool,
}

/// A node as seen by the graph builder — just enough to resolve edges,
/// independent of what the node actually runs.
#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub name: String,
    pub links: Vec<LinkDecl>,
    pub is_cache: bool,
    pub lock_app: bool,
}

/// A resolved edge: `from` depends on `to` in the sense described by
/// `kind` (spec.md §4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub kind: LinkKind,
    pub from: usize,
    pub to: usize,
}

/// Resolves the declared links in `nodes` (in declaration order) into the
/// full edge set a [`crate::Kernel`] graph needs (spec.md §4.6). No
/// concrete reference implementation of this pass survives outside the
/// interface sketch in the original `link` package, so this follows the
/// spec's two-pass description directly.
pub fn build_graph(nodes: &[NodeDecl]) -> Vec<Edge> {
    let mut edges = Vec::new();

    let requires_cache = |node_idx: usize, cache_idx: usize| -> bool {
        nodes[node_idx]
            .links
            .iter()
            .any(|l| l.target == nodes[cache_idx].name)
    };

    // Backward pass: node i against every earlier node j.
    for i in 0..nodes.len() {
        for j in 0..i {
            if requires_cache(i, j) {
                edges.push(Edge {
                    kind: LinkKind::Require,
                    from: i,
                    to: j,
                });
            }

            if nodes[j].is_cache && requires_cache(i, j) {
                edges.push(Edge {
                    kind: LinkKind::Serial,
                    from: i,
                    to: j,
                });
                for k in (j + 1)..i {
                    if requires_cache(k, j) {
                        edges.push(Edge {
                            kind: LinkKind::Serial,
                            from: i,
                            to: k,
                        });
                    }
                }
            }

            if nodes[i].lock_app && nodes[j].lock_app {
                edges.push(Edge {
                    kind: LinkKind::Serial,
                    from: i,
                    to: j,
                });
            }
        }
    }

    // Forward pass: node i against every later node j that links back to it.
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            for link in &nodes[j].links {
                if link.target != nodes[i].name {
                    continue;
                }
                if link.link_content {
                    edges.push(Edge {
                        kind: LinkKind::Content,
                        from: i,
                        to: j,
                    });
                }
                if link.link_version {
                    edges.push(Edge {
                        kind: LinkKind::Version,
                        from: i,
                        to: j,
                    });
                }
            }
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, links: &[&str], is_cache: bool, lock_app: bool) -> NodeDecl {
        NodeDecl {
            name: name.to_string(),
            links: links
                .iter()
                .map(|t| LinkDecl {
                    target: t.to_string(),
                    link_content: false,
                    link_version: false,
                })
                .collect(),
            is_cache,
            lock_app,
        }
    }

    #[test]
    fn declared_link_becomes_require_edge() {
        let nodes = vec![decl("deps", &[], false, false), decl("app", &["deps"], false, false)];
        let edges = build_graph(&nodes);
        assert!(edges.contains(&Edge {
            kind: LinkKind::Require,
            from: 1,
            to: 0
        }));
    }

    #[test]
    fn content_link_flows_from_upstream_to_downstream() {
        let mut nodes = vec![decl("deps", &[], false, false), decl("app", &[], false, false)];
        nodes[1].links.push(LinkDecl {
            target: "deps".to_string(),
            link_content: true,
            link_version: false,
        });
        let edges = build_graph(&nodes);
        assert!(edges.contains(&Edge {
            kind: LinkKind::Content,
            from: 0,
            to: 1
        }));
    }

    #[test]
    fn shared_cache_serializes_peers_in_declaration_order() {
        let cache = decl("cache", &[], true, false);
        let a = decl("a", &["cache"], false, false);
        let b = decl("b", &["cache"], false, false);
        let nodes = vec![cache, a, b];
        let edges = build_graph(&nodes);
        assert!(edges.contains(&Edge {
            kind: LinkKind::Serial,
            from: 1,
            to: 0
        }));
        assert!(
            edges.contains(&Edge {
                kind: LinkKind::Serial,
                from: 2,
                to: 1
            }),
            "later peer 'b' should wait on earlier peer 'a' via their shared cache"
        );
        assert!(
            !edges.contains(&Edge {
                kind: LinkKind::Serial,
                from: 1,
                to: 2
            }),
            "serialization must form a declaration-order chain, not a cycle between peers"
        );
        assert!(
            !edges.iter().any(|e| e.kind == LinkKind::Serial && e.from == e.to),
            "no node should be serialized against itself"
        );
    }

    #[test]
    fn shared_lock_app_makes_layers_serial() {
        let nodes = vec![decl("a", &[], false, true), decl("b", &[], false, true)];
        let edges = build_graph(&nodes);
        assert!(edges.contains(&Edge {
            kind: LinkKind::Serial,
            from: 1,
            to: 0
        }));
    }

    #[test]
    fn unrelated_layers_have_no_edges() {
        let nodes = vec![decl("a", &[], false, false), decl("b", &[], false, false)];
        assert!(build_graph(&nodes).is_empty());
    }
}
