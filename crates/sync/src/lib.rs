// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! strata-sync: the quiescence-driven node scheduler at the heart of the
//! engine (spec.md §4.2, §4.4, §4.5, §4.6). Generic over what a node
//! actually does — [`Node`] answers `test`/`run`/`skip`/`links`; [`Kernel`]
//! answers "when".

mod error;
mod graph;
mod lock;
mod node;
mod streamer;

pub use error::NodeError;
pub use graph::{build_graph, Edge, LinkDecl, NodeDecl};
pub use lock::Lock;
pub use node::{node_error, run_node, wait_for_node, Event, Kernel, Link, LinkKind, Node};
pub use streamer::{StreamClosed, StreamReader, Streamer};
