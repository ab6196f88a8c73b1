// SPDX-License-Identifier: MIT

//! spec.md §7 "SpecError": impossible specifications, reported synchronously
//! by the phase driver before any node is spawned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("layer '{0}' declares both provide and build")]
    BothProvideAndBuild(String),
    #[error("layer name '{0}' is used more than once")]
    DuplicateLayerName(String),
    #[error("link '{link}' on layer '{layer}' names unknown layer or cache '{target}'")]
    UnknownLinkTarget {
        layer: String,
        link: String,
        target: String,
    },
    #[error("link on layer '{layer}' names '{target}', which is declared later (links may only name previously-declared layers)")]
    ForwardLink { layer: String, target: String },
}
