// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("metadata error: {0}")]
    Metadata(#[from] strata_metadata::MetadataError),
    #[error("spec error: {0}")]
    Spec(#[from] strata_core::SpecError),
    #[error("layer '{0}' declares both provide and build")]
    BothProvideAndBuild(String),
    #[error("every layer declined detection")]
    DetectDeclined,
    #[error("layer '{0}' failed: {1}")]
    LayerFailed(String, strata_sync::NodeError),
}
