// SPDX-License-Identifier: MIT

use crate::error::RunnerError;
use crate::traits::{ExecContext, Runner};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use strata_core::EnvMap;
use strata_metadata::Metadata;
use strata_sync::Streamer;

/// Writes a SHA-256 over the contents of every app file matching a glob
/// pattern into the layer's `version` metadata key — "re-test whenever
/// these files change" (spec.md §4.3).
pub struct GlobMatchRunner {
    pattern: String,
}

impl GlobMatchRunner {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    fn matching_files(&self, app_dir: &std::path::Path) -> Result<Vec<std::path::PathBuf>, RunnerError> {
        let full_pattern = app_dir.join(&self.pattern);
        let mut paths: Vec<_> = glob::glob(&full_pattern.to_string_lossy())
            .map_err(|e| RunnerError::Other(e.to_string()))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn digest(&self, app_dir: &std::path::Path) -> Result<String, RunnerError> {
        let mut hasher = Sha256::new();
        for path in self.matching_files(app_dir)? {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(std::fs::read(&path)?);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl Runner for GlobMatchRunner {
    fn version(&self) -> String {
        self.pattern.clone()
    }

    async fn execute(
        &self,
        _streamer: &Streamer,
        _env: &EnvMap,
        metadata: &dyn Metadata,
        ctx: &ExecContext,
    ) -> Result<(), RunnerError> {
        let digest = self.digest(&ctx.app_dir)?;
        metadata.write(&digest, &["version"])?;
        Ok(())
    }
}
