//! Durable storage of the [`GenerationState`] document.
//!
//! Writes go to `<path>.tmp` first and are renamed over the target, so a crash
//! mid-write never leaves a truncated state file behind.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::PipelineError;
use super::types::GenerationState;
use chunkweave_sdk::log_state_saved;

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Flush `state` to disk, stamping `updated_at`
    pub async fn save(&self, state: &mut GenerationState) -> Result<(), PipelineError> {
        state.touch();
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::io(parent, e))?;
            }
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, json)
            .await
            .map_err(|e| PipelineError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PipelineError::io(&self.path, e))?;

        debug!(path = %self.path.display(), phase = %state.phase, "state saved");
        log_state_saved!(self.path.display(), state.phase);
        Ok(())
    }

    pub async fn load(&self) -> Result<GenerationState, PipelineError> {
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PipelineError::io(&self.path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
