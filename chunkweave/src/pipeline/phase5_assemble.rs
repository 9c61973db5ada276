//! Phase 5: Assembler
//!
//! Replaces each file's import placeholder with the consolidated import block,
//! or drops the placeholder line when nothing was imported, then hands the
//! file to the submit hook. A file without a placeholder is left untouched, so
//! assembling twice is a no-op.

use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::hooks::{PipelineHooks, SubmitStage};
use super::placeholder::{apply_imports, remaining_placeholders};
use super::types::{FileImports, FileTarget, GenerationState};
use chunkweave_sdk::log_file_submitted;

pub const PHASE: &str = "assembler";

pub async fn assemble_files(
    hooks: &dyn PipelineHooks,
    config: &PipelineConfig,
    state: &GenerationState,
) -> Result<(), PipelineError> {
    for file in &state.plan.files {
        let key = file.relative_path();
        let path = file.output_path(&config.output_dir);
        let imports = if file.kind.carries_imports() {
            state.file_imports.get(&key)
        } else {
            None
        };

        let content = assemble_file(file, &path, imports).await?;

        hooks
            .on_file_submit(file, &path, &content, SubmitStage::Assembled)
            .await
            .map_err(|source| PipelineError::Hook {
                hook: "on_file_submit",
                phase: PHASE,
                source,
            })?;
        log_file_submitted!(&key, SubmitStage::Assembled);
        info!(file = %key, "file assembled");
    }
    Ok(())
}

/// Assemble one file on disk and return its final content
pub async fn assemble_file(
    file: &FileTarget,
    path: &Path,
    imports: Option<&FileImports>,
) -> Result<String, PipelineError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    let leftover = remaining_placeholders(&content);
    if !leftover.is_empty() {
        warn!(
            file = %file.relative_path(),
            count = leftover.len(),
            "file still contains chunk placeholders"
        );
    }

    match apply_imports(&content, imports) {
        Some(updated) => {
            fs::write(path, &updated)
                .await
                .map_err(|e| PipelineError::io(path, e))?;
            Ok(updated)
        }
        None => {
            debug!(file = %file.relative_path(), "no import placeholder, already assembled");
            Ok(content)
        }
    }
}
