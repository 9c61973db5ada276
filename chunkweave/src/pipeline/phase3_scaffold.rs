//! Phase 3: Scaffolder
//!
//! Writes every target file as an import placeholder line (import-bearing
//! kinds only) followed by one placeholder per leaf, in dependency order.

use std::path::Path;
use tokio::fs;
use tracing::info;

use super::error::PipelineError;
use super::placeholder::scaffold_content;
use super::topo::topological_sort;
use super::types::{ChunkNode, FileTarget, GenerationState};

pub const PHASE: &str = "scaffolder";

pub async fn scaffold_files(
    state: &GenerationState,
    output_dir: &Path,
) -> Result<(), PipelineError> {
    for file in &state.plan.files {
        scaffold_file(file, output_dir).await?;
    }
    Ok(())
}

/// Write the skeleton of one file; returns the content written
pub async fn scaffold_file(
    file: &FileTarget,
    output_dir: &Path,
) -> Result<String, PipelineError> {
    let leaves = file.resolved_leaves();
    let refs: Vec<&ChunkNode> = leaves.iter().collect();
    let sorted = topological_sort(&refs)?;
    let content = scaffold_content(file.kind, &sorted);

    let path = file.output_path(output_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }
    fs::write(&path, &content)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;

    info!(file = %file.relative_path(), placeholders = sorted.len(), "file scaffolded");
    Ok(content)
}
