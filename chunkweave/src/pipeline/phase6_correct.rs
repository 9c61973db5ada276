//! Phase 6: Corrector
//!
//! Best-effort pass that resubmits each assembled file with instructions to
//! consolidate duplicate declarations and fix structural errors. Any failure
//! for a file is logged and the file keeps its assembled content.

use tokio::fs;
use tracing::{error, info, warn};

use super::config::PipelineConfig;
use super::error::{PipelineError, CORRECTOR_PHASE};
use super::hooks::{PipelineHooks, SubmitStage};
use super::placeholder::strip_code_fences;
use super::prompts::{corrector_prompt, CORRECTOR_SYSTEM};
use super::types::{FileTarget, GenerationState};
use crate::generation::{with_timeout, GenerationRequest, Generator};
use chunkweave_sdk::{log_file_submitted, log_generator_call};

pub const PHASE: &str = CORRECTOR_PHASE;

/// Correct every file; returns how many were rewritten
pub async fn correct_files(
    generator: &dyn Generator,
    hooks: &dyn PipelineHooks,
    config: &PipelineConfig,
    state: &GenerationState,
) -> usize {
    let mut corrected = 0;
    for file in &state.plan.files {
        match correct_file(generator, hooks, config, file).await {
            Ok(()) => corrected += 1,
            Err(e) => {
                error!(
                    file = %file.relative_path(),
                    error = %e,
                    "correction failed, keeping assembled content"
                );
            }
        }
    }
    corrected
}

pub async fn correct_file(
    generator: &dyn Generator,
    hooks: &dyn PipelineHooks,
    config: &PipelineConfig,
    file: &FileTarget,
) -> Result<(), PipelineError> {
    let key = file.relative_path();
    let path = file.output_path(&config.output_dir);

    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            warn!(file = %key, error = %e, "could not read file for correction");
            return Err(PipelineError::io(&path, e));
        }
    };

    let request = GenerationRequest::new(CORRECTOR_SYSTEM, corrector_prompt(file, &content))
        .with_temperature(0.0);

    log_generator_call!(&key, generator.name());
    let raw = with_timeout(config.call_timeout(), generator.generate_text(&request))
        .await
        .map_err(|source| PipelineError::Generation {
            phase: PHASE,
            target: key.clone(),
            source,
        })?;

    let corrected = strip_code_fences(&raw);
    if corrected.trim().is_empty() {
        return Err(PipelineError::InvalidResponse {
            phase: PHASE,
            target: key,
            message: "corrected content is empty".to_string(),
            last_response: raw,
        });
    }

    fs::write(&path, &corrected)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;

    hooks
        .on_file_submit(file, &path, &corrected, SubmitStage::Corrected)
        .await
        .map_err(|source| PipelineError::Hook {
            hook: "on_file_submit",
            phase: PHASE,
            source,
        })?;
    log_file_submitted!(&key, SubmitStage::Corrected);
    info!(file = %key, "file corrected");
    Ok(())
}
