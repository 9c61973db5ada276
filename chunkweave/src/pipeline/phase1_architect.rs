//! Phase 1: Architect
//!
//! One structured call turns the instruction (plus an optional listing of the
//! existing output directory) into a flat list of files, each with top-level
//! chunks only. There is no retry loop here; a failed or unusable response
//! aborts the run.

use std::collections::HashSet;
use tracing::{info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::prompts::{architect_prompt, ARCHITECT_CONTRACT, ARCHITECT_SYSTEM};
use super::types::{ArchitectSubmission, FileTarget, GenerationState, Plan};
use crate::generation::{
    decode_structured, with_timeout, GenerationRequest, Generator, OutputContract,
};
use crate::scan::{format_directory, scan_directory};
use chunkweave_sdk::log_generator_call;

pub const PHASE: &str = "architect";

/// Build the initial generation state from an instruction
pub async fn architect_plan(
    generator: &dyn Generator,
    config: &PipelineConfig,
    instruction: &str,
) -> Result<GenerationState, PipelineError> {
    let listing = existing_listing(config);

    let prompt = architect_prompt(
        &config.system_prompt,
        instruction,
        listing.as_deref(),
        config.params_schema.is_some(),
    );

    let mut contract = OutputContract::for_type::<ArchitectSubmission>(
        ARCHITECT_CONTRACT,
        "Submit the high-level plan: the files to create and their top-level chunks.",
    );
    if let Some(schema) = &config.params_schema {
        contract = contract.with_property("params", schema.clone());
    }

    let request =
        GenerationRequest::new(ARCHITECT_SYSTEM, prompt).with_temperature(config.temperature);

    log_generator_call!("plan", generator.name());
    let response = with_timeout(
        config.call_timeout(),
        generator.generate_structured(&request, &contract),
    )
    .await
    .map_err(|source| PipelineError::Generation {
        phase: PHASE,
        target: "plan".to_string(),
        source,
    })?;

    let submission: ArchitectSubmission =
        decode_structured(&response).map_err(|message| PipelineError::InvalidResponse {
            phase: PHASE,
            target: "plan".to_string(),
            message,
            last_response: response.raw.clone(),
        })?;

    let params = merge_params(&config.params, submission.params);
    let files: Vec<FileTarget> = submission
        .files
        .into_iter()
        .map(|f| f.into_target())
        .collect();
    let plan = Plan { files };
    validate_plan(&plan)?;

    info!(
        files = plan.files.len(),
        chunks = plan.files.iter().map(|f| f.chunks.len()).sum::<usize>(),
        "high-level plan complete"
    );

    Ok(GenerationState::new(plan, params))
}

fn existing_listing(config: &PipelineConfig) -> Option<String> {
    if !config.scan_existing || !config.output_dir.is_dir() {
        return None;
    }
    match scan_directory(&config.output_dir) {
        Ok(tree) => Some(format_directory(&tree)),
        Err(e) => {
            warn!(
                dir = %config.output_dir.display(),
                error = %e,
                "could not scan output directory"
            );
            None
        }
    }
}

/// Shallow merge of extracted params over caller-supplied ones
pub fn merge_params(
    base: &serde_json::Value,
    extracted: Option<serde_json::Value>,
) -> serde_json::Value {
    match (base, extracted) {
        (serde_json::Value::Object(base), Some(serde_json::Value::Object(extra))) => {
            let mut merged = base.clone();
            merged.extend(extra);
            serde_json::Value::Object(merged)
        }
        (base, Some(extra)) if base.is_null() || base.as_object().is_some_and(|m| m.is_empty()) => {
            extra
        }
        (base, _) => base.clone(),
    }
}

/// Structural checks on the Architect's output
pub fn validate_plan(plan: &Plan) -> Result<(), PipelineError> {
    if plan.files.is_empty() {
        return Err(PipelineError::InvalidPlan("the plan contains no files".into()));
    }

    let mut paths = HashSet::new();
    let mut ids = HashSet::new();

    for file in &plan.files {
        if file.name.trim().is_empty() {
            return Err(PipelineError::InvalidPlan(format!(
                "a file under `{}` has no name",
                file.path
            )));
        }

        let rel = file.relative_path();
        if !paths.insert(rel.clone()) {
            return Err(PipelineError::InvalidPlan(format!("duplicate output path `{}`", rel)));
        }

        if file.chunks.is_empty() {
            warn!(file = %rel, "file has no chunks and will be scaffolded empty");
        }

        for chunk in &file.chunks {
            if chunk.id.trim().is_empty() {
                return Err(PipelineError::InvalidPlan(format!("chunk with empty id in `{}`", rel)));
            }
            if !ids.insert(chunk.id.as_str()) {
                return Err(PipelineError::InvalidPlan(format!(
                    "duplicate chunk id `{}`",
                    chunk.id
                )));
            }
        }
    }

    Ok(())
}
