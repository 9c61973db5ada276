//! Phase 4: Developer
//!
//! Generates every leaf chunk in global dependency order. For each leaf:
//!
//! 1. Collect already-generated code of its effective dependencies
//! 2. Read the file as it currently sits on disk
//! 3. Ask for exactly the code that replaces this leaf's placeholder, plus
//!    any imports it needs
//! 4. Persist the code, then replace the placeholder in place
//! 5. Mark the leaf completed, record its imports and flush state
//!
//! Leaves already `completed` or `failed` are skipped, so restarting from a
//! saved state never regenerates finished work. A leaf left `generating`
//! whose persisted code already replaced its placeholder is completed
//! without another call. Exhausting the attempts for any leaf aborts the run.

use std::collections::HashMap;
use tokio::fs;
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::hooks::{ChunkProgress, PipelineHooks, PromptContext};
use super::placeholder::{
    chunk_placeholder, remaining_placeholders, replace_placeholder, IMPORTS_PLACEHOLDER,
};
use super::prompts::{developer_prompt, DEVELOPER_CONTRACT, DEVELOPER_SYSTEM};
use super::retry::RetryState;
use super::state::StateStore;
use super::topo::topological_sort;
use super::types::{ChunkNode, ChunkStatus, ChunkSubmission, FileTarget, GenerationState};
use crate::generation::{
    decode_structured, with_timeout, GenerationRequest, Generator, OutputContract,
};
use chunkweave_sdk::{
    log_attempt_failed, log_chunk_complete, log_chunk_failed, log_chunk_start, log_generator_call,
};

pub const PHASE: &str = "developer";

/// Leaf ids in generation order, each with its owning file index.
///
/// Dependencies on composite chunks count as dependencies on all of their
/// leaves.
pub fn generation_order(state: &GenerationState) -> Result<Vec<(usize, String)>, PipelineError> {
    let leaves = state.plan.resolved_leaves();
    let owners: HashMap<&str, usize> = leaves
        .iter()
        .map(|(idx, leaf)| (leaf.id.as_str(), *idx))
        .collect();
    let nodes: Vec<&ChunkNode> = leaves.iter().map(|(_, leaf)| leaf).collect();

    let sorted = topological_sort(&nodes)?;
    Ok(sorted
        .into_iter()
        .filter_map(|id| owners.get(id.as_str()).copied().map(|idx| (idx, id)))
        .collect())
}

pub async fn develop_chunks(
    generator: &dyn Generator,
    hooks: &dyn PipelineHooks,
    config: &PipelineConfig,
    state: &mut GenerationState,
    store: &StateStore,
) -> Result<(), PipelineError> {
    let order = generation_order(state)?;
    let total = order.len();
    let resolved: HashMap<String, Vec<String>> = state
        .plan
        .resolved_leaves()
        .into_iter()
        .map(|(_, leaf)| (leaf.id, leaf.dependencies))
        .collect();

    let mut generated: HashMap<String, String> = HashMap::new();
    let mut finished = 0;
    for (_, leaf) in state.plan.leaves() {
        if leaf.status.is_terminal() {
            finished += 1;
        }
        if let (ChunkStatus::Completed, Some(code)) = (leaf.status, &leaf.code) {
            generated.insert(leaf.id.clone(), code.clone());
        }
    }
    if finished > 0 {
        info!(finished, total, "resuming with finished leaves");
    }

    for (file_idx, id) in order {
        let Some(node) = state.plan.files[file_idx].find_chunk_mut(&id) else {
            continue;
        };
        if node.status.is_terminal() {
            debug!(chunk_id = %id, status = %node.status, "skipping finished leaf");
            continue;
        }
        let interrupted = node.status == ChunkStatus::Generating;
        node.advance(ChunkStatus::Generating);
        let mut chunk = node.clone();
        if let Some(deps) = resolved.get(&id) {
            chunk.dependencies = deps.clone();
        }

        finished += 1;
        let file = &state.plan.files[file_idx];
        let file_key = file.relative_path();
        let path = file.output_path(&config.output_dir);
        log_chunk_start!(&id, &file_key, finished, total);
        info!(chunk_id = %id, file = %file_key, current = finished, total, "generating chunk");

        let current_content = fs::read_to_string(&path)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;

        if interrupted && written_before_interrupt(&chunk, &current_content) {
            info!(chunk_id = %id, "code from an interrupted run is already in place");
            let submission = ChunkSubmission {
                code: chunk.code.clone().unwrap_or_default(),
                imports: chunk.imports.clone(),
            };
            generated.insert(id.clone(), submission.code.clone());
            complete_leaf(hooks, state, store, file_idx, &id, &submission, finished, total).await?;
            continue;
        }

        let dependencies: Vec<(String, String)> = chunk
            .dependencies
            .iter()
            .filter_map(|dep| generated.get(dep).map(|code| (dep.clone(), code.clone())))
            .collect();

        let outcome = generate_leaf(
            generator,
            hooks,
            config,
            &state.params,
            file,
            &chunk,
            &current_content,
            &dependencies,
        )
        .await;

        let submission = match outcome {
            Ok(submission) => submission,
            Err(e) => {
                log_chunk_failed!(&id, &e);
                if let Err(save_err) = store.save(state).await {
                    warn!(error = %save_err, "could not flush state after chunk failure");
                }
                return Err(e);
            }
        };

        // Code is persisted before the file changes so a resume can tell
        // whether the write happened.
        if let Some(node) = state.plan.files[file_idx].find_chunk_mut(&id) {
            node.code = Some(submission.code.clone());
            node.imports = submission.imports.clone();
        }
        store.save(state).await?;

        match replace_placeholder(&current_content, &id, &submission.code) {
            Some(content) => {
                fs::write(&path, content)
                    .await
                    .map_err(|e| PipelineError::io(&path, e))?;
                generated.insert(id.clone(), submission.code.clone());
                complete_leaf(hooks, state, store, file_idx, &id, &submission, finished, total)
                    .await?;
            }
            None => {
                if let Some(node) = state.plan.files[file_idx].find_chunk_mut(&id) {
                    node.advance(ChunkStatus::Failed);
                }
                warn!(
                    chunk_id = %id,
                    file = %file_key,
                    "placeholder not found, code kept in state for manual inspection"
                );
                log_chunk_failed!(&id, "placeholder not found");
                store.save(state).await?;
            }
        }
    }

    Ok(())
}

/// Whether `chunk`'s persisted code replaced its placeholder before a crash
fn written_before_interrupt(chunk: &ChunkNode, content: &str) -> bool {
    match chunk.code.as_deref() {
        Some(code) if !code.trim().is_empty() => {
            !content.contains(&chunk_placeholder(&chunk.id)) && content.contains(code)
        }
        _ => false,
    }
}

/// Mark an inserted leaf completed, record its imports, flush and report
#[allow(clippy::too_many_arguments)]
async fn complete_leaf(
    hooks: &dyn PipelineHooks,
    state: &mut GenerationState,
    store: &StateStore,
    file_idx: usize,
    id: &str,
    submission: &ChunkSubmission,
    current: usize,
    total: usize,
) -> Result<(), PipelineError> {
    let file_key = state.plan.files[file_idx].relative_path();
    let carries_imports = state.plan.files[file_idx].kind.carries_imports();

    let Some(node) = state.plan.files[file_idx].find_chunk_mut(id) else {
        return Ok(());
    };
    node.advance(ChunkStatus::Completed);
    let done = node.clone();
    if carries_imports {
        state.record_imports(&file_key, &submission.imports);
    }
    info!(chunk_id = %id, code_len = submission.code.len(), "chunk inserted");
    log_chunk_complete!(id, &file_key);

    store.save(state).await?;

    let progress = ChunkProgress {
        chunk: &done,
        file: &state.plan.files[file_idx],
        code: &submission.code,
        current,
        total,
    };
    if let Err(e) = hooks.on_chunk(&progress).await {
        warn!(chunk_id = %id, error = %e, "chunk progress hook failed");
    }
    Ok(())
}

/// Build the prompts for one leaf and run its retry loop
#[allow(clippy::too_many_arguments)]
pub async fn generate_leaf(
    generator: &dyn Generator,
    hooks: &dyn PipelineHooks,
    config: &PipelineConfig,
    params: &serde_json::Value,
    file: &FileTarget,
    chunk: &ChunkNode,
    current_content: &str,
    dependencies: &[(String, String)],
) -> Result<ChunkSubmission, PipelineError> {
    let mut system_prompt = DEVELOPER_SYSTEM.to_string();
    let mut user_prompt = developer_prompt(file, chunk, current_content, dependencies);

    let ctx = PromptContext {
        params,
        chunk,
        file,
        dependencies,
        current_content,
        system_prompt: &system_prompt,
        user_prompt: &user_prompt,
    };
    let prepared_system = hooks
        .prepare_system_prompt(&ctx)
        .await
        .map_err(|source| PipelineError::Hook {
            hook: "prepare_system_prompt",
            phase: PHASE,
            source,
        })?;
    let prepared_user = hooks
        .prepare_prompt(&ctx)
        .await
        .map_err(|source| PipelineError::Hook {
            hook: "prepare_prompt",
            phase: PHASE,
            source,
        })?;
    if let Some(prepared) = prepared_system {
        system_prompt = prepared;
    }
    if let Some(prepared) = prepared_user {
        user_prompt = prepared;
    }

    let contract = OutputContract::for_type::<ChunkSubmission>(
        DEVELOPER_CONTRACT,
        "Submit the code that replaces the placeholder, and any imports it needs.",
    );
    let mut retry = RetryState::new(config.max_retries);

    while let Some(attempt) = retry.next_attempt() {
        let request = GenerationRequest::new(
            system_prompt.as_str(),
            retry.decorate(&user_prompt, DEVELOPER_CONTRACT),
        )
        .with_temperature(config.temperature);

        log_generator_call!(&chunk.id, generator.name());
        let response = match with_timeout(
            config.call_timeout(),
            generator.generate_structured(&request, &contract),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(chunk_id = %chunk.id, attempt, error = %e, "developer call failed");
                log_attempt_failed!(&chunk.id, attempt, &e);
                retry.record_failure(e.to_string(), None);
                continue;
            }
        };

        let outcome =
            decode_structured::<ChunkSubmission>(&response).and_then(validate_submission);

        match outcome {
            Ok(submission) => return Ok(submission),
            Err(message) => {
                warn!(
                    chunk_id = %chunk.id,
                    attempt,
                    error = %message,
                    "developer response rejected"
                );
                log_attempt_failed!(&chunk.id, attempt, &message);
                retry.record_failure(message, Some(response.raw));
            }
        }
    }

    Err(retry.into_error(PHASE, chunk.id.clone()))
}

/// Reject code that is empty or would re-introduce placeholder tokens
pub fn validate_submission(submission: ChunkSubmission) -> Result<ChunkSubmission, String> {
    if submission.code.trim().is_empty() {
        return Err("`code` is empty".to_string());
    }
    if submission.code.contains(IMPORTS_PLACEHOLDER) {
        return Err("`code` must not contain the import placeholder".to_string());
    }
    let leftover = remaining_placeholders(&submission.code);
    if !leftover.is_empty() {
        return Err(format!(
            "`code` must not contain chunk placeholders (found {})",
            leftover.join(", ")
        ));
    }
    if submission.imports.iter().any(|i| i.module.trim().is_empty()) {
        return Err("every import needs a non-empty `module`".to_string());
    }
    Ok(submission)
}
