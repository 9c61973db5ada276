//! Phase 2: Planner
//!
//! Each top-level chunk is replaced by a hierarchical decomposition whose
//! leaves are atomic units (one function, one test case, one statement
//! block). Every decomposition runs through the bounded retry loop, with the
//! previous invalid response and its error echoed into the next prompt.
//! Exhausting the attempts for any chunk aborts the run.
//!
//! A top-level chunk whose id does not survive its decomposition stays in
//! the tree as a composite parent, so dependencies naming it still resolve
//! to its leaves.
//!
//! State is flushed after each file so a resumed run skips files already
//! marked `decomposed`.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::prompts::{planner_prompt, PLANNER_CONTRACT, PLANNER_SYSTEM};
use super::retry::RetryState;
use super::state::StateStore;
use super::types::{
    ChunkNode, ChunkStatus, DecompositionSubmission, FileTarget, GenerationState, SubChunkDraft,
};
use crate::generation::{
    decode_structured, with_timeout, GenerationRequest, Generator, OutputContract,
};
use chunkweave_sdk::{log_attempt_failed, log_generator_call};

pub const PHASE: &str = "planner";

/// Decompose every file not yet marked `decomposed`
pub async fn decompose_plan(
    generator: &dyn Generator,
    config: &PipelineConfig,
    state: &mut GenerationState,
    store: &StateStore,
) -> Result<(), PipelineError> {
    for idx in 0..state.plan.files.len() {
        if state.plan.files[idx].decomposed {
            debug!(file = %state.plan.files[idx].relative_path(), "already decomposed, skipping");
            continue;
        }

        let top_level: Vec<ChunkNode> = state.plan.files[idx].chunks.clone();
        let mut decomposed: Vec<ChunkNode> = Vec::new();

        for chunk in &top_level {
            info!(chunk_id = %chunk.id, "decomposing top-level chunk");
            if let Some(node) = state.plan.files[idx].find_chunk_mut(&chunk.id) {
                node.advance(ChunkStatus::Decomposing);
            }

            let mut taken = state.plan.all_ids();
            for node in &decomposed {
                let mut ids = Vec::new();
                node.collect_ids(&mut ids);
                taken.extend(ids.into_iter().map(str::to_string));
            }
            taken.remove(&chunk.id);

            let sub_chunks =
                decompose_chunk(generator, config, &state.plan.files[idx], chunk, &taken).await?;
            decomposed.extend(attach_decomposition(chunk, sub_chunks));
        }

        let file = &mut state.plan.files[idx];
        file.chunks = decomposed;
        file.decomposed = true;
        info!(file = %file.relative_path(), leaves = file.leaves().len(), "file decomposed");

        store.save(state).await?;
    }

    Ok(())
}

/// Run the retry loop for one top-level chunk
pub async fn decompose_chunk(
    generator: &dyn Generator,
    config: &PipelineConfig,
    file: &FileTarget,
    chunk: &ChunkNode,
    taken_ids: &HashSet<String>,
) -> Result<Vec<ChunkNode>, PipelineError> {
    let contract = OutputContract::for_type::<DecompositionSubmission>(
        PLANNER_CONTRACT,
        "Submit the detailed, hierarchical list of sub-chunks.",
    );
    let base_prompt = planner_prompt(file, chunk);
    let mut retry = RetryState::new(config.max_retries);

    while let Some(attempt) = retry.next_attempt() {
        let request = GenerationRequest::new(
            PLANNER_SYSTEM,
            retry.decorate(&base_prompt, PLANNER_CONTRACT),
        )
        .with_temperature(0.0);

        log_generator_call!(&chunk.id, generator.name());
        let response = match with_timeout(
            config.call_timeout(),
            generator.generate_structured(&request, &contract),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(chunk_id = %chunk.id, attempt, error = %e, "planner call failed");
                log_attempt_failed!(&chunk.id, attempt, &e);
                retry.record_failure(e.to_string(), None);
                continue;
            }
        };

        let outcome = decode_structured::<DecompositionSubmission>(&response)
            .and_then(|submission| validate_decomposition(submission, taken_ids));

        match outcome {
            Ok(nodes) => return Ok(nodes),
            Err(message) => {
                warn!(chunk_id = %chunk.id, attempt, error = %message, "planner response rejected");
                log_attempt_failed!(&chunk.id, attempt, &message);
                retry.record_failure(message, Some(response.raw));
            }
        }
    }

    Err(retry.into_error(PHASE, chunk.id.clone()))
}

/// Put a decomposition in place of its top-level chunk.
///
/// When the decomposition reuses the parent's id, its root nodes take over
/// the parent's dependencies. Otherwise the parent wraps the sub-chunks as a
/// completed composite and its dependencies pass down to every leaf.
pub fn attach_decomposition(parent: &ChunkNode, mut sub_chunks: Vec<ChunkNode>) -> Vec<ChunkNode> {
    let mut ids = Vec::new();
    for node in &sub_chunks {
        node.collect_ids(&mut ids);
    }

    if ids.contains(&parent.id.as_str()) {
        for node in &mut sub_chunks {
            let mut deps = parent.dependencies.clone();
            deps.retain(|dep| *dep != node.id && !node.dependencies.contains(dep));
            deps.append(&mut node.dependencies);
            node.dependencies = deps;
        }
        return sub_chunks;
    }

    let mut wrapper = parent.clone().with_children(sub_chunks);
    wrapper.status = ChunkStatus::Decomposing;
    wrapper.advance(ChunkStatus::Completed);
    vec![wrapper]
}

/// Check a decomposition and convert it into chunk nodes.
///
/// Ids must be non-empty, unique within the submission and absent from
/// `taken_ids`. An empty decomposition is invalid.
pub fn validate_decomposition(
    submission: DecompositionSubmission,
    taken_ids: &HashSet<String>,
) -> Result<Vec<ChunkNode>, String> {
    if submission.sub_chunks.is_empty() {
        return Err("the decomposition contains no sub-chunks".to_string());
    }

    let mut seen = HashSet::new();
    check_ids(&submission.sub_chunks, taken_ids, &mut seen)?;

    Ok(submission.sub_chunks.into_iter().map(ChunkNode::from).collect())
}

fn check_ids<'a>(
    drafts: &'a [SubChunkDraft],
    taken_ids: &HashSet<String>,
    seen: &mut HashSet<&'a str>,
) -> Result<(), String> {
    for draft in drafts {
        let id = draft.id.trim();
        if id.is_empty() {
            return Err(format!("sub-chunk \"{}\" has an empty id", draft.title));
        }
        if id != draft.id {
            return Err(format!("sub-chunk id `{}` has surrounding whitespace", draft.id));
        }
        if taken_ids.contains(id) {
            return Err(format!(
                "sub-chunk id `{}` collides with a chunk elsewhere in the plan",
                id
            ));
        }
        if !seen.insert(id) {
            return Err(format!("sub-chunk id `{}` is used more than once", id));
        }
        check_ids(&draft.children, taken_ids, seen)?;
    }
    Ok(())
}
