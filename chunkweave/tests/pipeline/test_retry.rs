//! Tests for the bounded retry loops of the Planner and Developer

use super::common::*;
use chunkweave::pipeline::phase2_plan::{decompose_chunk, decompose_plan};
use chunkweave::pipeline::phase4_develop::generate_leaf;
use chunkweave::pipeline::*;
use serde_json::json;
use std::collections::HashSet;

fn top_level(id: &str) -> ChunkNode {
    ChunkNode::new(id, "Helpers", "A few helpers")
}

#[tokio::test]
async fn test_planner_retry_echoes_previous_error_and_response() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let file = ts_file("utils", vec![top_level("utils")]);

    let generator = ScriptedGenerator::new(vec![
        Reply::Raw("I think you should write some helpers".to_string()),
        Reply::Value(json!({
            "sub_chunks": [
                { "id": "utils::a", "title": "a" },
                { "id": "utils::b", "title": "b", "dependencies": ["utils::a"] }
            ]
        })),
    ]);

    let nodes = decompose_chunk(&generator, &config, &file, &file.chunks[0], &HashSet::new())
        .await
        .unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].dependencies, vec!["utils::a".to_string()]);

    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].prompt.contains("FAILED"));
    let retry_prompt = &requests[1].prompt;
    assert!(retry_prompt.contains("ATTEMPT 1 FAILED"));
    assert!(retry_prompt.contains("did not contain a JSON object"));
    assert!(retry_prompt.contains("I think you should write some helpers"));
    assert!(retry_prompt.contains("submit_decomposition"));
}

#[tokio::test]
async fn test_planner_rejects_ids_taken_elsewhere_in_plan() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.max_retries = 2;
    let file = ts_file("utils", vec![top_level("utils")]);
    let taken: HashSet<String> = ["types::Point".to_string()].into_iter().collect();

    let colliding = json!({ "sub_chunks": [{ "id": "types::Point", "title": "dup" }] });
    let generator = ScriptedGenerator::new(vec![
        Reply::Value(colliding.clone()),
        Reply::Value(colliding),
    ]);

    let err = decompose_chunk(&generator, &config, &file, &file.chunks[0], &taken)
        .await
        .unwrap_err();

    match &err {
        PipelineError::RetriesExhausted {
            phase,
            target,
            attempts,
            message,
            ..
        } => {
            assert_eq!(*phase, "planner");
            assert_eq!(target, "utils");
            assert_eq!(*attempts, 2);
            assert!(message.contains("collides"));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert!(err.last_response().unwrap().contains("types::Point"));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_planner_treats_ids_of_sibling_decompositions_as_taken() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.max_retries = 1;
    let store = StateStore::new(config.state_path());

    let mut file = ts_file("utils", vec![top_level("utils::first"), top_level("utils::second")]);
    file.decomposed = false;
    let mut state = GenerationState::new(Plan { files: vec![file] }, json!({}));

    let generator = ScriptedGenerator::new(vec![
        Reply::Value(json!({ "sub_chunks": [{ "id": "utils::shared", "title": "x" }] })),
        Reply::Value(json!({ "sub_chunks": [{ "id": "utils::shared", "title": "y" }] })),
    ]);

    let err = decompose_plan(&generator, &config, &mut state, &store)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("utils::second"));
}

#[tokio::test]
async fn test_developer_gives_up_after_max_retries() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.max_retries = 3;
    let file = ts_file("utils", vec![leaf("c1", &[])]);

    let generator = ScriptedGenerator::new(vec![
        Reply::Fail("rate limited".to_string()),
        Reply::Value(json!({ "code": "   " })),
        Reply::Value(json!({ "code": "/*--CHUNK::c9--*/" })),
    ]);

    let err = generate_leaf(
        &generator,
        &NoopHooks,
        &config,
        &json!({}),
        &file,
        &file.chunks[0],
        "",
        &[],
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::RetriesExhausted {
            phase,
            attempts,
            message,
            ..
        } => {
            assert_eq!(phase, "developer");
            assert_eq!(attempts, 3);
            assert!(message.contains("placeholder"));
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert_eq!(generator.requests().len(), 3);
}

#[tokio::test]
async fn test_prompt_hooks_override_developer_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let file = ts_file("utils", vec![leaf("c1", &[])]);
    let params = json!({ "framework": "vitest" });

    let generator = ScriptedGenerator::new(vec![Reply::Value(chunk_reply("const a = 1;"))]);
    let hooks = PromptHooks::default();

    generate_leaf(
        &generator,
        &hooks,
        &config,
        &params,
        &file,
        &file.chunks[0],
        "/*--CHUNK::c1--*/",
        &[],
    )
    .await
    .unwrap();

    let requests = generator.requests();
    assert_eq!(requests[0].system, CUSTOM_SYSTEM);
    assert!(requests[0].prompt.starts_with("framework=\"vitest\"\n"));
    assert_eq!(hooks.seen_params.lock().unwrap().clone(), vec![params]);
}

#[tokio::test]
async fn test_prompt_hook_error_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let file = ts_file("utils", vec![leaf("c1", &[])]);

    let generator = ScriptedGenerator::new(vec![Reply::Value(chunk_reply("const a = 1;"))]);
    let hooks = PromptHooks {
        fail: true,
        ..PromptHooks::default()
    };

    let err = generate_leaf(
        &generator,
        &hooks,
        &config,
        &json!({}),
        &file,
        &file.chunks[0],
        "",
        &[],
    )
    .await
    .unwrap_err();

    match &err {
        PipelineError::Hook { hook, phase, .. } => {
            assert_eq!(*hook, "prepare_prompt");
            assert_eq!(*phase, "developer");
        }
        other => panic!("expected hook error, got {:?}", other),
    }
    assert!(err.is_fatal());
    assert!(generator.requests().is_empty());
}
