//! Full runs of the pipeline against scripted generators

use super::common::*;
use chunkweave::pipeline::placeholder::{remaining_placeholders, IMPORTS_PLACEHOLDER};
use chunkweave::pipeline::*;
use std::sync::Arc;

const ADD: &str = "export function add(a: number, b: number): number {\n  return a + b;\n}";
const MUL: &str = "export function mul(a: number, b: number): number {\n  return a * b;\n}";

fn planner_script() -> Vec<Reply> {
    vec![
        Reply::Value(two_function_plan()),
        Reply::Value(single_leaf_decomposition("src/utils.ts::add")),
        Reply::Value(single_leaf_decomposition("src/utils.ts::mul")),
    ]
}

#[tokio::test]
async fn test_two_function_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let planner = Arc::new(ScriptedGenerator::new(planner_script()));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
    ]));
    let hooks = Arc::new(RecordingHooks::default());

    let pipeline = Pipeline::new(developer.clone(), config)
        .with_planning_generator(planner.clone())
        .with_hooks(hooks.clone());

    let state = pipeline
        .run("generate a two-function utility file")
        .await
        .unwrap();

    assert_eq!(state.phase, PipelinePhase::Assembled);
    assert!(state.failed_leaves().is_empty());
    assert_eq!(planner.remaining(), 0);
    assert_eq!(developer.remaining(), 0);

    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert_eq!(content, format!("{}\n{}", ADD, MUL));
    assert!(remaining_placeholders(&content).is_empty());
    assert!(!content.contains(IMPORTS_PLACEHOLDER));

    let phases: Vec<usize> = hooks.phases.lock().unwrap().iter().map(|(p, _)| *p).collect();
    assert_eq!(phases, vec![1, 2, 3, 4, 5]);

    assert!(pipeline.state_store().exists());
    let saved = pipeline.state_store().load().await.unwrap();
    assert_eq!(saved.run_id, state.run_id);
    assert_eq!(saved.phase, PipelinePhase::Assembled);
}

#[tokio::test]
async fn test_instruction_reaches_architect() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.system_prompt = "Target Node 20.".to_string();

    let planner = Arc::new(ScriptedGenerator::new(planner_script()));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
    ]));

    Pipeline::new(developer, config)
        .with_planning_generator(planner.clone())
        .run("generate a two-function utility file")
        .await
        .unwrap();

    let architect = &planner.requests()[0];
    assert!(architect.prompt.contains("generate a two-function utility file"));
    assert!(architect.prompt.contains("Target Node 20."));
}

#[tokio::test]
async fn test_corrector_failure_keeps_assembled_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.correct = true;

    let mut script = planner_script();
    script.push(Reply::Fail("model overloaded".to_string()));
    let planner = Arc::new(ScriptedGenerator::new(script));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
    ]));
    let hooks = Arc::new(RecordingHooks::default());

    let state = Pipeline::new(developer, config)
        .with_planning_generator(planner)
        .with_hooks(hooks.clone())
        .run("generate a two-function utility file")
        .await
        .unwrap();

    assert_eq!(state.phase, PipelinePhase::Corrected);
    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert_eq!(content, format!("{}\n{}", ADD, MUL));
    assert_eq!(
        hooks.submitted.lock().unwrap().clone(),
        vec![("src/utils.ts".to_string(), SubmitStage::Assembled)]
    );
}

#[tokio::test]
async fn test_corrector_rewrites_file_without_fences() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.correct = true;

    let corrected = "export const add = (a: number, b: number) => a + b;\n\
                     export const mul = (a: number, b: number) => a * b;";
    let mut script = planner_script();
    script.push(Reply::Raw(format!("```typescript\n{}\n```", corrected)));
    let planner = Arc::new(ScriptedGenerator::new(script));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
    ]));
    let hooks = Arc::new(RecordingHooks::default());

    Pipeline::new(developer, config)
        .with_planning_generator(planner)
        .with_hooks(hooks.clone())
        .run("generate a two-function utility file")
        .await
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert_eq!(content, corrected);
    let stages: Vec<SubmitStage> = hooks
        .submitted
        .lock()
        .unwrap()
        .iter()
        .map(|(_, s)| *s)
        .collect();
    assert_eq!(stages, vec![SubmitStage::Assembled, SubmitStage::Corrected]);
}

#[tokio::test]
async fn test_cycle_in_plan_aborts_before_writing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let planner = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(two_function_plan()),
        Reply::Value(serde_json::json!({
            "sub_chunks": [{
                "id": "src/utils.ts::add",
                "title": "add",
                "dependencies": ["src/utils.ts::mul"]
            }]
        })),
        Reply::Value(serde_json::json!({
            "sub_chunks": [{
                "id": "src/utils.ts::mul",
                "title": "mul",
                "dependencies": ["src/utils.ts::add"]
            }]
        })),
    ]));
    let developer = Arc::new(ScriptedGenerator::default());

    let err = Pipeline::new(developer.clone(), config)
        .with_planning_generator(planner)
        .run("generate a two-function utility file")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::CircularDependency { .. }));
    assert!(!dir.path().join("src/utils.ts").exists());
    assert!(developer.requests().is_empty());
}

#[tokio::test]
async fn test_resume_after_failed_run_finishes_remaining_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.max_retries = 1;

    let planner = Arc::new(ScriptedGenerator::new(planner_script()));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Fail("connection reset".to_string()),
    ]));

    let err = Pipeline::new(developer, config.clone())
        .with_planning_generator(planner)
        .run("generate a two-function utility file")
        .await
        .unwrap_err();
    assert!(err.is_fatal());

    let idle_planner = Arc::new(ScriptedGenerator::default());
    let developer = Arc::new(ScriptedGenerator::new(vec![Reply::Value(chunk_reply(MUL))]));
    let state = Pipeline::new(developer.clone(), config)
        .with_planning_generator(idle_planner.clone())
        .resume_from_disk()
        .await
        .unwrap();

    assert!(idle_planner.requests().is_empty());
    assert_eq!(developer.requests().len(), 1);
    assert_eq!(state.phase, PipelinePhase::Assembled);

    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert_eq!(content, format!("{}\n{}", ADD, MUL));
}

#[tokio::test]
async fn test_extracted_params_and_directory_listing_flow_through_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("existing.md"), "# notes").unwrap();

    let mut config = test_config(dir.path());
    config.scan_existing = true;
    config.params = serde_json::json!({ "runtime": "node" });
    config.params_schema = Some(serde_json::json!({
        "type": "object",
        "properties": { "framework": { "type": "string" } }
    }));

    let mut plan = two_function_plan();
    plan["params"] = serde_json::json!({ "framework": "vitest" });
    let planner = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(plan),
        Reply::Value(single_leaf_decomposition("src/utils.ts::add")),
        Reply::Value(single_leaf_decomposition("src/utils.ts::mul")),
    ]));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
    ]));
    let hooks = Arc::new(PromptHooks::default());

    let state = Pipeline::new(developer.clone(), config)
        .with_planning_generator(planner.clone())
        .with_hooks(hooks.clone())
        .run("generate a two-function utility file")
        .await
        .unwrap();

    assert_eq!(state.params["framework"], "vitest");
    assert_eq!(state.params["runtime"], "node");

    let architect = &planner.requests()[0];
    assert!(architect.prompt.contains("<directory_structure>"));
    assert!(architect.prompt.contains("- existing.md (file)"));
    assert!(architect.prompt.contains("`params`"));

    let seen = hooks.seen_params.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| *p == state.params));

    for request in developer.requests() {
        assert_eq!(request.system, CUSTOM_SYSTEM);
        assert!(request.prompt.starts_with("framework=\"vitest\"\n"));
    }
}

#[tokio::test]
async fn test_dependency_on_replaced_top_level_chunk_resolves_to_its_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let planner = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(serde_json::json!({
            "files": [{
                "path": "src",
                "name": "math",
                "extension": "ts",
                "kind": "typescript",
                "brief": "Arithmetic with a test",
                "chunks": [
                    { "id": "math::test", "title": "test", "dependencies": ["math::ops"] },
                    { "id": "math::ops", "title": "ops" }
                ]
            }]
        })),
        Reply::Value(single_leaf_decomposition("math::test")),
        Reply::Value(serde_json::json!({
            "sub_chunks": [
                { "id": "math::ops::add", "title": "add" },
                { "id": "math::ops::mul", "title": "mul" }
            ]
        })),
    ]));
    let developer = Arc::new(ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply(ADD)),
        Reply::Value(chunk_reply(MUL)),
        Reply::Value(chunk_reply("test('ops', () => expect(mul(add(1, 1), 2)).toBe(4));")),
    ]));

    let state = Pipeline::new(developer.clone(), config)
        .with_planning_generator(planner)
        .run("arithmetic helpers and a test")
        .await
        .unwrap();

    assert_eq!(state.phase, PipelinePhase::Assembled);
    let ops = &state.plan.files[0].chunks[1];
    assert_eq!(ops.id, "math::ops");
    assert_eq!(ops.children.len(), 2);

    let requests = developer.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].prompt.contains(ADD));
    assert!(requests[2].prompt.contains(MUL));

    let content = std::fs::read_to_string(dir.path().join("src/math.ts")).unwrap();
    assert!(content.find("function mul").unwrap() < content.find("test('ops'").unwrap());
}
