//! Tests for Scaffolder, Developer and Assembler working on real files

use super::common::*;
use chunkweave::pipeline::phase3_scaffold::{scaffold_file, scaffold_files};
use chunkweave::pipeline::phase4_develop::develop_chunks;
use chunkweave::pipeline::phase5_assemble::{assemble_file, assemble_files};
use chunkweave::pipeline::placeholder::{
    chunk_placeholder, remaining_placeholders, IMPORTS_PLACEHOLDER,
};
use chunkweave::pipeline::*;

// ============================================================================
// Scaffolder
// ============================================================================

#[tokio::test]
async fn test_scaffold_orders_placeholders_by_dependency() {
    let dir = tempfile::tempdir().unwrap();
    let file = ts_file("utils", vec![leaf("c2", &["c1"]), leaf("c1", &[])]);

    let content = scaffold_file(&file, dir.path()).await.unwrap();

    assert_eq!(
        content,
        format!(
            "{}\n{}\n{}",
            IMPORTS_PLACEHOLDER,
            chunk_placeholder("c1"),
            chunk_placeholder("c2")
        )
    );
    let on_disk = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert_eq!(on_disk, content);
}

#[tokio::test]
async fn test_scaffold_places_composite_dependencies_first() {
    let dir = tempfile::tempdir().unwrap();
    let file = ts_file("a", test_on_helpers());

    let content = scaffold_file(&file, dir.path()).await.unwrap();

    let test_at = content.find(&chunk_placeholder("a:test")).unwrap();
    assert!(content.find(&chunk_placeholder("a:helpers:one")).unwrap() < test_at);
    assert!(content.find(&chunk_placeholder("a:helpers:two")).unwrap() < test_at);
    assert!(!content.contains(&chunk_placeholder("a:helpers")));
}

#[tokio::test]
async fn test_scaffold_skips_import_line_for_plain_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = ts_file("README", vec![leaf("intro", &[])]);
    file.path = String::new();
    file.extension = "md".to_string();
    file.kind = FileKind::Markdown;

    let content = scaffold_file(&file, dir.path()).await.unwrap();
    assert_eq!(content, chunk_placeholder("intro"));
    assert!(dir.path().join("README.md").exists());
}

// ============================================================================
// Developer
// ============================================================================

#[tokio::test]
async fn test_develop_fills_every_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = StateStore::new(config.state_path());
    let mut state = planned_state(vec![leaf("c2", &["c1"]), leaf("c1", &[])]);
    scaffold_files(&state, dir.path()).await.unwrap();

    let generator = ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply("export function one() { return 1; }")),
        Reply::Value(chunk_reply("export function two() { return one() + 1; }")),
    ]);
    let hooks = RecordingHooks::default();

    develop_chunks(&generator, &hooks, &config, &mut state, &store)
        .await
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert!(remaining_placeholders(&content).is_empty());
    assert!(content.find("function one").unwrap() < content.find("function two").unwrap());
    assert!(state.plan.leaves().iter().all(|(_, l)| l.status == ChunkStatus::Completed));

    // The dependent leaf sees its dependency's code
    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].prompt.contains("export function one()"));

    let chunks = hooks.chunks.lock().unwrap().clone();
    assert_eq!(
        chunks,
        vec![("c1".to_string(), 1, 2), ("c2".to_string(), 2, 2)]
    );
}

#[tokio::test]
async fn test_develop_passes_composite_leaves_as_dependency_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = StateStore::new(config.state_path());
    let mut state = planned_state(test_on_helpers());
    scaffold_files(&state, dir.path()).await.unwrap();

    let generator = ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply("export const one = () => 1;")),
        Reply::Value(chunk_reply("export const two = () => 2;")),
        Reply::Value(chunk_reply("test('sum', () => expect(one() + two()).toBe(3));")),
    ]);

    develop_chunks(&generator, &NoopHooks, &config, &mut state, &store)
        .await
        .unwrap();

    let requests = generator.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].prompt.contains("export const one = () => 1;"));
    assert!(requests[2].prompt.contains("export const two = () => 2;"));

    let content = std::fs::read_to_string(dir.path().join("src/utils.ts")).unwrap();
    assert!(remaining_placeholders(&content).is_empty());
    assert!(content.find("const two").unwrap() < content.find("test('sum'").unwrap());
}

#[tokio::test]
async fn test_missing_placeholder_marks_leaf_failed_and_keeps_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = StateStore::new(config.state_path());
    let mut state = planned_state(vec![leaf("c1", &[]), leaf("c2", &[])]);
    scaffold_files(&state, dir.path()).await.unwrap();

    // Someone edited the file by hand and removed c1's token
    let path = dir.path().join("src/utils.ts");
    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace(&chunk_placeholder("c1"), "// hand written");
    std::fs::write(&path, edited).unwrap();

    let generator = ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply("const a = 1;")),
        Reply::Value(chunk_reply("const b = 2;")),
    ]);

    develop_chunks(&generator, &NoopHooks, &config, &mut state, &store)
        .await
        .unwrap();

    let c1 = state.plan.find_chunk_mut("c1").unwrap().1.clone();
    assert_eq!(c1.status, ChunkStatus::Failed);
    assert_eq!(c1.code.as_deref(), Some("const a = 1;"));
    assert_eq!(state.failed_leaves(), vec!["c1".to_string()]);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("const b = 2;"));
    assert!(!content.contains("const a = 1;"));
}

#[tokio::test]
async fn test_develop_records_imports_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = StateStore::new(config.state_path());
    let mut state = planned_state(vec![leaf("c1", &[]), leaf("c2", &[])]);
    scaffold_files(&state, dir.path()).await.unwrap();

    let generator = ScriptedGenerator::new(vec![
        Reply::Value(chunk_reply_with_import("const p = join('a');", "node:path", "join")),
        Reply::Value(chunk_reply_with_import("const q = join('b');", "node:path", "join")),
    ]);

    develop_chunks(&generator, &NoopHooks, &config, &mut state, &store)
        .await
        .unwrap();

    let imports = state.file_imports.get("src/utils.ts").unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports["node:path"].len(), 1);
}

// ============================================================================
// Assembler
// ============================================================================

#[tokio::test]
async fn test_assemble_renders_imports_once_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = StateStore::new(config.state_path());
    let mut state = planned_state(vec![leaf("c1", &[])]);
    scaffold_files(&state, dir.path()).await.unwrap();

    let generator = ScriptedGenerator::new(vec![Reply::Value(chunk_reply_with_import(
        "export const cwd = resolve('.');",
        "node:path",
        "resolve",
    ))]);
    develop_chunks(&generator, &NoopHooks, &config, &mut state, &store)
        .await
        .unwrap();

    let hooks = RecordingHooks::default();
    assemble_files(&hooks, &config, &state).await.unwrap();

    let path = dir.path().join("src/utils.ts");
    let first = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        first,
        "import { resolve } from 'node:path';\nexport const cwd = resolve('.');"
    );
    assert_eq!(
        hooks.submitted.lock().unwrap().clone(),
        vec![("src/utils.ts".to_string(), SubmitStage::Assembled)]
    );

    let file = &state.plan.files[0];
    let again = assemble_file(file, &path, state.file_imports.get("src/utils.ts"))
        .await
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
}

#[tokio::test]
async fn test_assemble_without_imports_drops_placeholder_line() {
    let dir = tempfile::tempdir().unwrap();
    let file = ts_file("empty", vec![leaf("c1", &[])]);
    let path = dir.path().join("src/empty.ts");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, format!("{}\nconst x = 1;", IMPORTS_PLACEHOLDER)).unwrap();

    let content = assemble_file(&file, &path, None).await.unwrap();
    assert_eq!(content, "const x = 1;");
}
