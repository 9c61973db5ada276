//! Data types for the chunked generation pipeline.
//!
//! This module defines the structures shared by all six phases:
//!
//! 1. **Plan model** - files to produce and the chunk tree inside each file
//! 2. **Generation state** - the persisted root document used for resume
//! 3. **Submissions** - the typed shapes a generator must return, with JSON
//!    schemas derived via `schemars`

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// ============================================================================
// Chunk Types
// ============================================================================

/// Lifecycle of a chunk node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    #[default]
    Pending,
    Decomposing,
    Generating,
    Completed,
    Failed,
}

impl ChunkStatus {
    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// `Generating -> Generating` is allowed so a leaf interrupted mid-call
    /// can be retried after a resume.
    pub fn can_advance_to(self, next: ChunkStatus) -> bool {
        use ChunkStatus::*;
        matches!(
            (self, next),
            (Pending, Decomposing)
                | (Pending, Generating)
                | (Decomposing, Completed)
                | (Generating, Generating)
                | (Generating, Completed)
                | (Generating, Failed)
        )
    }

    /// Completed and failed leaves are never revisited
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkStatus::Completed | ChunkStatus::Failed)
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Decomposing => "decomposing",
            ChunkStatus::Generating => "generating",
            ChunkStatus::Completed => "completed",
            ChunkStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A unit of work: either a leaf that receives code, or a composite planning node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    /// Plan-wide unique id, namespaced by the owning file
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Ids of chunks that must be generated first
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub status: ChunkStatus,

    /// Generated code; only ever set on leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Imports requested alongside `code`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportRequest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChunkNode>,
}

impl ChunkNode {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            dependencies: Vec::new(),
            status: ChunkStatus::Pending,
            code: None,
            imports: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_children(mut self, children: Vec<ChunkNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Move to `next` if the transition is forward. Returns false otherwise.
    pub fn advance(&mut self, next: ChunkStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Every id in this subtree, including this node's own
    pub fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

/// Depth-first leaves of a chunk forest, in declaration order
pub fn collect_leaves<'a>(chunks: &'a [ChunkNode], out: &mut Vec<&'a ChunkNode>) {
    for chunk in chunks {
        if chunk.is_leaf() {
            out.push(chunk);
        } else {
            collect_leaves(&chunk.children, out);
        }
    }
}

/// Leaf ids under every composite node of a forest, keyed by composite id
pub fn composite_leaf_ids(chunks: &[ChunkNode], out: &mut HashMap<String, Vec<String>>) {
    for chunk in chunks {
        if chunk.is_leaf() {
            continue;
        }
        let mut leaves = Vec::new();
        collect_leaves(&chunk.children, &mut leaves);
        out.insert(
            chunk.id.clone(),
            leaves.iter().map(|leaf| leaf.id.clone()).collect(),
        );
        composite_leaf_ids(&chunk.children, out);
    }
}

/// Copies of the leaves of `chunks` carrying their effective dependencies.
///
/// A leaf inherits the dependencies of its ancestors, and a dependency on a
/// composite becomes a dependency on each of that composite's leaves.
pub fn resolve_leaves(
    chunks: &[ChunkNode],
    composites: &HashMap<String, Vec<String>>,
    inherited: &[String],
    out: &mut Vec<ChunkNode>,
) {
    for chunk in chunks {
        let mut deps = inherited.to_vec();
        deps.extend(chunk.dependencies.iter().cloned());
        if chunk.is_leaf() {
            let mut resolved = chunk.clone();
            resolved.dependencies = expand_dependencies(&chunk.id, &deps, composites);
            out.push(resolved);
        } else {
            resolve_leaves(&chunk.children, composites, &deps, out);
        }
    }
}

fn expand_dependencies(
    id: &str,
    deps: &[String],
    composites: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    for dep in deps {
        let targets = match composites.get(dep) {
            Some(leaves) => leaves.as_slice(),
            None => std::slice::from_ref(dep),
        };
        for target in targets {
            if target != id && seen.insert(target.as_str()) {
                expanded.push(target.clone());
            }
        }
    }
    expanded
}

pub(crate) fn find_in<'a>(chunks: &'a mut [ChunkNode], id: &str) -> Option<&'a mut ChunkNode> {
    for chunk in chunks.iter_mut() {
        if chunk.id == id {
            return Some(chunk);
        }
        if let Some(found) = find_in(&mut chunk.children, id) {
            return Some(found);
        }
    }
    None
}

// ============================================================================
// File Types
// ============================================================================

/// Output file kind; decides whether an import placeholder is scaffolded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    TypeScript,
    JavaScript,
    Json,
    Markdown,
    Yaml,
    Text,
    Other,
}

impl FileKind {
    /// Whether files of this kind get an import block
    pub fn carries_imports(self) -> bool {
        matches!(self, FileKind::TypeScript | FileKind::JavaScript)
    }

    /// Infer the kind from an extension, with or without the leading dot
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ts" | "tsx" | "mts" | "cts" => FileKind::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => FileKind::JavaScript,
            "json" => FileKind::Json,
            "md" | "mdx" => FileKind::Markdown,
            "yaml" | "yml" => FileKind::Yaml,
            "txt" => FileKind::Text,
            _ => FileKind::Other,
        }
    }

    /// Lenient parse of a kind label a generator produced
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" | "tsx" => Some(FileKind::TypeScript),
            "javascript" | "js" | "jsx" => Some(FileKind::JavaScript),
            "json" => Some(FileKind::Json),
            "markdown" | "md" => Some(FileKind::Markdown),
            "yaml" | "yml" => Some(FileKind::Yaml),
            "text" | "txt" | "plain" => Some(FileKind::Text),
            "other" => Some(FileKind::Other),
            _ => None,
        }
    }

    /// Fence language used when showing file content in prompts
    pub fn fence_lang(self) -> &'static str {
        match self {
            FileKind::TypeScript => "typescript",
            FileKind::JavaScript => "javascript",
            FileKind::Json => "json",
            FileKind::Markdown => "markdown",
            FileKind::Yaml => "yaml",
            FileKind::Text | FileKind::Other => "",
        }
    }
}

/// One output artifact of the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTarget {
    /// Directory relative to the output root
    pub path: String,

    /// File stem
    pub name: String,

    /// Extension, with or without the leading dot
    pub extension: String,

    pub kind: FileKind,

    /// What the file is for
    #[serde(default)]
    pub brief: String,

    #[serde(default)]
    pub chunks: Vec<ChunkNode>,

    /// Set once the Planner has replaced the top-level chunks
    #[serde(default)]
    pub decomposed: bool,
}

impl FileTarget {
    /// `name` plus normalized extension
    pub fn file_name(&self) -> String {
        let ext = self.extension.trim();
        if ext.is_empty() || ext.starts_with('.') {
            format!("{}{}", self.name, ext)
        } else {
            format!("{}.{}", self.name, ext)
        }
    }

    /// Output path relative to the output root, with forward slashes
    pub fn relative_path(&self) -> String {
        let dir = self.path.trim().trim_start_matches("./").trim_matches('/');
        if dir.is_empty() || dir == "." {
            self.file_name()
        } else {
            format!("{}/{}", dir, self.file_name())
        }
    }

    /// Absolute location under `root`
    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }

    pub fn leaves(&self) -> Vec<&ChunkNode> {
        let mut out = Vec::new();
        collect_leaves(&self.chunks, &mut out);
        out
    }

    pub fn find_chunk_mut(&mut self, id: &str) -> Option<&mut ChunkNode> {
        find_in(&mut self.chunks, id)
    }

    /// Leaves with effective dependencies, see [`resolve_leaves`]
    pub fn resolved_leaves(&self) -> Vec<ChunkNode> {
        let mut composites = HashMap::new();
        composite_leaf_ids(&self.chunks, &mut composites);
        let mut out = Vec::new();
        resolve_leaves(&self.chunks, &composites, &[], &mut out);
        out
    }
}

/// The full generation plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub files: Vec<FileTarget>,
}

impl Plan {
    /// Every chunk id across all files, composite nodes included
    pub fn all_ids(&self) -> HashSet<String> {
        let mut ids = Vec::new();
        for file in &self.files {
            for chunk in &file.chunks {
                chunk.collect_ids(&mut ids);
            }
        }
        ids.into_iter().map(str::to_string).collect()
    }

    /// Leaves across every file, each paired with its file index
    pub fn leaves(&self) -> Vec<(usize, &ChunkNode)> {
        self.files
            .iter()
            .enumerate()
            .flat_map(|(idx, file)| file.leaves().into_iter().map(move |leaf| (idx, leaf)))
            .collect()
    }

    /// Leaves across every file with effective dependencies. Composites in
    /// any file expand, so a dependency on another file's composite resolves.
    pub fn resolved_leaves(&self) -> Vec<(usize, ChunkNode)> {
        let mut composites = HashMap::new();
        for file in &self.files {
            composite_leaf_ids(&file.chunks, &mut composites);
        }
        let mut out = Vec::new();
        for (idx, file) in self.files.iter().enumerate() {
            let mut leaves = Vec::new();
            resolve_leaves(&file.chunks, &composites, &[], &mut leaves);
            out.extend(leaves.into_iter().map(|leaf| (idx, leaf)));
        }
        out
    }

    /// Locate a chunk by id; returns the owning file index too
    pub fn find_chunk_mut(&mut self, id: &str) -> Option<(usize, &mut ChunkNode)> {
        self.files
            .iter_mut()
            .enumerate()
            .find_map(|(idx, file)| file.find_chunk_mut(id).map(|chunk| (idx, chunk)))
    }
}

// ============================================================================
// Generation State
// ============================================================================

/// Last phase whose results are fully reflected in the state document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Architected,
    Planned,
    Scaffolded,
    Developed,
    Assembled,
    Corrected,
}

impl PipelinePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::Architected => "architected",
            PipelinePhase::Planned => "planned",
            PipelinePhase::Scaffolded => "scaffolded",
            PipelinePhase::Developed => "developed",
            PipelinePhase::Assembled => "assembled",
            PipelinePhase::Corrected => "corrected",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Imports requested per file: module specifier to imported symbols
pub type FileImports = BTreeMap<String, BTreeSet<String>>;

/// The persisted root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub run_id: Uuid,

    pub phase: PipelinePhase,

    /// Caller side parameters, merged with any extracted by the Architect
    #[serde(default)]
    pub params: serde_json::Value,

    pub updated_at: DateTime<Utc>,

    pub plan: Plan,

    /// Keyed by the file's relative output path
    #[serde(default)]
    pub file_imports: BTreeMap<String, FileImports>,
}

impl GenerationState {
    pub fn new(plan: Plan, params: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: PipelinePhase::Architected,
            params,
            updated_at: Utc::now(),
            plan,
            file_imports: BTreeMap::new(),
        }
    }

    /// Merge import requests for a file, deduplicating specifiers per module
    pub fn record_imports(&mut self, file_key: &str, imports: &[ImportRequest]) {
        if imports.is_empty() {
            return;
        }
        let entry = self.file_imports.entry(file_key.to_string()).or_default();
        for import in imports {
            let module = import.module.trim();
            if module.is_empty() {
                continue;
            }
            let specifiers = entry.entry(module.to_string()).or_default();
            for spec in &import.specifiers {
                let spec = spec.trim();
                if !spec.is_empty() {
                    specifiers.insert(spec.to_string());
                }
            }
        }
    }

    /// Ids of leaves left `failed` for manual inspection
    pub fn failed_leaves(&self) -> Vec<String> {
        self.plan
            .leaves()
            .into_iter()
            .filter(|(_, leaf)| leaf.status == ChunkStatus::Failed)
            .map(|(_, leaf)| leaf.id.clone())
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Submission Types
// ============================================================================

/// One import a chunk needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImportRequest {
    /// Module specifier, e.g. `node:path` or `./utils`
    pub module: String,

    /// Imported symbols; `default as X` imports the default export as `X`
    #[serde(default)]
    pub specifiers: Vec<String>,
}

/// A top-level chunk as proposed by the Architect
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChunkDraft {
    /// Unique id, prefixed with the file path as a namespace
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Ids of chunks this one needs first
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A file as proposed by the Architect
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchitectFile {
    /// Directory relative to the output root
    pub path: String,
    /// File name without extension
    pub name: String,
    /// Extension such as `ts` or `.md`
    pub extension: String,
    /// typescript, javascript, json, markdown, yaml, text or other
    #[serde(default)]
    pub kind: Option<String>,
    /// One-paragraph purpose of the file
    #[serde(default)]
    pub brief: String,
    /// Flat list of high-level conceptual chunks
    pub chunks: Vec<ChunkDraft>,
}

impl ArchitectFile {
    pub fn into_target(self) -> FileTarget {
        let kind = self
            .kind
            .as_deref()
            .and_then(FileKind::parse_label)
            .unwrap_or_else(|| FileKind::from_extension(&self.extension));
        FileTarget {
            path: self.path,
            name: self.name,
            extension: self.extension,
            kind,
            brief: self.brief,
            chunks: self
                .chunks
                .into_iter()
                .map(|draft| {
                    ChunkNode::new(draft.id, draft.title, draft.description)
                        .with_dependencies(draft.dependencies)
                })
                .collect(),
            decomposed: false,
        }
    }
}

/// What the Architect must return
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchitectSubmission {
    pub files: Vec<ArchitectFile>,
    /// Parameters extracted from the instruction
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

/// One node of a decomposition tree
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubChunkDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Nested sub-chunks; empty for atomic leaves
    #[serde(default)]
    pub children: Vec<SubChunkDraft>,
}

impl From<SubChunkDraft> for ChunkNode {
    fn from(draft: SubChunkDraft) -> Self {
        ChunkNode::new(draft.id, draft.title, draft.description)
            .with_dependencies(draft.dependencies)
            .with_children(draft.children.into_iter().map(ChunkNode::from).collect())
    }
}

/// What the Planner must return for one top-level chunk
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DecompositionSubmission {
    #[serde(alias = "subChunks")]
    pub sub_chunks: Vec<SubChunkDraft>,
}

/// What the Developer must return for one leaf
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChunkSubmission {
    /// Code that replaces the placeholder, nothing more
    pub code: String,
    #[serde(default)]
    pub imports: Vec<ImportRequest>,
}
