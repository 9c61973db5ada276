//! Prompt text for each generator-backed phase

use super::placeholder::chunk_placeholder;
use super::types::{ChunkNode, FileTarget};

pub const ARCHITECT_CONTRACT: &str = "submit_plan";
pub const PLANNER_CONTRACT: &str = "submit_decomposition";
pub const DEVELOPER_CONTRACT: &str = "generate_chunk";

pub const ARCHITECT_SYSTEM: &str = r#"You are a master software architect. Your sole responsibility is to analyze a request and create a high-level project plan. You do not write code. You plan.
You will be given a system prompt from the user that you should follow.

Your task:
1. Decompose the request into a logical set of files.
2. For each file, define only the largest conceptual components ("chunks"), such as `Imports and setup`, `Request validation` or `Error path tests`.
3. Do not decompose further. A specialized planner handles detailed decomposition. Do not nest chunks.

Rules:
- Every chunk id must be unique across the whole plan. Prefix it with the file path, e.g. `src/math.ts:helpers`.
- `dependencies` lists ids of chunks that must be written first.
- Respond with a single JSON object that adheres to the provided schema."#;

pub const PLANNER_SYSTEM: &str = r#"You are an expert technical planner. Your sole purpose is to take one high-level conceptual chunk and decompose it into a hierarchical plan for a developer to follow.

Your task:
1. Understand the chunk's goal and its context within the file.
2. Recursively decompose it until every leaf is a single atomic unit of code: one function, one test case, one block of constants or one cohesive statement block.
3. Nest deeply where it helps. A test suite becomes describe blocks, and each of those becomes individual test cases.
4. Every element of a `children` array must be a complete chunk object.
5. Map dependencies between your sub-chunks accurately. Leaves may also depend on chunk ids from elsewhere in the plan.
6. Give every sub-chunk a unique id that uses the parent chunk id as its namespace.

Respond only through the requested submission."#;

pub const DEVELOPER_SYSTEM: &str = r#"You are an expert software developer. Your only purpose is to write the code for a single atomic chunk of a larger file, performing a surgical replacement of a placeholder.

You will be given the entire file as it currently exists, with a placeholder comment for you to replace.
Your response must contain only the code for that chunk. It must integrate with the surrounding code. Do not redefine existing classes, interfaces, functions or variables.
Do not write import statements into the code. Request imports through the `imports` list instead.
Never wrap the code in markdown fences."#;

pub const CORRECTOR_SYSTEM: &str = r#"You are an expert programmer with an obsessive attention to detail. You receive a file that was assembled from independently generated pieces. Identify its flaws and return a corrected, production-ready version.

Rules:
1. Consolidate imports: remove duplicate or unused imports and merge imports from the same module.
2. Fix all syntax errors.
3. The file may contain duplicated class, type or function definitions. Consolidate each into a single correct definition.
4. The result must be one complete file that runs without errors.
5. Return only the raw corrected content. No explanations and no markdown fences."#;

pub fn architect_prompt(
    system_prompt: &str,
    instruction: &str,
    directory_listing: Option<&str>,
    extract_params: bool,
) -> String {
    let listing = directory_listing
        .map(|l| format!("\n<directory_structure>\n{}</directory_structure>\n", l))
        .unwrap_or_default();
    let params = if extract_params {
        "\nExtract any parameters you find into the `params` object, conforming to its schema.\n"
    } else {
        ""
    };

    format!(
        r#"
<user_system_prompt>
{system_prompt}
</user_system_prompt>

<user_instruction>
{instruction}
</user_instruction>
{listing}{params}
Based on the instruction and directory structure, create the high-level generation plan. Only define the top-level conceptual chunks for each file. Do not create a nested or detailed plan."#
    )
}

pub fn planner_prompt(file: &FileTarget, chunk: &ChunkNode) -> String {
    let siblings: Vec<String> = file
        .chunks
        .iter()
        .filter(|c| c.id != chunk.id)
        .map(|c| format!("- {} ({})", c.title, c.id))
        .collect();
    let siblings = if siblings.is_empty() {
        "None.".to_string()
    } else {
        siblings.join("\n")
    };
    let deps = if chunk.dependencies.is_empty() {
        "None.".to_string()
    } else {
        chunk.dependencies.join(", ")
    };

    format!(
        r#"
**File to be created:** {path}
**File purpose:** {brief}
**High-Level Chunk to Decompose:** "{title}" (id `{id}`)
**Description:** {description}
**Depends on:** {deps}

**Other chunks in this file (planned separately):**
{siblings}

Create the detailed, hierarchical execution plan for this chunk. Every sub-chunk id must start with `{id}`."#,
        path = file.relative_path(),
        brief = file.brief,
        title = chunk.title,
        id = chunk.id,
        description = chunk.description,
    )
}

/// Dependency code as labelled sections, or a note that there is none
pub fn format_dependency_context(dependencies: &[(String, String)]) -> String {
    if dependencies.is_empty() {
        return "This chunk has no dependencies.".to_string();
    }
    dependencies
        .iter()
        .map(|(id, code)| format!("// DEPENDENCY CHUNK: {}\n\n{}", id, code))
        .collect::<Vec<_>>()
        .join("\n\n// -----\n\n")
}

pub fn developer_prompt(
    file: &FileTarget,
    chunk: &ChunkNode,
    current_content: &str,
    dependencies: &[(String, String)],
) -> String {
    format!(
        r#"
**File to be surgically modified:** `{path}`

**Current File Content:**
```{lang}
{current_content}
```

---

**YOUR ASSIGNMENT:**
Replace the placeholder `{placeholder}` with the code for the chunk titled **"{title}"**.

**Chunk Description:** {description}

**Dependencies (for context only):**
The code of chunks this chunk depends on is shown below. Do not duplicate it.
---
{context}
---

Submit the exact code that replaces the placeholder."#,
        path = file.relative_path(),
        lang = file.kind.fence_lang(),
        placeholder = chunk_placeholder(&chunk.id),
        title = chunk.title,
        description = chunk.description,
        context = format_dependency_context(dependencies),
    )
}

pub fn corrector_prompt(file: &FileTarget, content: &str) -> String {
    format!(
        r#"
Correct the following file `{name}`. It may contain duplicated definitions, scattered imports or syntax errors introduced while it was assembled piece by piece.

**File Path:** {path}

**Assembled Code:**
```{lang}
{content}
```

Return only the fully corrected file."#,
        name = file.file_name(),
        path = file.relative_path(),
        lang = file.kind.fence_lang(),
    )
}
