//! Placeholder tokens, surgical replacement and import rendering.
//!
//! A scaffolded file is a line of [`IMPORTS_PLACEHOLDER`] (for import-bearing
//! kinds) followed by one [`chunk_placeholder`] token per leaf. Later phases
//! only ever do exact substring replacement on those tokens, so the file is
//! never re-parsed.

use tracing::warn;

use super::types::{FileImports, FileKind};

/// Reserved token for the consolidated import block
pub const IMPORTS_PLACEHOLDER: &str = "/*--CHUNKWEAVE-IMPORTS--*/";

const CHUNK_PREFIX: &str = "/*--CHUNK::";
const CHUNK_SUFFIX: &str = "--*/";

/// Token marking where the code of chunk `id` goes
pub fn chunk_placeholder(id: &str) -> String {
    format!("{}{}{}", CHUNK_PREFIX, id, CHUNK_SUFFIX)
}

/// Skeleton content for a file whose leaves are already in dependency order
pub fn scaffold_content(kind: FileKind, sorted_ids: &[String]) -> String {
    let mut content = String::new();
    if kind.carries_imports() {
        content.push_str(IMPORTS_PLACEHOLDER);
        content.push('\n');
    }
    let tokens: Vec<String> = sorted_ids.iter().map(|id| chunk_placeholder(id)).collect();
    content.push_str(&tokens.join("\n"));
    content
}

/// Replace the placeholder of chunk `id` with `code`.
///
/// Returns `None` when the token is absent, so the caller can skip the write
/// instead of corrupting the file.
pub fn replace_placeholder(content: &str, id: &str, code: &str) -> Option<String> {
    let token = chunk_placeholder(id);
    if !content.contains(&token) {
        return None;
    }
    Some(content.replacen(&token, code, 1))
}

/// Ids of chunk placeholders still present in `content`
pub fn remaining_placeholders(content: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(CHUNK_PREFIX) {
        let after = &rest[start + CHUNK_PREFIX.len()..];
        match after.find(CHUNK_SUFFIX) {
            Some(end) => {
                ids.push(after[..end].to_string());
                rest = &after[end + CHUNK_SUFFIX.len()..];
            }
            None => break,
        }
    }
    ids
}

/// Render recorded imports as declarations, one per module.
///
/// Modules and specifiers come out sorted. A specifier `default as X` is the
/// default import and is placed first. A module gets at most one default
/// import; extra ones are logged and left out. Modules with no specifiers are
/// dropped.
pub fn render_imports(imports: &FileImports) -> String {
    let mut lines = Vec::new();

    for (module, specifiers) in imports {
        if specifiers.is_empty() {
            continue;
        }

        let defaults: Vec<&str> = specifiers
            .iter()
            .filter_map(|s| s.strip_prefix("default as ").map(str::trim))
            .collect();
        let default_import = defaults.first().copied();
        if defaults.len() > 1 {
            warn!(
                module = %module,
                kept = defaults[0],
                dropped = ?&defaults[1..],
                "multiple default imports requested, keeping the first"
            );
        }
        let named: Vec<&str> = specifiers
            .iter()
            .filter(|s| !s.starts_with("default as "))
            .map(String::as_str)
            .collect();

        let mut clause = String::new();
        if let Some(default_name) = default_import {
            clause.push_str(default_name);
            if !named.is_empty() {
                clause.push_str(", ");
            }
        }
        if !named.is_empty() {
            clause.push_str(&format!("{{ {} }}", named.join(", ")));
        }

        lines.push(format!("import {} from '{}';", clause, module));
    }

    lines.join("\n")
}

/// Substitute the import placeholder with the rendered block, or remove the
/// placeholder line when there is nothing to import.
///
/// Returns `None` when no placeholder is present (already assembled).
pub fn apply_imports(content: &str, imports: Option<&FileImports>) -> Option<String> {
    if !content.contains(IMPORTS_PLACEHOLDER) {
        return None;
    }

    let block = imports.map(render_imports).unwrap_or_default();
    if !block.is_empty() {
        return Some(content.replacen(IMPORTS_PLACEHOLDER, &block, 1));
    }

    let with_newline = format!("{}\n", IMPORTS_PLACEHOLDER);
    if content.contains(&with_newline) {
        Some(content.replacen(&with_newline, "", 1))
    } else {
        Some(content.replacen(IMPORTS_PLACEHOLDER, "", 1))
    }
}

/// Remove a leading ```lang line and a trailing ``` from generator output.
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let rest =
            rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || "-_+#.".contains(c));
        let rest = rest.trim_start_matches([' ', '\t']);
        body = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
    }

    let trimmed = body.trim_end();
    match trimmed.strip_suffix("```") {
        Some(rest) => rest.trim_end().to_string(),
        None => trimmed.to_string(),
    }
}
