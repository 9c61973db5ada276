//! Listing of an existing output directory, used as Architect context.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    ".next",
    ".git",
    "coverage",
    "target",
    ".chunkweave",
];

const IGNORED_EXTENSIONS: &[&str] = &["log", "lock", "svg", "png", "jpg", "jpeg", "gif", "env"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::File => write!(f, "file"),
            NodeType::Directory => write!(f, "directory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    /// Relative to the scanned root, forward slashes; empty for the root
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DirectoryNode>,
}

/// Scan `root` recursively. Unreadable entries are skipped.
pub fn scan_directory(root: &Path) -> io::Result<DirectoryNode> {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());

    Ok(DirectoryNode {
        name,
        path: String::new(),
        node_type: NodeType::Directory,
        children: scan_children(root, "")?,
    })
}

fn scan_children(dir: &Path, prefix: &str) -> io::Result<Vec<DirectoryNode>> {
    let mut children = Vec::new();

    for entry in fs::read_dir(dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", prefix, name)
        };

        if file_type.is_dir() {
            if IGNORED_DIRS.contains(&name.as_str()) {
                continue;
            }
            let nested = scan_children(&entry.path(), &rel).unwrap_or_default();
            children.push(DirectoryNode {
                name,
                path: rel,
                node_type: NodeType::Directory,
                children: nested,
            });
        } else if file_type.is_file() {
            if is_ignored_file(&name) {
                continue;
            }
            children.push(DirectoryNode {
                name,
                path: rel,
                node_type: NodeType::File,
                children: Vec::new(),
            });
        }
    }

    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}

fn is_ignored_file(name: &str) -> bool {
    // `.env` has no stem, so match it by name too
    if name == ".env" {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IGNORED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Render as `- name (type)` lines, two spaces of indent per depth
pub fn format_directory(node: &DirectoryNode) -> String {
    let mut out = String::new();
    format_into(node, 0, &mut out);
    out
}

fn format_into(node: &DirectoryNode, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("- {} ({})\n", node.name, node.node_type));
    for child in &node.children {
        format_into(child, depth + 1, out);
    }
}
