//! Dependency ordering of leaf chunks.
//!
//! Depth-first visit with an on-stack list and a resolved set. Revisiting a
//! node that is still on the stack is a cycle and fails the sort. A dependency
//! that is not among the supplied nodes (cross-file or dangling) is logged and
//! skipped. Roots are visited in input order so equal inputs sort equally.

use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::error::PipelineError;
use super::types::ChunkNode;

/// Order `nodes` so every dependency precedes its dependents.
pub fn topological_sort(nodes: &[&ChunkNode]) -> Result<Vec<String>, PipelineError> {
    let index: HashMap<&str, &ChunkNode> = nodes.iter().map(|n| (n.id.as_str(), *n)).collect();

    let mut sorter = Sorter {
        index,
        resolved: HashSet::new(),
        stack: Vec::new(),
        order: Vec::with_capacity(nodes.len()),
    };

    for node in nodes {
        sorter.visit(node.id.as_str())?;
    }

    Ok(sorter.order)
}

struct Sorter<'a> {
    index: HashMap<&'a str, &'a ChunkNode>,
    resolved: HashSet<&'a str>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Sorter<'a> {
    fn visit(&mut self, id: &'a str) -> Result<(), PipelineError> {
        if self.resolved.contains(id) {
            return Ok(());
        }

        if let Some(pos) = self.stack.iter().position(|s| *s == id) {
            let mut cycle: Vec<String> = self.stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Err(PipelineError::CircularDependency { cycle });
        }

        let node: &'a ChunkNode = match self.index.get(id) {
            Some(node) => *node,
            None => return Ok(()),
        };

        self.stack.push(id);
        for dep in &node.dependencies {
            if !self.index.contains_key(dep.as_str()) {
                warn!(chunk_id = id, dependency = %dep, "unknown dependency, skipping");
                continue;
            }
            self.visit(dep.as_str())?;
        }
        self.stack.pop();

        self.resolved.insert(id);
        self.order.push(id.to_string());
        Ok(())
    }
}
