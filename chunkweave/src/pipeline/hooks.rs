//! Caller hooks invoked during a run.
//!
//! Every method has a no-op default, so callers implement only what they
//! need. Prompt hooks return `Ok(None)` to keep the built-in prompt.

use async_trait::async_trait;
use std::path::Path;

use super::error::HookError;
use super::types::{ChunkNode, FileTarget};

pub use chunkweave_sdk::SubmitStage;

/// Reported after each leaf chunk is inserted
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress<'a> {
    pub chunk: &'a ChunkNode,
    pub file: &'a FileTarget,
    pub code: &'a str,
    /// 1-based position among all leaves, counting ones finished by earlier runs
    pub current: usize,
    pub total: usize,
}

/// Everything the Developer knows when it builds a chunk prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub params: &'a serde_json::Value,
    pub chunk: &'a ChunkNode,
    pub file: &'a FileTarget,
    /// Already-generated dependency code, in dependency order
    pub dependencies: &'a [(String, String)],
    pub current_content: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
}

#[async_trait]
pub trait PipelineHooks: Send + Sync {
    fn on_phase_start(&self, _phase: usize, _name: &str) {}

    fn on_phase_complete(&self, _phase: usize, _name: &str) {}

    /// A finished file, after assembly and again after a successful correction
    async fn on_file_submit(
        &self,
        _file: &FileTarget,
        _path: &Path,
        _content: &str,
        _stage: SubmitStage,
    ) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_chunk(&self, _progress: &ChunkProgress<'_>) -> Result<(), HookError> {
        Ok(())
    }

    async fn prepare_system_prompt(
        &self,
        _ctx: &PromptContext<'_>,
    ) -> Result<Option<String>, HookError> {
        Ok(None)
    }

    async fn prepare_prompt(&self, _ctx: &PromptContext<'_>) -> Result<Option<String>, HookError> {
        Ok(None)
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PipelineHooks for NoopHooks {}
