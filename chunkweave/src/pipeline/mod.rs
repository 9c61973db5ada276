//! Chunked generation pipeline
//!
//! Six phases turn an instruction into finished files:
//!
//! - Phase 1: Architect - files and top-level chunks
//! - Phase 2: Planner - hierarchical decomposition into atomic leaves
//! - Phase 3: Scaffolder - files written as placeholder skeletons
//! - Phase 4: Developer - leaves generated in dependency order and inserted
//! - Phase 5: Assembler - consolidated import blocks
//! - Phase 6: Corrector - best-effort cleanup of each assembled file

pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod phase1_architect;
pub mod phase2_plan;
pub mod phase3_scaffold;
pub mod phase4_develop;
pub mod phase5_assemble;
pub mod phase6_correct;
pub mod placeholder;
pub mod prompts;
pub mod retry;
pub mod state;
pub mod topo;
pub mod types;
pub mod workflow;

pub use config::PipelineConfig;
pub use error::{HookError, PipelineError};
pub use hooks::{ChunkProgress, NoopHooks, PipelineHooks, PromptContext, SubmitStage};
pub use state::StateStore;
pub use types::*;
pub use workflow::Pipeline;
