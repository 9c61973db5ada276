//! Main orchestration of the six phases.
//!
//! A run moves strictly through Architect, Planner, Scaffolder, Developer,
//! Assembler and Corrector. The state document is flushed after every phase,
//! and [`Pipeline::resume`] continues from the phase after the last one
//! recorded in it.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::hooks::{NoopHooks, PipelineHooks};
use super::phase1_architect::architect_plan;
use super::phase2_plan::decompose_plan;
use super::phase3_scaffold::scaffold_files;
use super::phase4_develop::develop_chunks;
use super::phase5_assemble::assemble_files;
use super::phase6_correct::correct_files;
use super::state::StateStore;
use super::types::{GenerationState, PipelinePhase};
use crate::generation::Generator;
use chunkweave_sdk::{log_phase_complete, log_phase_failed, log_phase_start};

pub const TOTAL_PHASES: usize = 6;

pub const PHASE_NAMES: [&str; TOTAL_PHASES] = [
    "Architect",
    "Planner",
    "Scaffolder",
    "Developer",
    "Assembler",
    "Corrector",
];

pub struct Pipeline {
    generator: Arc<dyn Generator>,
    planning_generator: Option<Arc<dyn Generator>>,
    hooks: Arc<dyn PipelineHooks>,
    config: PipelineConfig,
    store: StateStore,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn Generator>, config: PipelineConfig) -> Self {
        let store = StateStore::new(config.state_path());
        Self {
            generator,
            planning_generator: None,
            hooks: Arc::new(NoopHooks),
            config,
            store,
        }
    }

    /// Use a separate generator for Architect, Planner and Corrector
    pub fn with_planning_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.planning_generator = Some(generator);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PipelineHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state_store(&self) -> &StateStore {
        &self.store
    }

    fn planner(&self) -> &dyn Generator {
        self.planning_generator
            .as_deref()
            .unwrap_or(self.generator.as_ref())
    }

    /// Start a fresh run from an instruction
    pub async fn run(&self, instruction: &str) -> Result<GenerationState, PipelineError> {
        self.config.validate()?;

        self.phase_started(1);
        let result = architect_plan(self.planner(), &self.config, instruction).await;
        let mut state = self.phase_finished(1, result)?;
        self.store.save(&mut state).await?;
        info!(run_id = %state.run_id, state = %self.store.path().display(), "run started");

        self.resume(state).await
    }

    /// Continue from the state document on disk
    pub async fn resume_from_disk(&self) -> Result<GenerationState, PipelineError> {
        let state = self.store.load().await?;
        info!(run_id = %state.run_id, phase = %state.phase, "resuming run");
        self.resume(state).await
    }

    /// Continue from the phase after `state.phase`
    pub async fn resume(
        &self,
        mut state: GenerationState,
    ) -> Result<GenerationState, PipelineError> {
        self.config.validate()?;

        if state.phase < PipelinePhase::Planned {
            self.phase_started(2);
            let result =
                decompose_plan(self.planner(), &self.config, &mut state, &self.store).await;
            self.phase_finished(2, result)?;
            self.advance(&mut state, PipelinePhase::Planned).await?;
        }

        if state.phase < PipelinePhase::Scaffolded {
            self.phase_started(3);
            let result = scaffold_files(&state, &self.config.output_dir).await;
            self.phase_finished(3, result)?;
            self.advance(&mut state, PipelinePhase::Scaffolded).await?;
        }

        if state.phase < PipelinePhase::Developed {
            self.phase_started(4);
            let result = develop_chunks(
                self.generator.as_ref(),
                self.hooks.as_ref(),
                &self.config,
                &mut state,
                &self.store,
            )
            .await;
            self.phase_finished(4, result)?;
            self.advance(&mut state, PipelinePhase::Developed).await?;
        }

        if state.phase < PipelinePhase::Assembled {
            self.phase_started(5);
            let result = assemble_files(self.hooks.as_ref(), &self.config, &state).await;
            self.phase_finished(5, result)?;
            self.advance(&mut state, PipelinePhase::Assembled).await?;
        }

        if state.phase < PipelinePhase::Corrected && self.config.correct {
            self.phase_started(6);
            let corrected =
                correct_files(self.planner(), self.hooks.as_ref(), &self.config, &state).await;
            info!(corrected, files = state.plan.files.len(), "correction pass finished");
            self.phase_finished(6, Ok(()))?;
            self.advance(&mut state, PipelinePhase::Corrected).await?;
        }

        let failed = state.failed_leaves();
        if failed.is_empty() {
            info!(run_id = %state.run_id, "all files generated");
        } else {
            warn!(
                count = failed.len(),
                chunks = ?failed,
                "some chunks were left for manual inspection"
            );
        }

        Ok(state)
    }

    fn phase_started(&self, phase: usize) {
        let name = phase_name(phase);
        info!(phase, name, "phase started");
        log_phase_start!(phase, name, TOTAL_PHASES);
        self.hooks.on_phase_start(phase, name);
    }

    fn phase_finished<T>(
        &self,
        phase: usize,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let name = phase_name(phase);
        match &result {
            Ok(_) => {
                info!(phase, name, "phase complete");
                log_phase_complete!(phase, name);
                self.hooks.on_phase_complete(phase, name);
            }
            Err(e) => {
                error!(phase, name, error = %e, "phase failed");
                log_phase_failed!(phase, name, e);
            }
        }
        result
    }

    async fn advance(
        &self,
        state: &mut GenerationState,
        phase: PipelinePhase,
    ) -> Result<(), PipelineError> {
        state.phase = phase;
        self.store.save(state).await
    }
}

fn phase_name(phase: usize) -> &'static str {
    PHASE_NAMES.get(phase.wrapping_sub(1)).copied().unwrap_or("Unknown")
}
