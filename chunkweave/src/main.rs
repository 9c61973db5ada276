use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use chunkweave::generation::{ClaudeGenerator, Generator};
use chunkweave::logging::init_logging;
use chunkweave::pipeline::cli::Args;
use chunkweave::pipeline::{
    ChunkProgress, FileTarget, HookError, Pipeline, PipelineHooks, SubmitStage,
};
use chunkweave_sdk::{
    log_file_saved, log_info, log_phase_complete_console, log_phase_start_console, log_progress,
    log_warning, set_events_enabled,
};

/// Exit code when the run finished but some chunks could not be placed
const EXIT_INCOMPLETE: i32 = 2;

/// Console progress for interactive runs
struct CliHooks;

fn phase_description(phase: usize) -> &'static str {
    match phase {
        1 => "Plan files and top-level chunks",
        2 => "Decompose chunks into atomic leaves",
        3 => "Write placeholder skeletons",
        4 => "Generate leaves in dependency order",
        5 => "Consolidate imports and finalize files",
        6 => "Best-effort correction of each file",
        _ => "",
    }
}

#[async_trait]
impl PipelineHooks for CliHooks {
    fn on_phase_start(&self, phase: usize, name: &str) {
        log_phase_start_console!(phase, name, phase_description(phase));
    }

    fn on_phase_complete(&self, phase: usize, _name: &str) {
        log_phase_complete_console!(phase);
    }

    async fn on_file_submit(
        &self,
        _file: &FileTarget,
        path: &Path,
        _content: &str,
        stage: SubmitStage,
    ) -> Result<(), HookError> {
        log_file_saved!(format!("{} ({})", path.display(), stage));
        Ok(())
    }

    async fn on_chunk(&self, progress: &ChunkProgress<'_>) -> Result<(), HookError> {
        log_progress!(
            progress.current,
            progress.total,
            format!("chunks ({} in {})", progress.chunk.id, progress.file.relative_path())
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = args.to_config().await?;
    init_logging(config.verbose, config.log_file.as_deref())?;
    set_events_enabled(config.emit_events);

    if args.clean {
        let work_dir = config.work_dir();
        if work_dir.exists() {
            tokio::fs::remove_dir_all(&work_dir)
                .await
                .with_context(|| format!("Failed to remove {}", work_dir.display()))?;
            log_info!("Removed {}", work_dir.display());
        }
    }

    let generator: Arc<dyn Generator> = Arc::new(ClaudeGenerator::new("developer"));
    let planner: Arc<dyn Generator> = Arc::new(ClaudeGenerator::new("planner"));
    let pipeline = Pipeline::new(generator, config)
        .with_planning_generator(planner)
        .with_hooks(Arc::new(CliHooks));
    let state_path = pipeline.state_store().path().to_path_buf();

    let result = if args.resume {
        pipeline.resume_from_disk().await
    } else {
        let Some(instruction) = args.instruction_text().await? else {
            bail!("--instruction is required unless --resume is given");
        };
        pipeline.run(&instruction).await
    };

    let state = match result {
        Ok(state) => state,
        Err(e) => {
            log_warning!("Run stopped. Resume with --resume (state: {})", state_path.display());
            return Err(e.into());
        }
    };

    let failed = state.failed_leaves();
    if !failed.is_empty() {
        log_warning!(
            "{} chunk(s) could not be placed: {}",
            failed.len(),
            failed.join(", ")
        );
        std::process::exit(EXIT_INCOMPLETE);
    }

    log_info!(
        "Done. {} file(s) in {}",
        state.plan.files.len(),
        pipeline.config().output_dir.display()
    );
    Ok(())
}
