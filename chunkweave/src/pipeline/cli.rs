//! CLI argument definitions for the chunkweave binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::config::PipelineConfig;

/// Dependency-ordered chunked code generation
///
/// Plans the requested files, decomposes them into atomic chunks, generates
/// each chunk in dependency order and assembles the finished files:
///
/// - Phase 1: Architect
/// - Phase 2: Planner
/// - Phase 3: Scaffolder
/// - Phase 4: Developer
/// - Phase 5: Assembler
/// - Phase 6: Corrector
#[derive(Parser, Debug, Clone)]
#[command(name = "chunkweave")]
#[command(about = "Dependency-ordered chunked code generation")]
#[command(version)]
pub struct Args {
    /// What to generate (literal text or a path to a file)
    #[arg(short, long, value_name = "TEXT|PATH", required_unless_present = "resume")]
    pub instruction: Option<String>,

    /// Context passed to the Architect (literal text or a path to a file)
    #[arg(long, value_name = "TEXT|PATH")]
    pub system_prompt: Option<String>,

    /// Output root for generated files
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// State document (default: <dir>/.chunkweave/state.json)
    #[arg(long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// YAML configuration file; flags override its values
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Attempts per decomposition and per chunk
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Deadline for a single generator call, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Skip the correction pass
    #[arg(long)]
    pub no_correct: bool,

    /// Include a listing of the output directory in the Architect prompt
    #[arg(long)]
    pub scan: bool,

    /// Continue from the state document instead of starting over
    #[arg(long, conflicts_with = "clean")]
    pub resume: bool,

    /// Delete the .chunkweave work directory before a fresh run
    #[arg(long)]
    pub clean: bool,

    /// Append logs to this file (ANSI-free)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit structured progress events on stderr
    #[arg(long)]
    pub events: bool,
}

impl Args {
    /// Load the base config (from `--config` if given) and apply flag overrides
    pub async fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.dir {
            config.output_dir = dir.clone();
        }
        if let Some(state) = &self.state {
            config.state_path = Some(state.clone());
        }
        if let Some(system_prompt) = &self.system_prompt {
            config.system_prompt = load_prompt_file(system_prompt).await?;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(secs) = self.timeout_secs {
            config.call_timeout_secs = Some(secs);
        }
        if self.no_correct {
            config.correct = false;
        }
        if self.scan {
            config.scan_existing = true;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        config.verbose |= self.verbose;
        config.emit_events |= self.events;

        config.validate()?;
        Ok(config)
    }

    pub async fn instruction_text(&self) -> Result<Option<String>> {
        match &self.instruction {
            Some(instruction) => Ok(Some(load_prompt_file(instruction).await?)),
            None => Ok(None),
        }
    }
}

/// Read `value` as a file if such a file exists, otherwise use it verbatim
pub async fn load_prompt_file(value: &str) -> Result<String> {
    let path = Path::new(value);
    if path.exists() && path.is_file() {
        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file: {}", value))
    } else {
        Ok(value.to_string())
    }
}
