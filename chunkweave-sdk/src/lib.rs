//! Progress events and console output for chunkweave pipelines.
//!
//! Two channels live here:
//!
//! - [`PipelineEvent`] is the machine-readable channel. Each event is written
//!   to stderr as a single `__CW_EVENT__:{json}` line so a supervising process
//!   can follow a run phase by phase and chunk by chunk. Emission is off until
//!   [`set_events_enabled`] turns it on.
//! - The console macros (`log_info!`, `log_progress!`, ...) print colored,
//!   human-readable lines for the command-line front end.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Line prefix a supervisor can split on.
pub const EVENT_PREFIX: &str = "__CW_EVENT__:";

static EVENTS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn structured event emission on or off for the whole process.
pub fn set_events_enabled(enabled: bool) {
    EVENTS_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether [`PipelineEvent::emit`] currently writes anything.
pub fn events_enabled() -> bool {
    EVENTS_ENABLED.load(Ordering::Relaxed)
}

/// Which submission of a file a [`PipelineEvent::FileSubmitted`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStage {
    /// Imports consolidated, placeholders gone
    Assembled,
    /// Rewritten by the correction pass
    Corrected,
}

impl std::fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitStage::Assembled => write!(f, "assembled"),
            SubmitStage::Corrected => write!(f, "corrected"),
        }
    }
}

/// Structured progress events emitted by a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Phase started
    PhaseStarted {
        phase: usize,
        name: String,
        total_phases: usize,
    },
    /// Phase completed
    PhaseCompleted { phase: usize, name: String },
    /// Phase failed
    PhaseFailed {
        phase: usize,
        name: String,
        error: String,
    },
    /// Leaf chunk generation started
    ChunkStarted {
        chunk_id: String,
        file: String,
        index: usize,
        total: usize,
    },
    /// Leaf chunk generated and inserted
    ChunkCompleted { chunk_id: String, file: String },
    /// Leaf chunk could not be inserted or generated
    ChunkFailed { chunk_id: String, error: String },
    /// One attempt of a retried call was rejected
    AttemptFailed {
        target: String,
        attempt: u32,
        error: String,
    },
    /// A call to the generation capability is about to be made
    GeneratorCall { target: String, agent: String },
    /// A finished file was handed to the submit hook
    FileSubmitted { path: String, stage: SubmitStage },
    /// The generation state was flushed to disk
    StateSaved { path: String, phase: String },
}

impl PipelineEvent {
    /// Emit this event to stderr, if events are enabled
    pub fn emit(&self) {
        if !events_enabled() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse one stderr line back into an event
    pub fn parse_line(line: &str) -> Option<Self> {
        let json = line.trim_end().strip_prefix(EVENT_PREFIX)?;
        serde_json::from_str(json).ok()
    }
}

#[macro_export]
macro_rules! log_phase_start {
    ($phase:expr, $name:expr, $total:expr) => {
        $crate::PipelineEvent::PhaseStarted {
            phase: $phase,
            name: $name.to_string(),
            total_phases: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_complete {
    ($phase:expr, $name:expr) => {
        $crate::PipelineEvent::PhaseCompleted {
            phase: $phase,
            name: $name.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_phase_failed {
    ($phase:expr, $name:expr, $error:expr) => {
        $crate::PipelineEvent::PhaseFailed {
            phase: $phase,
            name: $name.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_chunk_start {
    ($chunk_id:expr, $file:expr, $index:expr, $total:expr) => {
        $crate::PipelineEvent::ChunkStarted {
            chunk_id: $chunk_id.to_string(),
            file: $file.to_string(),
            index: $index,
            total: $total,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_chunk_complete {
    ($chunk_id:expr, $file:expr) => {
        $crate::PipelineEvent::ChunkCompleted {
            chunk_id: $chunk_id.to_string(),
            file: $file.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_chunk_failed {
    ($chunk_id:expr, $error:expr) => {
        $crate::PipelineEvent::ChunkFailed {
            chunk_id: $chunk_id.to_string(),
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_attempt_failed {
    ($target:expr, $attempt:expr, $error:expr) => {
        $crate::PipelineEvent::AttemptFailed {
            target: $target.to_string(),
            attempt: $attempt,
            error: $error.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_generator_call {
    ($target:expr, $agent:expr) => {
        $crate::PipelineEvent::GeneratorCall {
            target: $target.to_string(),
            agent: $agent.to_string(),
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_file_submitted {
    ($path:expr, $stage:expr) => {
        $crate::PipelineEvent::FileSubmitted {
            path: $path.to_string(),
            stage: $stage,
        }
        .emit();
    };
}

#[macro_export]
macro_rules! log_state_saved {
    ($path:expr, $phase:expr) => {
        $crate::PipelineEvent::StateSaved {
            path: $path.to_string(),
            phase: $phase.to_string(),
        }
        .emit();
    };
}

// ============================================================================
// Console Logging Macros
// ============================================================================

/// Logs the start of a pipeline phase with a header and description.
///
/// Outputs:
/// ```text
/// ═══ PHASE 1: Architect ═══
/// Plan files and top-level chunks
/// ```
#[macro_export]
macro_rules! log_phase_start_console {
    ($phase:expr, $title:expr, $description:expr) => {
        println!("\x1b[1;36m═══ PHASE {}: {} ═══\x1b[0m", $phase, $title);
        println!("\x1b[36m{}\x1b[0m", $description);
    };
}

/// Logs the completion of a pipeline phase.
#[macro_export]
macro_rules! log_phase_complete_console {
    ($phase:expr) => {
        println!("\x1b[32m✓ Phase {} complete\x1b[0m", $phase);
    };
}

/// Logs progress of an operation, e.g. `Progress: 3/5 chunks`.
#[macro_export]
macro_rules! log_progress {
    ($current:expr, $total:expr, $item_type:expr) => {
        println!(
            "\x1b[36mProgress: {}/{} {}\x1b[0m",
            $current, $total, $item_type
        );
    };
}

/// Logs an informational message.
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs that a file has been saved.
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}
