//! Error types for the pipeline

use std::path::PathBuf;
use thiserror::Error;

use crate::generation::GeneratorError;

/// Error type returned by caller hooks
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Phase label used by the Corrector; errors carrying it never abort a run
pub const CORRECTOR_PHASE: &str = "corrector";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("{phase} failed for {target} after {attempts} attempts: {message}")]
    RetriesExhausted {
        phase: &'static str,
        target: String,
        attempts: u32,
        message: String,
        last_response: Option<String>,
    },

    #[error("{phase} generation call failed for {target}: {source}")]
    Generation {
        phase: &'static str,
        target: String,
        #[source]
        source: GeneratorError,
    },

    #[error("{phase} returned an unusable response for {target}: {message}")]
    InvalidResponse {
        phase: &'static str,
        target: String,
        message: String,
        last_response: String,
    },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state document error: {0}")]
    State(#[from] serde_json::Error),

    #[error("{hook} hook failed during {phase}: {source}")]
    Hook {
        hook: &'static str,
        phase: &'static str,
        #[source]
        source: HookError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the run. Corrector failures never do.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Generation { phase, .. }
            | PipelineError::InvalidResponse { phase, .. }
            | PipelineError::RetriesExhausted { phase, .. }
            | PipelineError::Hook { phase, .. } => *phase != CORRECTOR_PHASE,
            _ => true,
        }
    }

    /// The raw generator output behind this error, when there was one
    pub fn last_response(&self) -> Option<&str> {
        match self {
            PipelineError::RetriesExhausted { last_response, .. } => last_response.as_deref(),
            PipelineError::InvalidResponse { last_response, .. } => Some(last_response),
            _ => None,
        }
    }
}
