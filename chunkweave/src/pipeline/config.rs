//! Pipeline configuration, loadable from YAML and overridden by CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::PipelineError;

/// Directory under the output root that holds the state document and logs
pub const WORK_DIR: &str = ".chunkweave";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root under which every file target is written
    pub output_dir: PathBuf,

    /// State document; defaults to `<output_dir>/.chunkweave/state.json`
    pub state_path: Option<PathBuf>,

    /// Caller context passed to the Architect alongside the instruction
    pub system_prompt: String,

    /// Attempts per Planner decomposition and per Developer chunk
    pub max_retries: u32,

    pub temperature: f32,

    /// Deadline for a single generator call
    pub call_timeout_secs: Option<u64>,

    /// Run the Corrector after assembly
    pub correct: bool,

    /// Include a listing of `output_dir` in the Architect prompt
    pub scan_existing: bool,

    /// JSON schema of side parameters the Architect should extract
    pub params_schema: Option<serde_json::Value>,

    /// Initial side parameters; extracted ones are merged over these
    pub params: serde_json::Value,

    pub verbose: bool,

    pub log_file: Option<PathBuf>,

    pub emit_events: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            state_path: None,
            system_prompt: String::new(),
            max_retries: 3,
            temperature: 0.0,
            call_timeout_secs: Some(300),
            correct: true,
            scan_existing: false,
            params_schema: None,
            params: serde_json::Value::Object(Default::default()),
            verbose: false,
            log_file: None,
            emit_events: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| {
            PipelineError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_retries == 0 {
            return Err(PipelineError::Config("max_retries must be at least 1".into()));
        }
        if self.call_timeout_secs == Some(0) {
            return Err(PipelineError::Config("call_timeout_secs must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(PipelineError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if let Some(schema) = &self.params_schema {
            if !schema.is_object() {
                return Err(PipelineError::Config("params_schema must be a JSON object".into()));
            }
        }
        Ok(())
    }

    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join(WORK_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| self.work_dir().join("state.json"))
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}
