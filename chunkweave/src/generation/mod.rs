//! The generation capability the pipeline calls out to.
//!
//! The pipeline only sees the [`Generator`] trait. [`ClaudeGenerator`] is the
//! production backend; tests drive the pipeline with scripted fakes.

pub mod claude;
pub mod extract;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use claude::ClaudeGenerator;
pub use extract::{decode_structured, extract_fenced_block, extract_json_value};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generation backend error: {0}")]
    Backend(String),

    #[error("generator returned an empty response")]
    EmptyResponse,

    #[error("generator call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// One call: system instruction, user instruction and sampling temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A named, schema-described shape the response must take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputContract {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

impl OutputContract {
    /// Contract whose schema is derived from `T`
    pub fn for_type<T: JsonSchema>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .unwrap_or(serde_json::Value::Null);
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// Replace one top-level property of the schema, e.g. a caller's params schema
    pub fn with_property(mut self, property: &str, schema: serde_json::Value) -> Self {
        if let Some(props) = self
            .schema
            .get_mut("properties")
            .and_then(|p| p.as_object_mut())
        {
            props.insert(property.to_string(), schema);
        }
        self
    }
}

/// Outcome of a structured call.
///
/// `value` is `Some` only when the backend honored the contract; `raw` always
/// holds the text the backend produced so callers can fall back or echo it.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponse {
    pub value: Option<serde_json::Value>,
    pub raw: String,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Short label for logs and progress events
    fn name(&self) -> &str {
        "generator"
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
        contract: &OutputContract,
    ) -> Result<StructuredResponse, GeneratorError>;
}

/// Run `fut` under an optional deadline
pub async fn with_timeout<F, T>(deadline: Option<Duration>, fut: F) -> Result<T, GeneratorError>
where
    F: std::future::Future<Output = Result<T, GeneratorError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(GeneratorError::Timeout {
                secs: limit.as_secs(),
            }),
        },
        None => fut.await,
    }
}
