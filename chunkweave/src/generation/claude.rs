//! Generator backed by the Claude agent SDK.
//!
//! Structured calls append the contract (name, description and JSON schema) to
//! the prompt and ask for a single fenced json block, which is then recovered
//! with [`extract_json_value`]. The backend exposes no sampling temperature,
//! so `GenerationRequest::temperature` is ignored here.

use async_trait::async_trait;
use claude_agent_sdk::{query, ClaudeAgentOptions, ContentBlock, Message};
use futures::{Stream, StreamExt};
use tracing::debug;

use super::{
    extract_json_value, GenerationRequest, Generator, GeneratorError, OutputContract,
    StructuredResponse,
};

/// Configuration for the Claude backend
#[derive(Debug, Clone)]
pub struct ClaudeGenerator {
    /// Label used in logs and progress events
    label: String,
    /// Turn limit per call; generation needs no tool round-trips
    max_turns: u32,
}

impl Default for ClaudeGenerator {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl ClaudeGenerator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            max_turns: 1,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    fn options(&self, system: &str) -> ClaudeAgentOptions {
        ClaudeAgentOptions::builder()
            .system_prompt(system.to_string())
            .max_turns(self.max_turns)
            .allowed_tools(Vec::<String>::new())
            .permission_mode(claude_agent_sdk::PermissionMode::BypassPermissions)
            .build()
    }

    async fn run(&self, system: &str, prompt: &str) -> Result<String, GeneratorError> {
        debug!(generator = %self.label, prompt_len = prompt.len(), "querying backend");

        let stream = query(prompt, Some(self.options(system)))
            .await
            .map_err(|e| GeneratorError::Backend(e.to_string()))?;

        let text = collect_text(stream).await?;
        if text.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }

        debug!(generator = %self.label, response_len = text.len(), "backend responded");
        Ok(text)
    }
}

/// Contract instructions appended to a structured prompt
fn contract_section(contract: &OutputContract) -> String {
    let schema = serde_json::to_string_pretty(&contract.schema).unwrap_or_default();
    format!(
        r#"

# Response contract: `{name}`
{description}

Respond with exactly one ```json fenced block containing a single JSON object that validates against this schema. Do not add any other text.

```json
{schema}
```"#,
        name = contract.name,
        description = contract.description,
        schema = schema,
    )
}

/// Collect every assistant text block until the result message
async fn collect_text(
    stream: impl Stream<Item = claude_agent_sdk::error::Result<Message>>,
) -> Result<String, GeneratorError> {
    let mut response_text = String::new();
    let mut stream = Box::pin(stream);

    while let Some(message) = stream.next().await {
        match message.map_err(|e| GeneratorError::Backend(e.to_string()))? {
            Message::Assistant { message, .. } => {
                for block in &message.content {
                    if let ContentBlock::Text { text } = block {
                        response_text.push_str(text);
                    }
                }
            }
            Message::Result { is_error, .. } => {
                if is_error && response_text.is_empty() {
                    return Err(GeneratorError::Backend(
                        "backend reported an error result".to_string(),
                    ));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(response_text)
}

#[async_trait]
impl Generator for ClaudeGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        self.run(&request.system, &request.prompt).await
    }

    async fn generate_structured(
        &self,
        request: &GenerationRequest,
        contract: &OutputContract,
    ) -> Result<StructuredResponse, GeneratorError> {
        let prompt = format!("{}{}", request.prompt, contract_section(contract));
        let raw = self.run(&request.system, &prompt).await?;
        Ok(StructuredResponse {
            value: extract_json_value(&raw),
            raw,
        })
    }
}
