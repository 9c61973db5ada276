//! Bounded retry with echoed error context.
//!
//! [`RetryState`] is the `(attempt, last_error, last_response)` machine shared
//! by the Planner and the Developer. Each failed attempt records the error and
//! the raw response; the next prompt gets both appended so the generator can
//! correct itself.

use super::error::PipelineError;

#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    last_error: Option<String>,
    last_response: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
            last_response: None,
        }
    }

    /// Start the next attempt. Returns its 1-based number, or `None` once
    /// every attempt has been used.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn record_failure(&mut self, error: impl Into<String>, raw_response: Option<String>) {
        self.last_error = Some(error.into());
        self.last_response = raw_response;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `prompt` with the previous failure appended, if there was one
    pub fn decorate(&self, prompt: &str, contract_name: &str) -> String {
        let Some(error) = &self.last_error else {
            return prompt.to_string();
        };

        let response = match self.last_response.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => "No response text.",
        };

        format!(
            "{prompt}\n\n---\nATTEMPT {n} FAILED. Your previous response was invalid.\n\
             Error: {error}\nYour Invalid Response:\n```\n{response}\n```\n\
             Please correct your response. It MUST be a single `{contract_name}` submission.",
            n = self.attempt.saturating_sub(1).max(1),
        )
    }

    /// Convert an exhausted loop into the phase-labelled fatal error
    pub fn into_error(self, phase: &'static str, target: impl Into<String>) -> PipelineError {
        PipelineError::RetriesExhausted {
            phase,
            target: target.into(),
            attempts: self.attempt,
            message: self
                .last_error
                .unwrap_or_else(|| "no attempt was made".to_string()),
            last_response: self.last_response,
        }
    }
}
