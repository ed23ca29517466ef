//! LLM client abstraction and request/response types.
//!
//! This module defines the core abstractions for interacting with LLM providers.

use advisor_core::AppResult;
use serde::{Deserialize, Serialize};

/// LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The prompt text to send to the LLM
    pub prompt: String,

    /// Model identifier (e.g., "llama3", "gpt-4")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Ask the provider to constrain output to a JSON document
    #[serde(default)]
    pub json_mode: bool,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system: None,
            json_mode: false,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request a JSON-only reply.
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,

    /// Whether the response was complete
    #[serde(default = "default_true")]
    pub done: bool,
}

fn default_true() -> bool {
    true
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for LLM providers.
///
/// This trait abstracts the underlying LLM provider and provides a unified
/// completion interface. The orchestrator uses it both as the reasoning
/// capability that selects tools and as the backend of the research capability.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("route this", "llama3.2")
            .with_system("You are a router")
            .with_temperature(0.0)
            .with_max_tokens(512)
            .with_json_mode();

        assert_eq!(request.prompt, "route this");
        assert_eq!(request.system.as_deref(), Some("You are a router"));
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(512));
        assert!(request.json_mode);
    }

    #[test]
    fn test_usage_totals() {
        let usage = LlmUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }
}
