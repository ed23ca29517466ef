//! Ollama provider backed by the `/api/generate` endpoint.
//!
//! API reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Body of a single non-streamed generation.
#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: SamplingOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    #[serde(default = "reply_done")]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

fn reply_done() -> bool {
    true
}

impl From<GenerateReply> for LlmResponse {
    fn from(reply: GenerateReply) -> Self {
        LlmResponse {
            usage: LlmUsage::new(
                reply.prompt_eval_count.unwrap_or(0),
                reply.eval_count.unwrap_or(0),
            ),
            content: reply.response,
            model: reply.model,
            done: reply.done,
        }
    }
}

/// Client for a local or remote Ollama runtime.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Requests give up after `timeout_secs`; the orchestrator applies its
    /// own per-capability deadline on top of this.
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn body<'a>(request: &'a LlmRequest) -> GenerateBody<'a> {
        GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            format: request.json_mode.then_some("json"),
            options: SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = self.generate_url();
        tracing::debug!(
            model = %request.model,
            json = request.json_mode,
            prompt_chars = request.prompt.len(),
            "Ollama generate"
        );

        let response = self
            .http
            .post(&url)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AppError::Llm(format!("Ollama is not reachable at {}: {}", self.base_url, e))
                } else {
                    AppError::Llm(format!("Ollama request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, detail)));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Unreadable Ollama reply: {}", e)))?;

        if !reply.done {
            tracing::warn!(model = %reply.model, "Ollama reply was cut short");
        }
        let reply = LlmResponse::from(reply);
        tracing::debug!(
            completion_tokens = reply.usage.completion_tokens,
            "Ollama generate finished"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/");
        assert_eq!(client.generate_url(), "http://gpu-box:11434/api/generate");
    }

    #[test]
    fn test_routing_request_body() {
        let request = LlmRequest::new("pick tools", "llama3.2")
            .with_system("You are a router")
            .with_temperature(0.0)
            .with_max_tokens(256)
            .with_json_mode();

        let body = serde_json::to_value(OllamaClient::body(&request)).unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["system"], "You are a router");
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["num_predict"], 256);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_plain_request_omits_optional_fields() {
        let request = LlmRequest::new("summarise", "llama3.2");
        let body = serde_json::to_value(OllamaClient::body(&request)).unwrap();
        assert!(body.get("system").is_none());
        assert!(body.get("format").is_none());
        assert!(body["options"].get("temperature").is_none());
    }

    #[test]
    fn test_reply_conversion_totals_usage() {
        let reply: GenerateReply = serde_json::from_str(
            r#"{"model":"llama3.2","response":"{\"type\":\"final\"}","prompt_eval_count":40,"eval_count":8}"#,
        )
        .unwrap();
        let response = LlmResponse::from(reply);
        assert!(response.done);
        assert_eq!(response.usage.total_tokens, 48);
        assert_eq!(response.content, r#"{"type":"final"}"#);
    }
}
