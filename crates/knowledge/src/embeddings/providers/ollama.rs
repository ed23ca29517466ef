//! Ollama embedding provider.
//!
//! Produces neural embeddings through Ollama's local `/api/embeddings`
//! endpoint (e.g. `nomic-embed-text`, 768 dimensions). Transient failures
//! (transport errors, 429 and 5xx responses) are retried with exponential
//! backoff; other failures are returned immediately.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use advisor_core::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using the local API.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    max_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// A failed attempt, tagged with whether trying again could help.
#[derive(Debug)]
struct AttemptError {
    retryable: bool,
    error: AppError,
}

impl AttemptError {
    fn transient(error: AppError) -> Self {
        Self {
            retryable: true,
            error,
        }
    }

    fn permanent(error: AppError) -> Self {
        Self {
            retryable: false,
            error,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Knowledge(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Verify that Ollama is reachable and the model yields the configured
    /// number of dimensions.
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn verify_connection(&self) -> AppResult<()> {
        debug!("Verifying Ollama connection at {}", self.base_url);

        self.embed_with_retries("connection check").await.map_err(|e| {
            AppError::Knowledge(format!(
                "Ollama embeddings unavailable at {} ({}). Ensure Ollama is running and run: ollama pull {}",
                self.base_url, e, self.model
            ))
        })?;

        debug!("Ollama model '{}' ready", self.model);
        Ok(())
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 1;

        loop {
            match self.embed_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}): {}; retrying in {}ms",
                        attempt, self.max_attempts, failure.error, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, AttemptError> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AttemptError::transient(AppError::Knowledge(format!(
                    "Failed to send request to Ollama: {}",
                    e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            let error = AppError::Knowledge(format!("Ollama API error ({}): {}", status, message));

            return Err(if is_retryable_status(status) {
                AttemptError::transient(error)
            } else {
                AttemptError::permanent(error)
            });
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AttemptError::permanent(AppError::Knowledge(format!(
                "Failed to parse Ollama response: {}",
                e
            )))
        })?;

        if body.embedding.len() != self.dimensions {
            return Err(AttemptError::permanent(AppError::Knowledge(format!(
                "Dimension mismatch: model '{}' returned {}, expected {}",
                self.model,
                body.embedding.len(),
                self.dimensions
            ))));
        }

        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::Knowledge("Cannot embed empty text".to_string()));
        }

        self.embed_with_retries(text).await
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        // The endpoint takes one prompt per request
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: Some(endpoint.to_string()),
            max_attempts: 2,
        }
    }

    #[test]
    fn test_endpoint_from_config() {
        let provider = OllamaProvider::new(&config("http://gpu-box:11434/")).unwrap();
        assert_eq!(provider.base_url, "http://gpu-box:11434");
        assert_eq!(provider.dimensions(), 768);
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let provider = OllamaProvider::new(&config("http://127.0.0.1:9")).unwrap();
        let err = provider.embed("   ").await.unwrap_err();
        assert!(err.to_string().contains("empty text"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_retries() {
        let provider = OllamaProvider::new(&config("http://127.0.0.1:9")).unwrap();
        let result = provider.embed("pension rules").await;
        assert!(matches!(result, Err(AppError::Knowledge(_))));
    }
}
