//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{ollama::OllamaProvider, trigram::TrigramProvider};
use advisor_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Embedding is idempotent, so implementations may retry transient failures.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// HTTP providers are probed once so that a missing model is reported at
/// startup rather than on the first ingestion.
pub async fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(config.dimensions))),

        "ollama" => {
            let provider = OllamaProvider::new(config)?;
            provider.verify_connection().await?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Knowledge(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_trigram_provider() {
        let config = EmbeddingConfig::default();

        let provider = create_provider(&config).await.unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[tokio::test]
    async fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };

        let err = create_provider(&config).await.unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::default()).await.unwrap();

        let embedding = provider.embed("penalty for early withdrawal").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
