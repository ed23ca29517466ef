//! Embedding configuration types.

use serde::{Deserialize, Serialize};

/// Embedding configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Endpoint for HTTP providers; falls back to the provider default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Attempts per text for HTTP providers, including the first
    #[serde(rename = "maxAttempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EmbeddingConfig = serde_yaml::from_str(
            "provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n",
        )
        .unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.dimensions, 768);
        assert!(config.endpoint.is_none());
        assert_eq!(config.max_attempts, 3);
    }
}
