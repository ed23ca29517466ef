//! LLM provider factory.
//!
//! Builds an LLM client from the application configuration: resolves the
//! provider name, the endpoint and the request timeout.

use crate::client::LlmClient;
use crate::providers::ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
use advisor_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout_secs` - Optional request timeout
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout_secs: Option<u64>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(DEFAULT_OLLAMA_URL);
            let client = match timeout_secs {
                Some(secs) => OllamaClient::with_timeout(base_url, secs),
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!(
            "Unknown provider: {}. Supported: {}",
            other,
            advisor_core::config::KNOWN_PROVIDERS.join(", ")
        ))),
    }
}

/// Create the client for the active provider of a loaded configuration.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let timeout = config
        .get_provider_config(&config.provider)
        .and_then(|pc| pc.timeout);
    create_client(&config.provider, config.provider_endpoint(), timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("Ollama", Some("http://localhost:8080"), Some(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }

    #[test]
    fn test_client_from_default_config() {
        let config = AppConfig::default();
        assert!(client_from_config(&config).is_ok());
    }
}
