//! LLM integration crate for the advisor assistant.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs) through a unified trait-based interface.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use advisor_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{client_from_config, create_client};
pub use providers::OllamaClient;
