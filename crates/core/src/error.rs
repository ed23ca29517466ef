//! Error types for the advisor assistant.
//!
//! A single error enum covers every failure category in the workspace. Each
//! variant maps to a stable, machine-readable code so the CLI and the HTTP
//! surface can report failures without leaking internal detail.

use thiserror::Error;

/// Unified error type for the advisor assistant.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, malformed provider replies)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base, embedding and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Tool-selection output that does not follow the routing contract
    #[error("Routing error: {0}")]
    Routing(String),

    /// A capability did not finish within its time budget
    #[error("Capability '{capability}' timed out after {timeout_secs}s")]
    CapabilityTimeout {
        capability: String,
        timeout_secs: u64,
    },

    /// A capability ran and failed
    #[error("Capability '{capability}' failed: {message}")]
    CapabilityFailure { capability: String, message: String },

    /// Request outside the supported operation set or malformed arguments
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Failure while ingesting a document
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Compliance validation could not be completed
    #[error("Compliance error: {0}")]
    Compliance(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Stable machine-readable code for externally visible failures.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Knowledge(_) => "KNOWLEDGE_ERROR",
            AppError::Prompt(_) => "PROMPT_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Routing(_) => "ROUTING_ERROR",
            AppError::CapabilityTimeout { .. } => "CAPABILITY_TIMEOUT",
            AppError::CapabilityFailure { .. } => "CAPABILITY_FAILURE",
            AppError::SchemaViolation(_) => "SCHEMA_VIOLATION",
            AppError::Ingestion(_) => "INGESTION_ERROR",
            AppError::Compliance(_) => "COMPLIANCE_ERROR",
            AppError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::SchemaViolation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
