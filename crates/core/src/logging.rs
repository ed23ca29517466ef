//! Logging infrastructure for the advisor assistant.
//!
//! This module initializes the tracing subscriber for structured logging.
//! All logs are emitted to stderr to keep stdout clean for data output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber with stderr output.
///
/// This sets up structured logging with:
/// - Output to stderr (stdout is reserved for data)
/// - Environment-based filtering (RUST_LOG or provided level)
/// - Human-readable or JSON lines format
/// - Optional ANSI color control
///
/// # Example
/// ```no_run
/// use advisor_core::{config::LogFormat, logging::init_logging};
///
/// init_logging(None, LogFormat::Text, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, format: LogFormat, no_color: bool) -> AppResult<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(!no_color && supports_color()),
            )
            .try_init(),
    };

    result.map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))
}

/// Check if the terminal supports color output.
fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_config_error() {
        let result = init_logging(Some("advisor=notalevel"), LogFormat::Text, true);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
