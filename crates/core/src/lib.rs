//! Advisor Core Library
//!
//! This crate provides the foundational utilities for the advisor assistant:
//! - Error handling (`AppError`, `AppResult`, stable error codes)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
