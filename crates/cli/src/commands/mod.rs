//! Command handlers for the advisor CLI.

pub mod ask;
pub mod check;
pub mod insights;
pub mod knowledge;
pub mod serve;

pub use ask::AskCommand;
pub use check::CheckCommand;
pub use insights::InsightsCommand;
pub use knowledge::KnowledgeCommand;
pub use serve::ServeCommand;

use anyhow::{bail, Context};
use std::path::PathBuf;

/// Text given inline or read from `file`.
pub(crate) fn read_input(inline: Option<&str>, file: Option<&PathBuf>, what: &str) -> anyhow::Result<String> {
    match (inline, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} from {}", what, path.display())),
        (None, None) => bail!("No {} provided", what),
    }
}
