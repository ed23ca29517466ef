//! Prompt system for the advisor assistant.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (workspace overrides and built-ins)
//! - Handlebars template rendering for system and user messages

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{RESEARCH_PROMPT_ID, ROUTE_PROMPT_ID};
pub use loader::{list_prompts, load_prompt, parse_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec,
};
