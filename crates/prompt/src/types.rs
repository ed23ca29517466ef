//! Prompt types for the advisor assistant.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Behavioral settings
    pub behavior: PromptBehavior,

    /// Optional system message template with Handlebars syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User message template with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Behavioral settings for prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "professional", "neutral")
    pub tone: String,

    /// Style (e.g., "concise", "detailed")
    pub style: String,

    /// Sampling temperature for the model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown", "json")
    pub format: String,
}

impl PromptOutputSpec {
    /// Whether the model is expected to answer with a JSON document.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Whether the model should reply with JSON
    #[serde(rename = "expectsJson")]
    pub expects_json: bool,

    /// Sampling temperature carried over from the definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: test.prompt
title: Test Prompt
apiVersion: "1.0"
createdBy: test
behavior:
  tone: neutral
  style: concise
  temperature: 0.1
system: "You route requests."
template: "{{query}}"
output:
  format: json
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "test.prompt");
        assert_eq!(def.behavior.tone, "neutral");
        assert_eq!(def.behavior.temperature, Some(0.1));
        assert_eq!(def.system.as_deref(), Some("You route requests."));
        assert!(def.output.is_json());
    }

    #[test]
    fn test_system_is_optional() {
        let yaml = r#"
id: plain
title: Plain
apiVersion: "1.0"
behavior:
  tone: professional
  style: detailed
template: "{{query}}"
output:
  format: markdown
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.system.is_none());
        assert!(def.created_by.is_empty());
        assert!(!def.output.is_json());
    }
}
