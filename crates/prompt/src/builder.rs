//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use advisor_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::Value;

/// Build a prompt from a definition and template variables.
///
/// Both the system and user templates are rendered with the same variables.
/// Variables must be a JSON object; nested arrays and objects are available to
/// `{{#each}}` and `{{#if}}` blocks.
///
/// # Example
/// ```no_run
/// use advisor_prompt::{build_prompt, load_prompt};
/// use serde_json::json;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_prompt(Path::new("."), "advisor.research")?;
/// let built = build_prompt(&def, &json!({"query": "ECB rates", "maxSentences": 5}))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, variables: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if !variables.is_object() {
        return Err(AppError::Prompt(format!(
            "Variables for prompt '{}' must be a JSON object",
            definition.id
        )));
    }

    let handlebars = registry();

    let system = definition
        .system
        .as_deref()
        .map(|template| render(&handlebars, template, variables))
        .transpose()?
        .map(|s| s.trim().to_string());

    let user = render(&handlebars, &definition.template, variables)?;

    Ok(BuiltPrompt {
        system,
        user: user.trim().to_string(),
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            expects_json: definition.output.is_json(),
            temperature: definition.behavior.temperature,
            resolved_variables: variables.clone(),
        },
    })
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Prompts are plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

fn render(handlebars: &Handlebars<'_>, template: &str, variables: &Value) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
