//! Prompt loader for YAML prompt definitions.

use crate::builtin;
use crate::types::PromptDefinition;
use advisor_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in the workspace's `.advisor/prompts/` directory
/// takes precedence; otherwise the built-in definition with that id is used.
///
/// # Example
/// ```no_run
/// use advisor_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "advisor.route")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".advisor/prompts")
        .join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some(yaml) = builtin::builtin_yaml(prompt_id) {
        (yaml.to_string(), format!("builtin:{}", prompt_id))
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt not found: {} (looked in {:?})",
            prompt_id, prompt_file
        )));
    };

    parse_prompt(&contents, &origin)
}

/// Parse and validate a prompt definition from YAML text.
pub fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt: {} ({}) from {}", definition.id, definition.title, origin);

    Ok(definition)
}

/// List all available prompt IDs: workspace files plus built-ins, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let prompts_dir = workspace_path.join(".advisor/prompts");

    let mut prompt_ids: Vec<String> = builtin::builtin_ids()
        .iter()
        .map(|id| id.to_string())
        .collect();

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: '{}'. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) {
        let prompts_dir = dir.join(".advisor/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), body).unwrap();
    }

    fn valid_yaml(id: &str, title: &str) -> String {
        format!(
            r#"
id: {}
title: "{}"
apiVersion: "1.0"
behavior:
  tone: professional
  style: concise
template: "Question: {{{{query}}}}"
output:
  format: markdown
"#,
            id, title
        )
    }

    #[test]
    fn test_builtin_is_used_without_override() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), builtin::ROUTE_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, "advisor.route");
    }

    #[test]
    fn test_workspace_file_overrides_builtin() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "advisor.research",
            &valid_yaml("advisor.research", "Custom research"),
        );

        let prompt = load_prompt(temp_dir.path(), "advisor.research").unwrap();
        assert_eq!(prompt.title, "Custom research");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_prompt(temp_dir.path(), "nonexistent");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "broken", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "broken").is_err());
    }

    #[test]
    fn test_bad_api_version_is_rejected() {
        let yaml = valid_yaml("x", "X").replace("\"1.0\"", "\"1\"");
        let err = parse_prompt(&yaml, "inline").unwrap_err();
        assert!(err.to_string().contains("apiVersion"));
    }

    #[test]
    fn test_list_prompts_merges_builtins() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "custom.one", &valid_yaml("custom.one", "One"));
        write_prompt(
            temp_dir.path(),
            "advisor.route",
            &valid_yaml("advisor.route", "Route"),
        );

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(
            prompts,
            vec!["advisor.research", "advisor.route", "custom.one"]
        );
    }
}
