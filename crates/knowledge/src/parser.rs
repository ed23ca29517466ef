//! Source file parsing and text extraction.

use advisor_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Json,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("json") => Self::Json,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let content_type = ContentType::from_path(path);
    if !content_type.is_supported() {
        return Err(AppError::Ingestion(format!(
            "Unsupported document type: {:?}",
            path
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Ingestion(format!("Failed to read {:?}: {}", path, e)))?;

    parse_text(&raw, content_type)
        .map_err(|e| AppError::Ingestion(format!("Failed to parse {:?}: {}", path, e)))
}

/// Extract text from already loaded content.
pub fn parse_text(raw: &str, content_type: ContentType) -> AppResult<String> {
    match content_type {
        ContentType::Markdown => Ok(clean_markdown(raw)),
        ContentType::Html => Ok(clean_html(raw)),
        ContentType::Json => {
            let value: serde_json::Value = serde_json::from_str(raw)?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        ContentType::PlainText | ContentType::Unknown => Ok(raw.to_string()),
    }
}

/// Strip heading markers, rules and code fences.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Strip tags, scripts and styles, then collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    for (i, ch) in text.char_indices() {
        let rest = &text[i..];

        if let Some(closing) = skip_until {
            if starts_with_ignore_case(rest, closing) {
                skip_until = None;
                in_tag = true;
            }
            continue;
        }

        match ch {
            '<' => {
                in_tag = true;
                if starts_with_ignore_case(rest, "<script") {
                    skip_until = Some("</script");
                } else if starts_with_ignore_case(rest, "<style") {
                    skip_until = Some("</style");
                }
                result.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
