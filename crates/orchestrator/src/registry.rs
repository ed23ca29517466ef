//! Capability registry.
//!
//! Capabilities are registered once at startup under unique names. Each one
//! carries a descriptor whose parameter schema is enforced before the
//! capability is ever invoked.

use crate::evidence::CapabilityOutput;
use advisor_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Object => "object",
            ParamKind::Array => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
        }
    }
}

/// One named, typed parameter of a capability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            default: None,
            minimum: None,
            maximum: None,
            allowed: Vec::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_allowed(mut self, allowed: &[&str]) -> Self {
        self.allowed = allowed.iter().map(|s| s.to_string()).collect();
        self
    }

    fn check(&self, capability: &str, value: &Value) -> AppResult<()> {
        let violation = |detail: String| {
            AppError::SchemaViolation(format!(
                "{}: argument '{}' {}",
                capability, self.name, detail
            ))
        };

        if !self.kind.accepts(value) {
            return Err(violation(format!("must be {}", self.kind.as_str())));
        }

        if let Some(n) = value.as_i64() {
            if self.minimum.is_some_and(|min| n < min) || self.maximum.is_some_and(|max| n > max)
            {
                return Err(violation(format!(
                    "must be between {} and {}",
                    self.minimum.unwrap_or(i64::MIN),
                    self.maximum.unwrap_or(i64::MAX)
                )));
            }
        }

        if !self.allowed.is_empty() {
            let matches = value
                .as_str()
                .is_some_and(|s| self.allowed.iter().any(|a| a == s));
            if !matches {
                return Err(violation(format!(
                    "must be one of: {}",
                    self.allowed.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Static description of a capability, shown to the reasoning engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub output: String,
    /// Safe to retry on failure
    pub idempotent: bool,
}

impl CapabilityDescriptor {
    /// Check `arguments` against the parameter schema and return them with
    /// defaults filled in. Unknown arguments are rejected.
    pub fn validate_arguments(&self, arguments: &Value) -> AppResult<Value> {
        let provided = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(AppError::SchemaViolation(format!(
                    "{}: arguments must be an object, got {}",
                    self.name, other
                )))
            }
        };

        if let Some(unknown) = provided
            .keys()
            .find(|k| !self.params.iter().any(|p| &p.name == *k))
        {
            return Err(AppError::SchemaViolation(format!(
                "{}: unknown argument '{}'",
                self.name, unknown
            )));
        }

        let mut normalized = Map::new();
        for param in &self.params {
            match provided.get(&param.name) {
                Some(value) if !value.is_null() => {
                    param.check(&self.name, value)?;
                    normalized.insert(param.name.clone(), value.clone());
                }
                _ if param.required => {
                    return Err(AppError::SchemaViolation(format!(
                        "{}: missing required argument '{}'",
                        self.name, param.name
                    )))
                }
                _ => {
                    if let Some(default) = &param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(Value::Object(normalized))
    }

    /// One-line signature used in routing prompts.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = format!(
                    "{}{}: {}",
                    p.name,
                    if p.required { "" } else { "?" },
                    p.kind.as_str()
                );
                if let (Some(min), Some(max)) = (p.minimum, p.maximum) {
                    s.push_str(&format!(" {}..={}", min, max));
                }
                if let Some(default) = &p.default {
                    s.push_str(&format!(" = {}", default));
                }
                s
            })
            .collect();
        format!("{}({}): {}", self.name, params.join(", "), self.description)
    }
}

/// A registered handler.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    /// Run with arguments already validated against the descriptor.
    async fn invoke(&self, arguments: Value) -> AppResult<CapabilityOutput>;
}

/// Name → capability map, read-only once built.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) -> AppResult<()> {
        let name = capability.descriptor().name.clone();
        if self.entries.contains_key(&name) {
            return Err(AppError::Config(format!(
                "Capability '{}' is already registered",
                name
            )));
        }
        tracing::debug!("Registered capability '{}'", name);
        self.entries.insert(name, capability);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.entries.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        self.entries.values().map(|c| c.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
