//! Versioned dataset schema.

use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag of the customer analytics schema this engine understands.
pub const CUSTOMER_ANALYTICS_V1: &str = "customer-analytics/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Declared layout of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub version: String,
    pub columns: Vec<ColumnSpec>,
}

impl DatasetSchema {
    /// The customer analytics schema expected by default.
    pub fn customer_analytics_v1() -> Self {
        use ColumnKind::*;
        Self {
            version: CUSTOMER_ANALYTICS_V1.to_string(),
            columns: vec![
                ColumnSpec::new("customer_id", Text),
                ColumnSpec::new("advisor_id", Text),
                ColumnSpec::new("customer_name", Text),
                ColumnSpec::new("country", Text),
                ColumnSpec::new("age", Integer),
                ColumnSpec::new("segment", Text),
                ColumnSpec::new("product", Text),
                ColumnSpec::new("balance", Float),
                ColumnSpec::new("engagement_score", Float),
                ColumnSpec::new("is_active", Boolean),
            ],
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Check that `self` (a dataset's declared schema) provides everything
    /// `expected` requires: same version, and every expected column with the
    /// same kind. Extra columns are allowed.
    pub fn satisfies(&self, expected: &DatasetSchema) -> AppResult<()> {
        if self.version != expected.version {
            return Err(AppError::SchemaViolation(format!(
                "dataset schema version '{}' does not match expected '{}'",
                self.version, expected.version
            )));
        }

        for want in &expected.columns {
            match self.column(&want.name) {
                None => {
                    return Err(AppError::SchemaViolation(format!(
                        "dataset is missing expected column '{}'",
                        want.name
                    )))
                }
                Some(have) if have.kind != want.kind => {
                    return Err(AppError::SchemaViolation(format!(
                        "dataset column '{}' is {}, expected {}",
                        want.name, have.kind, want.kind
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_schema_satisfies() {
        let schema = DatasetSchema::customer_analytics_v1();
        assert!(schema.satisfies(&DatasetSchema::customer_analytics_v1()).is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let mut schema = DatasetSchema::customer_analytics_v1();
        schema.version = "customer-analytics/v2".to_string();
        let err = schema
            .satisfies(&DatasetSchema::customer_analytics_v1())
            .unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut schema = DatasetSchema::customer_analytics_v1();
        schema.columns[4].kind = ColumnKind::Text;
        let err = schema
            .satisfies(&DatasetSchema::customer_analytics_v1())
            .unwrap_err();
        assert!(err.to_string().contains("'age' is text, expected integer"));
    }

    #[test]
    fn test_extra_columns_allowed() {
        let mut schema = DatasetSchema::customer_analytics_v1();
        schema
            .columns
            .push(ColumnSpec::new("region", ColumnKind::Text));
        assert!(schema.satisfies(&DatasetSchema::customer_analytics_v1()).is_ok());
    }

    #[test]
    fn test_kind_serde() {
        let spec: ColumnSpec =
            serde_json::from_str(r#"{"name":"balance","kind":"float"}"#).unwrap();
        assert_eq!(spec.kind, ColumnKind::Float);
        assert!(spec.kind.is_numeric());
    }
}
