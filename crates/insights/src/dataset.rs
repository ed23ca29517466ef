//! Read-only tabular dataset.

use crate::schema::DatasetSchema;
use crate::value::CellValue;
use advisor_core::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct RawDataset {
    schema: DatasetSchema,
    records: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// An immutable table of typed rows.
///
/// Rows are stored in declared column order. Once loaded a dataset is never
/// modified; share it through `Arc`.
#[derive(Debug)]
pub struct Dataset {
    schema: DatasetSchema,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Build a dataset from rows already in declared column order.
    pub fn new(schema: DatasetSchema, rows: Vec<Vec<CellValue>>) -> AppResult<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != schema.columns.len() {
                return Err(AppError::SchemaViolation(format!(
                    "row {} has {} values, schema declares {} columns",
                    i,
                    row.len(),
                    schema.columns.len()
                )));
            }
        }
        Ok(Self { schema, rows })
    }

    /// Parse the JSON document form: `{"schema": {...}, "records": [{...}]}`.
    pub fn from_json_str(contents: &str) -> AppResult<Self> {
        let raw: RawDataset = serde_json::from_str(contents)?;
        let schema = raw.schema;

        let mut rows = Vec::with_capacity(raw.records.len());
        for (i, record) in raw.records.iter().enumerate() {
            if let Some(extra) = record.keys().find(|k| schema.column(k).is_none()) {
                return Err(AppError::SchemaViolation(format!(
                    "record {} has undeclared column '{}'",
                    i, extra
                )));
            }

            let mut row = Vec::with_capacity(schema.columns.len());
            for column in &schema.columns {
                let raw_value = record
                    .get(&column.name)
                    .unwrap_or(&serde_json::Value::Null);
                let cell = CellValue::from_json(raw_value, column.kind).ok_or_else(|| {
                    AppError::SchemaViolation(format!(
                        "record {}: column '{}' expects {}, got {}",
                        i, column.name, column.kind, raw_value
                    ))
                })?;
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { schema, rows })
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let dataset = Self::from_json_str(&contents)?;
        tracing::info!(
            "Loaded dataset {} ({} rows, schema {})",
            path.display(),
            dataset.len(),
            dataset.schema.version
        );
        Ok(dataset)
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, ColumnSpec};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SMALL: &str = r#"{
        "schema": {"version": "test/v1", "columns": [
            {"name": "name", "kind": "text"},
            {"name": "age", "kind": "integer"}
        ]},
        "records": [
            {"name": "Ana", "age": 41},
            {"name": "Luis"}
        ]
    }"#;

    #[test]
    fn test_missing_values_become_null() {
        let dataset = Dataset::from_json_str(SMALL).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1][1], CellValue::Null);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let contents = SMALL.replace("41", "\"forty-one\"");
        let err = Dataset::from_json_str(&contents).unwrap_err();
        assert!(err.to_string().contains("column 'age' expects integer"));
    }

    #[test]
    fn test_undeclared_column_is_rejected() {
        let contents = SMALL.replace("\"Luis\"", "\"Luis\", \"vip\": true");
        let err = Dataset::from_json_str(&contents).unwrap_err();
        assert!(err.to_string().contains("undeclared column 'vip'"));
    }

    #[test]
    fn test_row_width_checked() {
        let schema = DatasetSchema {
            version: "test/v1".into(),
            columns: vec![ColumnSpec::new("a", ColumnKind::Integer)],
        };
        assert!(Dataset::new(schema, vec![vec![CellValue::Int(1), CellValue::Int(2)]]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let dataset = Dataset::load(file.path()).unwrap();
        assert_eq!(dataset.schema().version, "test/v1");
    }
}
