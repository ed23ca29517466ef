//! Structured tabular query model.
//!
//! A query is a list of filters (conjunction) plus exactly one operation.
//! Anything outside this model is rejected when parsed.

use advisor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default row limit for `select`.
pub const DEFAULT_SELECT_LIMIT: usize = 100;
/// Upper bound for `select` limits and `topN` sizes.
pub const MAX_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Inclusive range; the filter value is a two-element array `[low, high]`.
    Between,
}

impl FilterOp {
    pub fn is_range(&self) -> bool {
        !matches!(self, FilterOp::Eq)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFn {
    Count,
    Sum,
    Mean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metric {
    #[serde(rename = "fn")]
    pub func: MetricFn,
    /// Target column. `count` without a column counts rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl Metric {
    pub fn label(&self) -> String {
        let func = match self.func {
            MetricFn::Count => "count",
            MetricFn::Sum => "sum",
            MetricFn::Mean => "mean",
        };
        match &self.column {
            Some(column) => format!("{}({})", func, column),
            None => func.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Operation {
    Select {
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    Aggregate {
        #[serde(default, rename = "groupBy")]
        group_by: Vec<String>,
        #[serde(default)]
        metrics: Vec<Metric>,
    },
    TopN {
        column: String,
        n: usize,
        #[serde(default)]
        order: SortOrder,
        #[serde(default)]
        columns: Vec<String>,
    },
    Describe {
        #[serde(default)]
        columns: Vec<String>,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Select { .. } => "select",
            Operation::Aggregate { .. } => "aggregate",
            Operation::TopN { .. } => "topN",
            Operation::Describe { .. } => "describe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabularQuerySpec {
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub operation: Operation,
}

impl TabularQuerySpec {
    /// Parse and check a query, naming the first unsupported construct.
    pub fn from_value(value: &serde_json::Value) -> AppResult<Self> {
        let spec: TabularQuerySpec = serde_json::from_value(value.clone())
            .map_err(|e| AppError::SchemaViolation(format!("unsupported query: {}", e)))?;
        spec.check_bounds()?;
        Ok(spec)
    }

    fn check_bounds(&self) -> AppResult<()> {
        match &self.operation {
            Operation::Select {
                limit: Some(limit), ..
            } if *limit == 0 || *limit > MAX_ROWS => Err(AppError::SchemaViolation(format!(
                "select limit must be between 1 and {}, got {}",
                MAX_ROWS, limit
            ))),
            Operation::TopN { n, .. } if *n == 0 || *n > MAX_ROWS => {
                Err(AppError::SchemaViolation(format!(
                    "topN n must be between 1 and {}, got {}",
                    MAX_ROWS, n
                )))
            }
            _ => Ok(()),
        }
    }

    /// Deterministic citation id: `crm:` plus a sha256 prefix of the
    /// canonical JSON form.
    pub fn query_id(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
        format!("crm:{}", hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_aggregate() {
        let spec = TabularQuerySpec::from_value(&json!({
            "filters": [{"column": "country", "op": "eq", "value": "Brazil"}],
            "operation": {
                "kind": "aggregate",
                "groupBy": ["segment"],
                "metrics": [{"fn": "mean", "column": "balance"}, {"fn": "count"}]
            }
        }))
        .unwrap();

        assert_eq!(spec.filters.len(), 1);
        match &spec.operation {
            Operation::Aggregate { group_by, metrics } => {
                assert_eq!(group_by, &vec!["segment".to_string()]);
                assert_eq!(metrics[0].label(), "mean(balance)");
                assert_eq!(metrics[1].label(), "count");
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_contains_operator_rejected() {
        let err = TabularQuerySpec::from_value(&json!({
            "filters": [{"column": "customer_name", "op": "contains", "value": "Ana"}],
            "operation": {"kind": "select"}
        }))
        .unwrap_err();

        assert_eq!(err.code(), "SCHEMA_VIOLATION");
        assert!(err.to_string().contains("contains"));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = TabularQuerySpec::from_value(&json!({
            "operation": {"kind": "pivot", "column": "segment"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("pivot"));
    }

    #[test]
    fn test_limits_bounded() {
        let err = TabularQuerySpec::from_value(&json!({
            "operation": {"kind": "select", "limit": 5000}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("limit"));

        let err = TabularQuerySpec::from_value(&json!({
            "operation": {"kind": "topN", "column": "balance", "n": 0}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("topN"));
    }

    #[test]
    fn test_query_id_is_stable() {
        let a = TabularQuerySpec::from_value(&json!({
            "operation": {"kind": "topN", "column": "balance", "n": 3}
        }))
        .unwrap();
        let b = TabularQuerySpec::from_value(&json!({
            "operation": {"n": 3, "column": "balance", "kind": "topN", "order": "desc"}
        }))
        .unwrap();
        let c = TabularQuerySpec::from_value(&json!({
            "operation": {"kind": "topN", "column": "balance", "n": 4}
        }))
        .unwrap();

        assert_eq!(a.query_id(), b.query_id());
        assert_ne!(a.query_id(), c.query_id());
        assert!(a.query_id().starts_with("crm:"));
        assert_eq!(a.query_id().len(), "crm:".len() + 12);
    }
}
