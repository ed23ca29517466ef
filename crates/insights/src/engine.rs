//! Tabular Insights Engine.

use crate::dataset::Dataset;
use crate::query::{
    Filter, FilterOp, Metric, MetricFn, Operation, SortOrder, TabularQuerySpec,
    DEFAULT_SELECT_LIMIT,
};
use crate::schema::{ColumnKind, DatasetSchema};
use crate::value::CellValue;
use advisor_core::{AppError, AppResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of one tabular query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularResult {
    pub query_id: String,
    pub operation: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub matched_rows: usize,
    pub summary: String,
}

impl TabularResult {
    /// Render as a markdown table, showing at most `max_rows` rows.
    pub fn to_markdown(&self, max_rows: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        out.push_str(&format!(
            "|{}\n",
            self.columns.iter().map(|_| "---|").collect::<String>()
        ));
        for row in self.rows.iter().take(max_rows) {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        if self.rows.len() > max_rows {
            out.push_str(&format!("\n({} more rows)\n", self.rows.len() - max_rows));
        }
        out
    }
}

enum Predicate {
    Eq(usize, CellValue),
    Compare(usize, FilterOp, f64),
    Between(usize, f64, f64),
}

impl Predicate {
    fn matches(&self, row: &[CellValue]) -> bool {
        match self {
            Predicate::Eq(idx, expected) => &row[*idx] == expected,
            Predicate::Compare(idx, op, bound) => match row[*idx].as_f64() {
                Some(x) => match op {
                    FilterOp::Gt => x > *bound,
                    FilterOp::Gte => x >= *bound,
                    FilterOp::Lt => x < *bound,
                    FilterOp::Lte => x <= *bound,
                    FilterOp::Eq | FilterOp::Between => false,
                },
                None => false,
            },
            Predicate::Between(idx, low, high) => row[*idx]
                .as_f64()
                .map(|x| x >= *low && x <= *high)
                .unwrap_or(false),
        }
    }
}

#[derive(Default, Clone)]
struct Accumulator {
    count: usize,
    sum: f64,
    numeric: usize,
}

/// Runs structured queries against a read-only dataset.
///
/// The engine fails closed: when the dataset's declared schema does not
/// satisfy the expected schema, every query is rejected.
pub struct InsightsEngine {
    dataset: Arc<Dataset>,
    expected: DatasetSchema,
    incompatibility: Option<String>,
}

impl InsightsEngine {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self::with_expected_schema(dataset, DatasetSchema::customer_analytics_v1())
    }

    pub fn with_expected_schema(dataset: Arc<Dataset>, expected: DatasetSchema) -> Self {
        let incompatibility = dataset
            .schema()
            .satisfies(&expected)
            .err()
            .map(|e| match e {
                AppError::SchemaViolation(reason) => reason,
                other => other.to_string(),
            });

        if let Some(reason) = &incompatibility {
            tracing::warn!("Dataset rejected, all queries will fail: {}", reason);
        }

        Self {
            dataset,
            expected,
            incompatibility,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn expected_schema(&self) -> &DatasetSchema {
        &self.expected
    }

    pub fn is_compatible(&self) -> bool {
        self.incompatibility.is_none()
    }

    /// Parse `value` as a [`TabularQuerySpec`] and run it.
    pub fn query_value(&self, value: &serde_json::Value) -> AppResult<TabularResult> {
        let spec = TabularQuerySpec::from_value(value)?;
        self.query(&spec)
    }

    pub fn query(&self, spec: &TabularQuerySpec) -> AppResult<TabularResult> {
        if let Some(reason) = &self.incompatibility {
            return Err(AppError::SchemaViolation(format!(
                "dataset rejected: {}",
                reason
            )));
        }

        // Everything is resolved against the schema before any row is touched
        let predicates = spec
            .filters
            .iter()
            .map(|f| self.compile_filter(f))
            .collect::<AppResult<Vec<_>>>()?;
        self.check_operation(&spec.operation)?;

        let matching: Vec<&Vec<CellValue>> = self
            .dataset
            .rows()
            .iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .collect();

        let (columns, rows, summary) = match &spec.operation {
            Operation::Select { columns, limit } => {
                self.select(&matching, columns, limit.unwrap_or(DEFAULT_SELECT_LIMIT))?
            }
            Operation::Aggregate { group_by, metrics } => {
                self.aggregate(&matching, group_by, metrics)?
            }
            Operation::TopN {
                column,
                n,
                order,
                columns,
            } => self.top_n(&matching, column, *n, *order, columns)?,
            Operation::Describe { columns } => self.describe(&matching, columns)?,
        };

        let result = TabularResult {
            query_id: spec.query_id(),
            operation: spec.operation.kind().to_string(),
            columns,
            rows,
            matched_rows: matching.len(),
            summary,
        };

        tracing::debug!(
            "Tabular query {} ({}): {}",
            result.query_id,
            result.operation,
            result.summary
        );

        Ok(result)
    }

    fn column(&self, name: &str) -> AppResult<(usize, ColumnKind)> {
        let schema = self.dataset.schema();
        match (schema.position(name), schema.column(name)) {
            (Some(idx), Some(spec)) => Ok((idx, spec.kind)),
            _ => Err(AppError::SchemaViolation(format!("unknown column '{}'", name))),
        }
    }

    fn numeric_column(&self, name: &str, usage: &str) -> AppResult<usize> {
        let (idx, kind) = self.column(name)?;
        if !kind.is_numeric() {
            return Err(AppError::SchemaViolation(format!(
                "{} requires a numeric column, '{}' is {}",
                usage, name, kind
            )));
        }
        Ok(idx)
    }

    fn projection(&self, names: &[String]) -> AppResult<Vec<usize>> {
        if names.is_empty() {
            return Ok((0..self.dataset.schema().columns.len()).collect());
        }
        names
            .iter()
            .map(|n| self.column(n).map(|(idx, _)| idx))
            .collect()
    }

    fn column_names(&self, indices: &[usize]) -> Vec<String> {
        let schema = self.dataset.schema();
        indices
            .iter()
            .map(|i| schema.columns[*i].name.clone())
            .collect()
    }

    fn compile_filter(&self, filter: &Filter) -> AppResult<Predicate> {
        let range_number = |value: &serde_json::Value| {
            value.as_f64().ok_or_else(|| {
                AppError::SchemaViolation(format!(
                    "filter on '{}' needs a numeric value, got {}",
                    filter.column, value
                ))
            })
        };

        match filter.op {
            FilterOp::Eq => {
                let (idx, kind) = self.column(&filter.column)?;
                let expected = CellValue::from_json(&filter.value, kind).ok_or_else(|| {
                    AppError::SchemaViolation(format!(
                        "filter value {} does not match {} column '{}'",
                        filter.value, kind, filter.column
                    ))
                })?;
                Ok(Predicate::Eq(idx, expected))
            }
            FilterOp::Between => {
                let idx = self.numeric_column(&filter.column, "range filter")?;
                match filter.value.as_array().map(Vec::as_slice) {
                    Some([low, high]) => Ok(Predicate::Between(
                        idx,
                        range_number(low)?,
                        range_number(high)?,
                    )),
                    _ => Err(AppError::SchemaViolation(format!(
                        "between filter on '{}' needs [low, high]",
                        filter.column
                    ))),
                }
            }
            op => {
                let idx = self.numeric_column(&filter.column, "range filter")?;
                Ok(Predicate::Compare(idx, op, range_number(&filter.value)?))
            }
        }
    }

    fn check_operation(&self, operation: &Operation) -> AppResult<()> {
        match operation {
            Operation::Select { columns, .. } | Operation::Describe { columns } => {
                self.projection(columns)?;
            }
            Operation::Aggregate { group_by, metrics } => {
                self.projection(group_by)?;
                for metric in metrics {
                    self.check_metric(metric)?;
                }
            }
            Operation::TopN { column, columns, .. } => {
                self.column(column)?;
                self.projection(columns)?;
            }
        }
        Ok(())
    }

    fn check_metric(&self, metric: &Metric) -> AppResult<Option<usize>> {
        match (metric.func, &metric.column) {
            (MetricFn::Count, None) => Ok(None),
            (MetricFn::Count, Some(column)) => Ok(Some(self.column(column)?.0)),
            (func, Some(column)) => {
                let usage = if func == MetricFn::Sum { "sum" } else { "mean" };
                Ok(Some(self.numeric_column(column, usage)?))
            }
            (_, None) => Err(AppError::SchemaViolation(format!(
                "metric '{}' needs a column",
                metric.label()
            ))),
        }
    }

    fn select(
        &self,
        matching: &[&Vec<CellValue>],
        columns: &[String],
        limit: usize,
    ) -> AppResult<(Vec<String>, Vec<Vec<CellValue>>, String)> {
        let indices = self.projection(columns)?;
        let rows: Vec<Vec<CellValue>> = matching
            .iter()
            .take(limit)
            .map(|row| indices.iter().map(|i| row[*i].clone()).collect())
            .collect();

        let summary = format!(
            "Returned {} of {} matching rows ({} rows in dataset)",
            rows.len(),
            matching.len(),
            self.dataset.len()
        );
        Ok((self.column_names(&indices), rows, summary))
    }

    fn aggregate(
        &self,
        matching: &[&Vec<CellValue>],
        group_by: &[String],
        metrics: &[Metric],
    ) -> AppResult<(Vec<String>, Vec<Vec<CellValue>>, String)> {
        let default_metrics = [Metric {
            func: MetricFn::Count,
            column: None,
        }];
        let metrics = if metrics.is_empty() {
            &default_metrics[..]
        } else {
            metrics
        };

        let key_indices = if group_by.is_empty() {
            Vec::new()
        } else {
            self.projection(group_by)?
        };
        let targets = metrics
            .iter()
            .map(|m| self.check_metric(m))
            .collect::<AppResult<Vec<_>>>()?;

        let mut groups: BTreeMap<Vec<CellValue>, Vec<Accumulator>> = BTreeMap::new();
        if key_indices.is_empty() {
            groups.insert(Vec::new(), vec![Accumulator::default(); metrics.len()]);
        }

        for row in matching {
            let key: Vec<CellValue> = key_indices.iter().map(|i| row[*i].clone()).collect();
            let accumulators = groups
                .entry(key)
                .or_insert_with(|| vec![Accumulator::default(); metrics.len()]);

            for (acc, target) in accumulators.iter_mut().zip(&targets) {
                match target {
                    None => acc.count += 1,
                    Some(idx) => {
                        let cell = &row[*idx];
                        if !cell.is_null() {
                            acc.count += 1;
                        }
                        if let Some(x) = cell.as_f64() {
                            acc.sum += x;
                            acc.numeric += 1;
                        }
                    }
                }
            }
        }

        let mut columns = self.column_names(&key_indices);
        columns.extend(metrics.iter().map(Metric::label));

        let group_count = groups.len();
        let rows = groups
            .into_iter()
            .map(|(mut key, accumulators)| {
                for (metric, acc) in metrics.iter().zip(accumulators) {
                    key.push(match metric.func {
                        MetricFn::Count => CellValue::Int(acc.count as i64),
                        MetricFn::Sum => CellValue::Float(acc.sum),
                        MetricFn::Mean if acc.numeric > 0 => {
                            CellValue::Float(acc.sum / acc.numeric as f64)
                        }
                        MetricFn::Mean => CellValue::Null,
                    });
                }
                key
            })
            .collect();

        let summary = if key_indices.is_empty() {
            format!("Aggregated {} matching rows", matching.len())
        } else {
            format!(
                "Aggregated {} matching rows into {} groups by {}",
                matching.len(),
                group_count,
                group_by.join(", ")
            )
        };
        Ok((columns, rows, summary))
    }

    fn top_n(
        &self,
        matching: &[&Vec<CellValue>],
        column: &str,
        n: usize,
        order: SortOrder,
        columns: &[String],
    ) -> AppResult<(Vec<String>, Vec<Vec<CellValue>>, String)> {
        let (sort_idx, _) = self.column(column)?;
        let indices = self.projection(columns)?;

        let mut sorted: Vec<&Vec<CellValue>> = matching.to_vec();
        // Stable; nulls always sort last
        sorted.sort_by(|a, b| {
            let (x, y) = (&a[sort_idx], &b[sort_idx]);
            match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => match order {
                    SortOrder::Asc => x.cmp(y),
                    SortOrder::Desc => y.cmp(x),
                },
            }
        });

        let rows: Vec<Vec<CellValue>> = sorted
            .iter()
            .take(n)
            .map(|row| indices.iter().map(|i| row[*i].clone()).collect())
            .collect();

        let direction = match order {
            SortOrder::Asc => "lowest",
            SortOrder::Desc => "highest",
        };
        let summary = format!(
            "Top {} of {} matching rows by {} {}",
            rows.len(),
            matching.len(),
            direction,
            column
        );
        Ok((self.column_names(&indices), rows, summary))
    }

    fn describe(
        &self,
        matching: &[&Vec<CellValue>],
        columns: &[String],
    ) -> AppResult<(Vec<String>, Vec<Vec<CellValue>>, String)> {
        let indices = self.projection(columns)?;
        let schema = self.dataset.schema();

        let rows = indices
            .iter()
            .map(|idx| {
                let spec = &schema.columns[*idx];
                let present: Vec<&CellValue> = matching
                    .iter()
                    .map(|row| &row[*idx])
                    .filter(|c| !c.is_null())
                    .collect();
                let nulls = matching.len() - present.len();

                let (min, max, mean, sum) = if spec.kind.is_numeric() && !present.is_empty() {
                    let sum: f64 = present.iter().filter_map(|c| c.as_f64()).sum();
                    (
                        present.iter().min().map(|c| (*c).clone()).unwrap_or(CellValue::Null),
                        present.iter().max().map(|c| (*c).clone()).unwrap_or(CellValue::Null),
                        CellValue::Float(sum / present.len() as f64),
                        CellValue::Float(sum),
                    )
                } else {
                    (CellValue::Null, CellValue::Null, CellValue::Null, CellValue::Null)
                };

                vec![
                    CellValue::Text(spec.name.clone()),
                    CellValue::Text(spec.kind.to_string()),
                    CellValue::Int(present.len() as i64),
                    CellValue::Int(nulls as i64),
                    min,
                    max,
                    mean,
                    sum,
                ]
            })
            .collect();

        let columns = ["column", "kind", "count", "nulls", "min", "max", "mean", "sum"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let summary = format!(
            "Described {} columns over {} matching rows",
            indices.len(),
            matching.len()
        );
        Ok((columns, rows, summary))
    }
}
