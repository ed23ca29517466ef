//! Tabular insights over the customer analytics dataset.
//!
//! A [`Dataset`] is loaded once and shared read-only. The [`InsightsEngine`]
//! accepts only structured [`TabularQuerySpec`] queries (filters plus one of
//! `select`, `aggregate`, `topN`, `describe`) and rejects everything else as
//! a schema violation before touching any row.

pub mod dataset;
pub mod engine;
pub mod query;
pub mod schema;
pub mod value;


pub use dataset::Dataset;
pub use engine::{InsightsEngine, TabularResult};
pub use query::{
    Filter, FilterOp, Metric, MetricFn, Operation, SortOrder, TabularQuerySpec,
    DEFAULT_SELECT_LIMIT, MAX_ROWS,
};
pub use schema::{ColumnKind, ColumnSpec, DatasetSchema, CUSTOMER_ANALYTICS_V1};
pub use value::CellValue;
