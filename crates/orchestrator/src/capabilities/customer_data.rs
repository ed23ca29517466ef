use crate::evidence::{CapabilityOutput, EvidenceBody, EvidenceItem};
use crate::registry::{Capability, CapabilityDescriptor, ParamKind, ParamSpec};
use advisor_core::AppResult;
use advisor_insights::InsightsEngine;
use serde_json::{json, Value};
use std::sync::Arc;

pub const QUERY_CUSTOMER_DATA: &str = "query_customer_data";

/// Structured queries over the customer analytics dataset.
pub struct QueryCustomerData {
    engine: Arc<InsightsEngine>,
    descriptor: CapabilityDescriptor,
}

impl QueryCustomerData {
    pub fn new(engine: Arc<InsightsEngine>) -> Self {
        let columns = engine.expected_schema().column_names().join(", ");
        Self {
            engine,
            descriptor: CapabilityDescriptor {
                name: QUERY_CUSTOMER_DATA.to_string(),
                description: format!(
                    "Query customer records (columns: {}). operation is one of \
                     {{\"kind\":\"select\",\"columns\":[..],\"limit\":n}}, \
                     {{\"kind\":\"aggregate\",\"groupBy\":[..],\"metrics\":[{{\"fn\":\"count|sum|mean\",\"column\":..}}]}}, \
                     {{\"kind\":\"topN\",\"column\":..,\"n\":n,\"order\":\"desc|asc\"}}, \
                     {{\"kind\":\"describe\"}}; filters are \
                     [{{\"column\":..,\"op\":\"eq|gt|gte|lt|lte|between\",\"value\":..}}]",
                    columns
                ),
                params: vec![
                    ParamSpec::required("operation", ParamKind::Object, "The operation to run"),
                    ParamSpec::optional("filters", ParamKind::Array, "Row filters, all must hold")
                        .with_default(json!([])),
                ],
                output: "A table cited as crm:<id>".to_string(),
                idempotent: true,
            },
        }
    }
}

#[async_trait::async_trait]
impl Capability for QueryCustomerData {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: Value) -> AppResult<CapabilityOutput> {
        let spec = json!({
            "filters": arguments.get("filters").cloned().unwrap_or_else(|| json!([])),
            "operation": arguments.get("operation").cloned().unwrap_or(Value::Null),
        });
        let result = self.engine.query_value(&spec)?;

        if result.rows.is_empty() {
            return Ok(CapabilityOutput::empty(format!(
                "customer data query returned no rows ({})",
                result.summary
            )));
        }

        let summary = result.summary.clone();
        let evidence = EvidenceItem {
            citation: Some(result.query_id.clone()),
            capability: QUERY_CUSTOMER_DATA.to_string(),
            body: EvidenceBody::Table {
                columns: result.columns,
                rows: result
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|c| c.to_string()).collect())
                    .collect(),
                summary: result.summary,
            },
        };
        Ok(CapabilityOutput::found(vec![evidence], summary))
    }
}
