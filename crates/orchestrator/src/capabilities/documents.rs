use crate::evidence::{CapabilityOutput, EvidenceItem};
use crate::registry::{Capability, CapabilityDescriptor, ParamKind, ParamSpec};
use advisor_core::{AppError, AppResult};
use advisor_knowledge::{Retriever, SearchOutcome};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SEARCH_DOCUMENTS: &str = "search_documents";

/// Semantic search over the enterprise document knowledge base.
pub struct SearchDocuments {
    retriever: Arc<Retriever>,
    descriptor: CapabilityDescriptor,
}

impl SearchDocuments {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        let default_top_k = retriever.default_top_k().clamp(1, 20);
        Self {
            retriever,
            descriptor: CapabilityDescriptor {
                name: SEARCH_DOCUMENTS.to_string(),
                description: "Search internal policy, product and procedure documents"
                    .to_string(),
                params: vec![
                    ParamSpec::required("query", ParamKind::String, "Search text"),
                    ParamSpec::optional("top_k", ParamKind::Integer, "Passages to return")
                        .with_default(json!(default_top_k))
                        .with_range(1, 20),
                ],
                output: "Ranked passages cited as source#index".to_string(),
                idempotent: true,
            },
        }
    }
}

#[async_trait::async_trait]
impl Capability for SearchDocuments {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: Value) -> AppResult<CapabilityOutput> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| AppError::SchemaViolation("query must be a string".to_string()))?;
        let top_k = arguments["top_k"]
            .as_u64()
            .map(|k| k as usize)
            .unwrap_or_else(|| self.retriever.default_top_k());

        match self.retriever.search(query, top_k).await? {
            SearchOutcome::Found { results } => {
                let best = results.first().map(|r| r.relevance_score).unwrap_or(0.0);
                let summary = format!("{} passages (best score {:.2})", results.len(), best);
                let evidence = results
                    .into_iter()
                    .map(|r| {
                        EvidenceItem::passage(
                            SEARCH_DOCUMENTS,
                            Some(r.chunk.id().to_string()),
                            r.chunk.text,
                        )
                    })
                    .collect();
                Ok(CapabilityOutput::found(evidence, summary))
            }
            SearchOutcome::NoResults { reason } => Ok(CapabilityOutput::empty(format!(
                "document search found nothing: {}",
                reason
            ))),
        }
    }
}
