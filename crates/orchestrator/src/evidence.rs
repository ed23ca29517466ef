//! Evidence gathered by capabilities for one query.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EvidenceBody {
    /// Free text: a document passage, research summary or router answer.
    Passage { text: String },
    /// Rows from the customer dataset, already rendered as text cells.
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        summary: String,
    },
}

/// One piece of evidence with the id used to cite it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    /// `source#index`, `crm:…` or `web:…`; `None` for uncited text.
    pub citation: Option<String>,
    pub capability: String,
    pub body: EvidenceBody,
}

impl EvidenceItem {
    pub fn passage(capability: &str, citation: Option<String>, text: impl Into<String>) -> Self {
        Self {
            citation,
            capability: capability.to_string(),
            body: EvidenceBody::Passage { text: text.into() },
        }
    }
}

/// What a capability hands back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityOutput {
    pub evidence: Vec<EvidenceItem>,
    /// Short description for the trace
    pub summary: String,
    /// Set when the capability ran but found nothing usable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<String>,
}

impl CapabilityOutput {
    pub fn found(evidence: Vec<EvidenceItem>, summary: impl Into<String>) -> Self {
        Self {
            evidence,
            summary: summary.into(),
            gap: None,
        }
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            evidence: Vec::new(),
            summary: reason.clone(),
            gap: Some(reason),
        }
    }
}
