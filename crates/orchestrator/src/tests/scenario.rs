//! End-to-end scenarios over a real index and dataset.

use crate::capabilities::{SearchDocuments, QUERY_CUSTOMER_DATA, SEARCH_DOCUMENTS};
use crate::context::AdvisorContext;
use crate::orchestrator::{Orchestrator, OrchestratorConfig, Query};
use crate::registry::CapabilityRegistry;
use crate::router::{ReasoningEngine, RoutingRequest};
use crate::session::Role;
use crate::trace::{EntryOutcome, OrchestratorState};
use advisor_compliance::{ComplianceValidator, STANDARD_DISCLAIMER};
use advisor_core::{AppConfig, AppResult};
use advisor_insights::DatasetSchema;
use advisor_knowledge::embeddings::providers::trigram::TrigramProvider;
use advisor_knowledge::{Chunker, DocumentIndexer, MemoryIndex, Retriever};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const WITHDRAWAL_POLICY: &str = "Early withdrawal from the retirement plan before age 60 incurs a 10% penalty. \
Advisors must never promise guaranteed returns on early withdrawal.";

const OFFICE_NOTICE: &str = "The Lisbon office opens at nine on weekdays.";

/// Routes every question to document search with the question itself.
struct DocumentRouter;

#[async_trait::async_trait]
impl ReasoningEngine for DocumentRouter {
    fn name(&self) -> &str {
        "documents"
    }

    async fn route(&self, request: &RoutingRequest<'_>) -> AppResult<String> {
        Ok(json!({
            "type": "invoke",
            "capabilityName": SEARCH_DOCUMENTS,
            "arguments": {"query": request.query}
        })
        .to_string())
    }
}

#[tokio::test]
async fn test_early_withdrawal_answer_is_revised_once_and_cited() {
    let index = Arc::new(MemoryIndex::new(64));
    let embedder = Arc::new(TrigramProvider::new(64));
    let indexer = DocumentIndexer::new(
        index.clone(),
        embedder.clone(),
        Chunker::new(1000, 100).unwrap(),
    );
    indexer
        .ingest("policies/withdrawal.md", WITHDRAWAL_POLICY)
        .await
        .unwrap();
    indexer.ingest("notices/office.md", OFFICE_NOTICE).await.unwrap();

    let mut registry = CapabilityRegistry::new();
    registry
        .register(Arc::new(SearchDocuments::new(Arc::new(Retriever::new(
            index, embedder,
        )))))
        .unwrap();
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(DocumentRouter),
        ComplianceValidator::new(),
        OrchestratorConfig::default(),
    );

    let outcome = orchestrator
        .handle(&Query::new("What is the penalty for early withdrawal?"))
        .await
        .unwrap();

    assert_eq!(outcome.state, OrchestratorState::Approved);
    assert!(outcome.compliance_approved);
    assert_eq!(outcome.revisions, 1);
    assert_eq!(outcome.citations, vec!["policies/withdrawal.md#0"]);
    assert!(outcome.response.contains("incurs a 10% penalty"));
    assert!(!outcome.response.to_lowercase().contains("guaranteed returns"));
    assert!(outcome.response.contains(STANDARD_DISCLAIMER));

    let states: Vec<OrchestratorState> = outcome.trace.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            OrchestratorState::Executing,
            OrchestratorState::Synthesizing,
            OrchestratorState::Validating,
            OrchestratorState::Revising,
            OrchestratorState::Synthesizing,
            OrchestratorState::Validating,
            OrchestratorState::Approved,
        ]
    );
    assert_eq!(outcome.trace.entries.len(), 1);
    assert_eq!(outcome.trace.entries[0].outcome, EntryOutcome::Succeeded);
}

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("docs")).unwrap();
    fs::write(temp.path().join("docs/withdrawal.md"), WITHDRAWAL_POLICY).unwrap();

    let dataset = json!({
        "schema": DatasetSchema::customer_analytics_v1(),
        "records": [
            {"customer_id": "C1", "advisor_id": "A1", "customer_name": "Ana Souza", "country": "Brazil",
             "age": 34, "segment": "retail", "product": "pension", "balance": 12000.0,
             "engagement_score": 0.7, "is_active": true},
            {"customer_id": "C2", "advisor_id": "A1", "customer_name": "Bruno Lima", "country": "Brazil",
             "age": 51, "segment": "private", "product": "equities", "balance": 250000.0,
             "engagement_score": 0.9, "is_active": true},
            {"customer_id": "C3", "advisor_id": "A2", "customer_name": "Carla Ruiz", "country": "Mexico",
             "age": 45, "segment": "retail", "product": "pension", "balance": 8000.0,
             "engagement_score": 0.5, "is_active": false}
        ]
    });
    fs::write(temp.path().join("customers.json"), dataset.to_string()).unwrap();
    temp
}

fn config(temp: &TempDir) -> AppConfig {
    let mut config = AppConfig {
        workspace: temp.path().to_path_buf(),
        ..AppConfig::default()
    };
    config.knowledge.docs_folder = Some(PathBuf::from("docs"));
    config.insights.dataset_path = Some(PathBuf::from("customers.json"));
    config
}

#[tokio::test]
async fn test_context_ingests_docs_and_registers_capabilities() {
    let temp = workspace();
    let context = AdvisorContext::build(&config(&temp)).await.unwrap();

    assert_eq!(
        context.orchestrator().registry().names(),
        vec!["query_customer_data", "search_documents", "web_research"]
    );
    assert_eq!(context.orchestrator().engine_name(), "keyword");
    assert!(!context.knowledge().indexer.is_empty().unwrap());

    // A second build finds the base populated and does not ingest again
    let again = AdvisorContext::build(&config(&temp)).await.unwrap();
    let stats = again.knowledge().stats(temp.path()).unwrap();
    assert_eq!(stats.sources_count, 1);
}

#[tokio::test]
async fn test_context_answers_data_question_and_records_session() {
    let temp = workspace();
    let context = AdvisorContext::build(&config(&temp)).await.unwrap();

    let outcome = context
        .ask(Some("s-1"), "Who are my top 2 clients by balance?")
        .await
        .unwrap();

    assert_eq!(outcome.trace.entries[0].capability, QUERY_CUSTOMER_DATA);
    assert_eq!(outcome.trace.entries[0].outcome, EntryOutcome::Succeeded);
    assert!(outcome.citations.iter().any(|c| c.starts_with("crm:")));
    assert!(outcome.response.contains("| C2 |"));
    assert!(outcome.state.is_terminal());

    let turns = context.sessions().load_context("s-1").await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].text, outcome.response);
}

#[tokio::test]
async fn test_context_rejects_unknown_router() {
    let temp = workspace();
    let mut config = config(&temp);
    config.orchestrator.router = "oracle".to_string();

    assert!(AdvisorContext::build(&config).await.is_err());
}
