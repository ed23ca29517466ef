//! Process-wide wiring, built once at startup.

use crate::capabilities::{QueryCustomerData, SearchDocuments, WebResearch};
use crate::orchestrator::{OrchestrationOutcome, Orchestrator, OrchestratorConfig, Query};
use crate::registry::CapabilityRegistry;
use crate::router::{KeywordReasoningEngine, LlmReasoningEngine, ReasoningEngine};
use crate::session::{InMemorySessionStore, SessionStore, Turn};
use advisor_compliance::ComplianceValidator;
use advisor_core::{AppConfig, AppResult};
use advisor_insights::{Dataset, InsightsEngine};
use advisor_knowledge::KnowledgeBase;
use advisor_llm::client_from_config;
use std::sync::Arc;

/// Everything needed to answer questions: the knowledge base, the
/// orchestrator with its registered capabilities and the session store.
pub struct AdvisorContext {
    config: AppConfig,
    knowledge: KnowledgeBase,
    orchestrator: Orchestrator,
    sessions: Arc<dyn SessionStore>,
}

impl AdvisorContext {
    pub async fn build(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let knowledge = KnowledgeBase::open(
            &config.workspace,
            &config.knowledge.base,
            config.provider_endpoint(),
        )
        .await?;

        if let Some(folder) = &config.knowledge.docs_folder {
            let folder = if folder.is_absolute() {
                folder.clone()
            } else {
                config.workspace.join(folder)
            };
            if knowledge.indexer.is_empty()? {
                tracing::info!("Knowledge base is empty, ingesting {:?}", folder);
                if let Err(e) = knowledge.indexer.ingest_path(&folder).await {
                    tracing::warn!("Startup ingestion skipped: {}", e);
                }
            }
        }

        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(SearchDocuments::new(knowledge.retriever.clone())))?;

        if let Some(path) = config.dataset_path() {
            let dataset = Dataset::load(&path)?;
            tracing::info!("Loaded {} customer records from {:?}", dataset.len(), path);
            let engine = InsightsEngine::new(Arc::new(dataset));
            registry.register(Arc::new(QueryCustomerData::new(Arc::new(engine))))?;
        } else {
            tracing::debug!("No dataset configured, customer queries disabled");
        }

        let client = client_from_config(config)?;
        registry.register(Arc::new(WebResearch::new(
            client.clone(),
            &config.model,
            &config.workspace,
        )?))?;

        let engine: Arc<dyn ReasoningEngine> = match config.orchestrator.router.as_str() {
            "llm" => Arc::new(LlmReasoningEngine::new(
                client,
                &config.model,
                &config.workspace,
            )?),
            _ => Arc::new(KeywordReasoningEngine),
        };

        let validator = ComplianceValidator::from_settings(&config.compliance)?;
        let orchestrator = Orchestrator::new(
            registry,
            engine,
            validator,
            OrchestratorConfig::from(&config.orchestrator),
        );

        tracing::info!(
            "Advisor ready: router '{}', capabilities [{}]",
            orchestrator.engine_name(),
            orchestrator.registry().names().join(", ")
        );

        Ok(Self {
            config: config.clone(),
            knowledge,
            orchestrator,
            sessions: Arc::new(InMemorySessionStore::new()),
        })
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Answer `text`, using and extending the session's context when a
    /// session id is given.
    pub async fn ask(&self, session_id: Option<&str>, text: &str) -> AppResult<OrchestrationOutcome> {
        let context = match session_id {
            Some(id) => self.sessions.load_context(id).await?,
            None => Vec::new(),
        };

        let outcome = self
            .orchestrator
            .handle(&Query::new(text).with_context(context))
            .await?;

        if let Some(id) = session_id {
            self.sessions.append_turn(id, Turn::user(text)).await?;
            self.sessions
                .append_turn(id, Turn::assistant(outcome.response.clone()))
                .await?;
        }

        Ok(outcome)
    }
}
