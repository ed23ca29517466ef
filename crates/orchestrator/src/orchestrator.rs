//! The per-query state machine.
//!
//! Routing → Executing → Synthesizing → Validating → Approved, with a bounded
//! Revising loop back to Synthesizing when validation fails. Capabilities run
//! once per query; revisions only re-synthesize from the evidence already
//! gathered.

use crate::evidence::{CapabilityOutput, EvidenceItem};
use crate::registry::{Capability, CapabilityRegistry};
use crate::router::{parse_routing_output, RoutingDecision, RoutingRequest, ReasoningEngine};
use crate::session::Turn;
use crate::synthesizer::{CorrectiveInstruction, ResponseSynthesizer};
use crate::trace::{EntryOutcome, OrchestrationTrace, OrchestratorState, TraceEntry};
use advisor_compliance::{ComplianceFinding, ComplianceReport, ComplianceValidator};
use advisor_core::config::OrchestratorSettings;
use advisor_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::Instrument;

/// Trace label for entries produced by the routing step itself.
const ROUTER: &str = "router";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_revisions: u32,
    pub capability_timeout: Duration,
    pub capability_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&OrchestratorSettings::default())
    }
}

impl From<&OrchestratorSettings> for OrchestratorConfig {
    fn from(settings: &OrchestratorSettings) -> Self {
        Self {
            max_revisions: settings.max_revisions,
            capability_timeout: Duration::from_secs(settings.capability_timeout_secs),
            capability_retries: settings.capability_retries,
        }
    }
}

/// A question plus the conversation it belongs to.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub context: Vec<Turn>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<Turn>) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationOutcome {
    pub query_id: String,
    pub state: OrchestratorState,
    pub response: String,
    pub citations: Vec<String>,
    pub compliance_approved: bool,
    pub report: ComplianceReport,
    /// Failing findings of the last draft; empty when approved
    pub outstanding: Vec<ComplianceFinding>,
    pub revisions: usize,
    pub trace: OrchestrationTrace,
}

/// A validated invocation waiting to run.
struct Accepted {
    index: usize,
    name: String,
    arguments: Value,
    capability: Arc<dyn Capability>,
}

/// What came back from one dispatched invocation.
struct Completed {
    index: usize,
    name: String,
    arguments: Value,
    attempts: u32,
    latency_ms: u64,
    result: Result<CapabilityOutput, AppError>,
}

pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    engine: Arc<dyn ReasoningEngine>,
    validator: Arc<ComplianceValidator>,
    synthesizer: ResponseSynthesizer,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        registry: CapabilityRegistry,
        engine: Arc<dyn ReasoningEngine>,
        validator: ComplianceValidator,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            engine,
            validator: Arc::new(validator),
            synthesizer: ResponseSynthesizer::new(),
            config,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &ComplianceValidator {
        &self.validator
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Answer one query.
    ///
    /// Capability failures and compliance failures are part of the outcome,
    /// not errors. Only an empty query is rejected outright. Dropping the
    /// returned future aborts every in-flight invocation.
    pub async fn handle(&self, query: &Query) -> AppResult<OrchestrationOutcome> {
        if query.text.trim().is_empty() {
            return Err(AppError::SchemaViolation("query text is empty".to_string()));
        }

        let query_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("query", query_id = %query_id);
        self.run(query, query_id).instrument(span).await
    }

    async fn run(&self, query: &Query, query_id: String) -> AppResult<OrchestrationOutcome> {
        tracing::info!("Handling query with {} prior turns", query.context.len());
        let mut trace = OrchestrationTrace::new(query_id);
        let mut evidence: Vec<EvidenceItem> = Vec::new();
        let mut gaps: Vec<String> = Vec::new();

        let accepted = self
            .route(query, &mut trace, &mut evidence, &mut gaps)
            .await;

        trace.transition(OrchestratorState::Executing);
        self.execute(accepted, &mut trace, &mut evidence, &mut gaps)
            .await;

        let mut corrective: Vec<CorrectiveInstruction> = Vec::new();
        loop {
            trace.transition(OrchestratorState::Synthesizing);
            let draft = self
                .synthesizer
                .synthesize(&query.text, &evidence, &gaps, &corrective);

            trace.transition(OrchestratorState::Validating);
            let report = self.validator.validate(&draft.text, &query.text);

            if report.is_approved() {
                trace.transition(OrchestratorState::Approved);
                return Ok(outcome(trace, draft.text, draft.citations, report));
            }

            if trace.revisions() >= self.config.max_revisions as usize {
                tracing::warn!(
                    "Compliance still failing after {} revisions",
                    trace.revisions()
                );
                trace.transition(OrchestratorState::Failed);
                return Ok(outcome(trace, draft.text, draft.citations, report));
            }

            trace.transition(OrchestratorState::Revising);
            for finding in report.failures() {
                let instruction = CorrectiveInstruction::from_finding(finding);
                if !corrective.contains(&instruction) {
                    tracing::debug!("Corrective instruction: {:?}", instruction);
                    corrective.push(instruction);
                }
            }
        }
    }

    /// Ask the engine for a decision and turn it into runnable invocations.
    ///
    /// Everything that cannot run is recorded as a rejected trace entry.
    async fn route(
        &self,
        query: &Query,
        trace: &mut OrchestrationTrace,
        evidence: &mut Vec<EvidenceItem>,
        gaps: &mut Vec<String>,
    ) -> Vec<Accepted> {
        let request = RoutingRequest {
            query: &query.text,
            context: &query.context,
            descriptors: self.registry.descriptors(),
        };

        let started = Instant::now();
        let decision = self.engine.route(&request).await.and_then(|raw| {
            tracing::debug!("Engine '{}' replied: {}", self.engine.name(), raw);
            parse_routing_output(&raw)
        });

        let calls = match decision {
            Ok(RoutingDecision::Final(text)) => {
                tracing::info!("Engine answered directly");
                evidence.push(EvidenceItem::passage(ROUTER, None, text));
                return Vec::new();
            }
            Ok(RoutingDecision::Invoke(calls)) => calls,
            Err(e) => {
                trace.record(TraceEntry {
                    capability: ROUTER.to_string(),
                    input: Value::String(query.text.clone()),
                    output_summary: e.to_string(),
                    latency_ms: elapsed_ms(started),
                    attempts: 1,
                    outcome: EntryOutcome::Rejected {
                        code: e.code().to_string(),
                        reason: e.to_string(),
                    },
                });
                gaps.push("no capability could be selected for this question".to_string());
                return Vec::new();
            }
        };

        let mut accepted: Vec<Accepted> = Vec::new();
        for (index, call) in calls.into_iter().enumerate() {
            let invocation = match call {
                Ok(invocation) => invocation,
                Err(reason) => {
                    trace.record(rejected(ROUTER, Value::Null, "ROUTING_ERROR", reason));
                    continue;
                }
            };

            let Some(capability) = self.registry.get(&invocation.capability) else {
                trace.record(rejected(
                    &invocation.capability,
                    invocation.arguments,
                    "ROUTING_ERROR",
                    "unknown capability".to_string(),
                ));
                continue;
            };

            if accepted.iter().any(|a| a.name == invocation.capability) {
                trace.record(rejected(
                    &invocation.capability,
                    invocation.arguments,
                    "ROUTING_ERROR",
                    "duplicate call in the same query".to_string(),
                ));
                continue;
            }

            match capability.descriptor().validate_arguments(&invocation.arguments) {
                Ok(arguments) => accepted.push(Accepted {
                    index,
                    name: invocation.capability,
                    arguments,
                    capability,
                }),
                Err(e) => trace.record(rejected(
                    &invocation.capability,
                    invocation.arguments,
                    e.code(),
                    e.to_string(),
                )),
            }
        }

        tracing::info!(
            "Routing accepted {} invocations: {}",
            accepted.len(),
            accepted
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        accepted
    }

    /// Run accepted invocations concurrently and fold results back in
    /// proposal order.
    async fn execute(
        &self,
        accepted: Vec<Accepted>,
        trace: &mut OrchestrationTrace,
        evidence: &mut Vec<EvidenceItem>,
        gaps: &mut Vec<String>,
    ) {
        let timeout = self.config.capability_timeout;
        let retries = self.config.capability_retries;

        let mut tasks = JoinSet::new();
        let mut pending: Vec<(usize, String, Value)> = Vec::new();
        for invocation in accepted {
            pending.push((
                invocation.index,
                invocation.name.clone(),
                invocation.arguments.clone(),
            ));
            tasks.spawn(
                dispatch(invocation, timeout, retries).instrument(tracing::Span::current()),
            );
        }

        let mut completed: Vec<Completed> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => completed.push(done),
                Err(e) => tracing::error!("Capability task aborted: {}", e),
            }
        }

        // A task that panicked leaves no result; report it as failed
        for (index, name, arguments) in pending {
            if !completed.iter().any(|c| c.index == index) {
                completed.push(Completed {
                    index,
                    name: name.clone(),
                    arguments,
                    attempts: 1,
                    latency_ms: 0,
                    result: Err(AppError::CapabilityFailure {
                        capability: name,
                        message: "task aborted".to_string(),
                    }),
                });
            }
        }
        completed.sort_by_key(|c| c.index);

        for done in completed {
            let (outcome, summary) = match done.result {
                Ok(output) => {
                    let summary = output.summary.clone();
                    match output.gap {
                        Some(reason) => {
                            gaps.push(reason.clone());
                            (EntryOutcome::NoResults { reason }, summary)
                        }
                        None => {
                            evidence.extend(output.evidence);
                            (EntryOutcome::Succeeded, summary)
                        }
                    }
                }
                Err(AppError::CapabilityTimeout {
                    capability,
                    timeout_secs,
                }) => {
                    let timeout = AppError::CapabilityTimeout {
                        capability,
                        timeout_secs,
                    };
                    gaps.push(timeout.to_string());
                    (EntryOutcome::TimedOut { timeout_secs }, "timed out".to_string())
                }
                Err(e) => {
                    let failure = match e {
                        failure @ AppError::CapabilityFailure { .. } => failure,
                        other => AppError::CapabilityFailure {
                            capability: done.name.clone(),
                            message: other.to_string(),
                        },
                    };
                    gaps.push(failure.to_string());
                    (
                        EntryOutcome::Failed {
                            code: failure.code().to_string(),
                            message: failure.to_string(),
                        },
                        "failed".to_string(),
                    )
                }
            };

            trace.record(TraceEntry {
                capability: done.name,
                input: done.arguments,
                output_summary: summary,
                latency_ms: done.latency_ms,
                attempts: done.attempts,
                outcome,
            });
        }
    }
}

/// Invoke one capability, retrying failures of idempotent capabilities.
/// The time budget covers every attempt together; timeouts are never retried.
async fn dispatch(invocation: Accepted, timeout: Duration, retries: u32) -> Completed {
    let started = Instant::now();
    let idempotent = invocation.capability.descriptor().idempotent;
    let mut attempts = 0u32;

    let attempts_loop = async {
        loop {
            attempts += 1;
            match invocation.capability.invoke(invocation.arguments.clone()).await {
                Ok(output) => break Ok(output),
                Err(e) if idempotent && attempts <= retries => {
                    tracing::warn!(
                        "{} failed on attempt {}, retrying: {}",
                        invocation.name,
                        attempts,
                        e
                    );
                }
                Err(e) => break Err(e),
            }
        }
    };
    let result = match tokio::time::timeout(timeout, attempts_loop).await {
        Ok(result) => result,
        Err(_) => Err(AppError::CapabilityTimeout {
            capability: invocation.name.clone(),
            timeout_secs: timeout.as_secs(),
        }),
    };

    Completed {
        index: invocation.index,
        name: invocation.name,
        arguments: invocation.arguments,
        attempts,
        latency_ms: elapsed_ms(started),
        result,
    }
}

fn rejected(capability: &str, input: Value, code: &str, reason: String) -> TraceEntry {
    TraceEntry {
        capability: capability.to_string(),
        input,
        output_summary: "skipped".to_string(),
        latency_ms: 0,
        attempts: 0,
        outcome: EntryOutcome::Rejected {
            code: code.to_string(),
            reason,
        },
    }
}

fn outcome(
    trace: OrchestrationTrace,
    response: String,
    citations: Vec<String>,
    report: ComplianceReport,
) -> OrchestrationOutcome {
    let compliance_approved = report.is_approved();
    let outstanding: Vec<ComplianceFinding> = report.failures().cloned().collect();
    OrchestrationOutcome {
        query_id: trace.query_id.clone(),
        state: trace.state,
        response,
        citations,
        compliance_approved,
        report,
        outstanding,
        revisions: trace.revisions(),
        trace,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
