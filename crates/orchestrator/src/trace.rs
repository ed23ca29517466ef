//! Per-query orchestration trace.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrchestratorState {
    Routing,
    Executing,
    Synthesizing,
    Validating,
    Revising,
    Approved,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorState::Approved | OrchestratorState::Failed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Routing => "routing",
            OrchestratorState::Executing => "executing",
            OrchestratorState::Synthesizing => "synthesizing",
            OrchestratorState::Validating => "validating",
            OrchestratorState::Revising => "revising",
            OrchestratorState::Approved => "approved",
            OrchestratorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How one proposed invocation ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EntryOutcome {
    Succeeded,
    /// Ran but produced no usable evidence
    NoResults { reason: String },
    /// Never dispatched: malformed routing output, unknown capability,
    /// invalid arguments or a duplicate call
    Rejected { code: String, reason: String },
    TimedOut { timeout_secs: u64 },
    Failed { code: String, message: String },
}

impl EntryOutcome {
    pub fn contributed(&self) -> bool {
        matches!(self, EntryOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub capability: String,
    pub input: Value,
    pub output_summary: String,
    pub latency_ms: u64,
    pub attempts: u32,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
}

/// Everything that happened while answering one query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationTrace {
    pub query_id: String,
    pub state: OrchestratorState,
    pub entries: Vec<TraceEntry>,
    pub transitions: Vec<Transition>,
}

impl OrchestrationTrace {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            state: OrchestratorState::Routing,
            entries: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn transition(&mut self, to: OrchestratorState) {
        tracing::debug!("State {} -> {}", self.state, to);
        self.transitions.push(Transition {
            from: self.state,
            to,
        });
        self.state = to;
    }

    pub fn record(&mut self, entry: TraceEntry) {
        match &entry.outcome {
            EntryOutcome::Succeeded => {
                tracing::info!(
                    "{} succeeded in {}ms: {}",
                    entry.capability,
                    entry.latency_ms,
                    entry.output_summary
                )
            }
            EntryOutcome::NoResults { reason } => {
                tracing::info!("{} found nothing: {}", entry.capability, reason)
            }
            EntryOutcome::Rejected { code, reason } => {
                tracing::warn!("{} skipped [{}]: {}", entry.capability, code, reason)
            }
            EntryOutcome::TimedOut { timeout_secs } => {
                tracing::warn!("{} timed out after {}s", entry.capability, timeout_secs)
            }
            EntryOutcome::Failed { code, message } => {
                tracing::warn!("{} failed [{}]: {}", entry.capability, code, message)
            }
        }
        self.entries.push(entry);
    }

    /// Number of Revising transitions so far.
    pub fn revisions(&self) -> usize {
        self.transitions
            .iter()
            .filter(|t| t.to == OrchestratorState::Revising)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_recorded_in_order() {
        let mut trace = OrchestrationTrace::new("q-1");
        trace.transition(OrchestratorState::Executing);
        trace.transition(OrchestratorState::Synthesizing);
        trace.transition(OrchestratorState::Validating);
        trace.transition(OrchestratorState::Revising);
        trace.transition(OrchestratorState::Synthesizing);

        assert_eq!(trace.transitions.len(), 5);
        assert_eq!(trace.transitions[0].from, OrchestratorState::Routing);
        assert_eq!(trace.state, OrchestratorState::Synthesizing);
        assert_eq!(trace.revisions(), 1);
        assert!(!trace.state.is_terminal());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = EntryOutcome::TimedOut { timeout_secs: 30 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "timedOut");
        assert_eq!(json["timeout_secs"], 30);
    }
}
