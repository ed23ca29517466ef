//! Query orchestration for the advisor assistant.
//!
//! A reasoning engine picks capabilities from the [`CapabilityRegistry`];
//! the [`Orchestrator`] validates and runs them concurrently, synthesizes a
//! cited draft from the evidence and loops through compliance validation
//! until the draft is approved or the revision budget runs out.

pub mod capabilities;
pub mod context;
pub mod evidence;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod session;
pub mod synthesizer;
pub mod trace;

#[cfg(test)]
mod tests;

pub use capabilities::{
    QueryCustomerData, SearchDocuments, WebResearch, QUERY_CUSTOMER_DATA, SEARCH_DOCUMENTS,
    WEB_RESEARCH,
};
pub use context::AdvisorContext;
pub use evidence::{CapabilityOutput, EvidenceBody, EvidenceItem};
pub use orchestrator::{OrchestrationOutcome, Orchestrator, OrchestratorConfig, Query};
pub use registry::{
    Capability, CapabilityDescriptor, CapabilityRegistry, ParamKind, ParamSpec,
};
pub use router::{
    parse_routing_output, Invocation, KeywordReasoningEngine, LlmReasoningEngine,
    ReasoningEngine, RoutingDecision, RoutingRequest,
};
pub use session::{InMemorySessionStore, Role, SessionStore, Turn};
pub use synthesizer::{CorrectiveInstruction, Draft, ResponseSynthesizer};
pub use trace::{EntryOutcome, OrchestrationTrace, OrchestratorState, TraceEntry, Transition};
