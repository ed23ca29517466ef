//! The compliance rule battery.

pub mod completeness;
pub mod disclaimer;
pub mod disclosure;
pub mod forbidden;

pub use completeness::CompletenessRule;
pub use disclaimer::DisclaimerRule;
pub use disclosure::{AiDisclosureRule, RiskDisclosureRule, AI_DISCLOSURE, RISK_DISCLOSURE};
pub use forbidden::{ForbiddenPhraseRule, DEFAULT_FORBIDDEN_PHRASES};

use crate::types::ComplianceFinding;

pub const DISCLAIMER_RULE: &str = "disclaimer";
pub const FORBIDDEN_PHRASE_RULE: &str = "forbidden-phrase";
pub const COMPLETENESS_RULE: &str = "completeness";
pub const AI_DISCLOSURE_RULE: &str = "ai-disclosure";
pub const RISK_DISCLOSURE_RULE: &str = "risk-disclosure";

/// A single compliance check.
///
/// Rules are pure: they read the draft and the query and never modify
/// either. A rule with nothing to report returns one PASS finding.
pub trait ComplianceRule: Send + Sync {
    fn id(&self) -> &'static str;

    fn evaluate(&self, draft: &str, query: &str) -> Vec<ComplianceFinding>;
}
