//! Compliance validation for advisor answers.
//!
//! Every draft answer passes through a fixed battery of rules before it can
//! be returned. Each rule emits findings; the draft is approved only when no
//! finding is a FAIL.

pub mod rules;
pub mod segment;
pub mod types;
pub mod validator;

pub use rules::disclaimer::{financial_topic, has_disclaimer, STANDARD_DISCLAIMER};
pub use rules::{
    AiDisclosureRule, ComplianceRule, RiskDisclosureRule, AI_DISCLOSURE, AI_DISCLOSURE_RULE,
    COMPLETENESS_RULE, DEFAULT_FORBIDDEN_PHRASES, DISCLAIMER_RULE, FORBIDDEN_PHRASE_RULE,
    RISK_DISCLOSURE, RISK_DISCLOSURE_RULE,
};
pub use segment::{keywords, segment_sub_questions};
pub use types::{ComplianceFinding, ComplianceReport, Severity};
pub use validator::ComplianceValidator;
