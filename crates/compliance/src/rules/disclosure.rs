//! Opt-in disclosure checks: AI authorship and investment risk.

use super::{ComplianceRule, AI_DISCLOSURE_RULE, RISK_DISCLOSURE_RULE};
use crate::types::ComplianceFinding;
use regex::Regex;
use std::sync::LazyLock;

static AI_MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAI\b|\bAI-(?:generated|powered)\b|artificial intelligence").unwrap()
});

/// Content that talks about investing, as opposed to fees or procedures.
static INVESTMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(invest\w*|portfolios?|stocks?|shares|equit(?:y|ies)|bonds?|funds?|etfs?|securities|market outlook)\b",
    )
    .unwrap()
});

const LIMITATION_MARKERS: &[&str] = &["may contain errors", "can make mistakes", "probabilistic"];

const RISK_MARKERS: &[&str] = &[
    "market risk",
    "credit risk",
    "liquidity risk",
    "interest rate risk",
    "inflation risk",
    "volatility",
    "loss of principal",
    "past performance",
    "carry risk",
    "carries risk",
    "may lose",
];

/// Statement that satisfies [`AiDisclosureRule`].
pub const AI_DISCLOSURE: &str =
    "This answer was prepared by an AI assistant and may contain errors; verify it against the cited sources.";

/// Statement that satisfies [`RiskDisclosureRule`].
pub const RISK_DISCLOSURE: &str =
    "All investments carry risk, including possible loss of principal, and past performance is not indicative of future results.";

/// FAIL unless the draft says it is AI-generated and can be wrong.
#[derive(Debug, Default)]
pub struct AiDisclosureRule;

impl ComplianceRule for AiDisclosureRule {
    fn id(&self) -> &'static str {
        AI_DISCLOSURE_RULE
    }

    fn evaluate(&self, draft: &str, _query: &str) -> Vec<ComplianceFinding> {
        let lower = draft.to_lowercase();
        let mut missing = Vec::new();
        if !AI_MENTION_RE.is_match(draft) {
            missing.push("that it is AI-generated");
        }
        if !LIMITATION_MARKERS.iter().any(|m| lower.contains(m)) {
            missing.push("that it may contain errors");
        }

        let finding = if missing.is_empty() {
            ComplianceFinding::pass(AI_DISCLOSURE_RULE, "Draft discloses AI authorship")
        } else {
            ComplianceFinding::fail(
                AI_DISCLOSURE_RULE,
                format!("Draft does not state {}", missing.join(" or ")),
            )
            .with_fix(AI_DISCLOSURE)
        };
        vec![finding]
    }
}

/// FAIL when investment content names no risk.
#[derive(Debug, Default)]
pub struct RiskDisclosureRule;

impl ComplianceRule for RiskDisclosureRule {
    fn id(&self) -> &'static str {
        RISK_DISCLOSURE_RULE
    }

    fn evaluate(&self, draft: &str, _query: &str) -> Vec<ComplianceFinding> {
        let lower = draft.to_lowercase();
        let finding = match INVESTMENT_RE.find(draft) {
            None => ComplianceFinding::pass(RISK_DISCLOSURE_RULE, "No investment content detected"),
            Some(_) if RISK_MARKERS.iter().any(|m| lower.contains(m)) => {
                ComplianceFinding::pass(RISK_DISCLOSURE_RULE, "Investment content discloses risk")
            }
            Some(topic) => ComplianceFinding::fail(
                RISK_DISCLOSURE_RULE,
                format!(
                    "Draft discusses investments ('{}') without a risk disclosure",
                    topic.as_str().to_lowercase()
                ),
            )
            .with_fix(RISK_DISCLOSURE),
        };
        vec![finding]
    }
}
