use super::{ComplianceRule, DISCLAIMER_RULE};
use crate::types::ComplianceFinding;
use regex::Regex;
use std::sync::LazyLock;

/// Words that mark a draft as discussing financial products or advice.
static FINANCIAL_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(invest\w*|portfolios?|pensions?|retirement|stocks?|bonds?|funds?|equit(?:y|ies)|annuit(?:y|ies)|savings|withdrawals?|returns?|dividends?|interest rates?|tax(?:es|ation)?|loans?|mortgages?|etfs?|crypto\w*|trading|securities|assets?)\b",
    )
    .unwrap()
});

/// Recognized disclaimer markers, lowercase.
pub const DISCLAIMER_MARKERS: &[&str] = &[
    "not financial advice",
    "for informational purposes",
    "for educational purposes",
    "does not constitute",
    "consult a licensed",
    "consult a qualified",
    "not a recommendation",
];

/// Standard disclaimer text that satisfies this rule.
pub const STANDARD_DISCLAIMER: &str = "This information is for informational purposes only and does not constitute financial advice. Please consult a licensed financial professional before making investment decisions.";

/// Detect a financial topic in `text`, returning the first matching word.
pub fn financial_topic(text: &str) -> Option<String> {
    FINANCIAL_TOPIC_RE
        .find(text)
        .map(|m| m.as_str().to_lowercase())
}

pub fn has_disclaimer(text: &str) -> bool {
    let lower = text.to_lowercase();
    DISCLAIMER_MARKERS.iter().any(|m| lower.contains(m))
}

/// FAIL when the draft discusses financial topics without a disclaimer.
#[derive(Debug, Default)]
pub struct DisclaimerRule;

impl ComplianceRule for DisclaimerRule {
    fn id(&self) -> &'static str {
        DISCLAIMER_RULE
    }

    fn evaluate(&self, draft: &str, _query: &str) -> Vec<ComplianceFinding> {
        let finding = match financial_topic(draft) {
            None => ComplianceFinding::pass(DISCLAIMER_RULE, "No financial advice content detected"),
            Some(_) if has_disclaimer(draft) => {
                ComplianceFinding::pass(DISCLAIMER_RULE, "Financial content carries a disclaimer")
            }
            Some(topic) => ComplianceFinding::fail(
                DISCLAIMER_RULE,
                format!(
                    "Draft discusses financial topics ('{}') without a disclaimer",
                    topic
                ),
            )
            .with_fix(STANDARD_DISCLAIMER),
        };
        vec![finding]
    }
}
