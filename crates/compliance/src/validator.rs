use crate::rules::{
    AiDisclosureRule, CompletenessRule, ComplianceRule, DisclaimerRule, ForbiddenPhraseRule,
    RiskDisclosureRule,
};
use crate::types::ComplianceReport;
use advisor_core::config::ComplianceSettings;
use advisor_core::AppResult;

/// Runs the fixed, ordered rule battery over a draft.
///
/// Order: disclaimer, forbidden phrase, completeness, then any enabled
/// disclosure rules. The verdict is the conjunction of every rule's verdict.
pub struct ComplianceValidator {
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::with_forbidden_rule(ForbiddenPhraseRule::default())
    }
}

impl ComplianceValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ComplianceSettings) -> AppResult<Self> {
        let mut validator = match &settings.forbidden_phrases {
            Some(phrases) => Self::with_forbidden_rule(ForbiddenPhraseRule::new(phrases)?),
            None => Self::default(),
        };
        if settings.require_ai_disclosure {
            validator.rules.push(Box::new(AiDisclosureRule));
        }
        if settings.require_risk_disclosure {
            validator.rules.push(Box::new(RiskDisclosureRule));
        }
        Ok(validator)
    }

    /// A validator running exactly `rules`, in order.
    pub fn with_rules(rules: Vec<Box<dyn ComplianceRule>>) -> Self {
        Self { rules }
    }

    fn with_forbidden_rule(forbidden: ForbiddenPhraseRule) -> Self {
        Self {
            rules: vec![
                Box::new(DisclaimerRule),
                Box::new(forbidden),
                Box::new(CompletenessRule),
            ],
        }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Evaluate `draft` as an answer to `query`.
    pub fn validate(&self, draft: &str, query: &str) -> ComplianceReport {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let produced = rule.evaluate(draft, query);
            tracing::debug!(
                "Rule '{}' produced {} findings ({} failing)",
                rule.id(),
                produced.len(),
                produced.iter().filter(|f| f.is_failure()).count()
            );
            findings.extend(produced);
        }

        let report = ComplianceReport::new(findings);
        tracing::info!(
            approved = report.is_approved(),
            failures = report.failures().count(),
            "Compliance validation finished"
        );
        report
    }
}
