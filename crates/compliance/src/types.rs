//! Findings and reports produced by the compliance battery.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Pass,
    Fail,
}

/// One rule's verdict on one aspect of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Offending phrase or unaddressed sub-question, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ComplianceFinding {
    pub fn pass(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Pass,
            message: message.into(),
            suggested_fix: None,
            subject: None,
        }
    }

    pub fn fail(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            severity: Severity::Fail,
            message: message.into(),
            suggested_fix: None,
            subject: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Fail
    }
}

/// Ordered findings from every rule. Approved iff nothing failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub findings: Vec<ComplianceFinding>,
}

impl ComplianceReport {
    pub fn new(findings: Vec<ComplianceFinding>) -> Self {
        Self { findings }
    }

    pub fn is_approved(&self) -> bool {
        !self.findings.iter().any(ComplianceFinding::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ComplianceFinding> {
        self.findings.iter().filter(|f| f.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_is_conjunction() {
        let mut report = ComplianceReport::new(vec![
            ComplianceFinding::pass("disclaimer", "ok"),
            ComplianceFinding::pass("completeness", "ok"),
        ]);
        assert!(report.is_approved());

        report
            .findings
            .push(ComplianceFinding::fail("forbidden-phrase", "bad").with_subject("no risk"));
        assert!(!report.is_approved());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn test_finding_serialization() {
        let finding = ComplianceFinding::fail("forbidden-phrase", "Contains 'risk-free'")
            .with_subject("risk-free")
            .with_fix("Remove the phrase");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["ruleId"], "forbidden-phrase");
        assert_eq!(json["severity"], "FAIL");
        assert_eq!(json["suggestedFix"], "Remove the phrase");

        let pass = serde_json::to_value(ComplianceFinding::pass("disclaimer", "ok")).unwrap();
        assert!(pass.get("subject").is_none());
    }
}
