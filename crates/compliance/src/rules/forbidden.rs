use super::{ComplianceRule, FORBIDDEN_PHRASE_RULE};
use crate::types::ComplianceFinding;
use advisor_core::{AppError, AppResult};

/// Phrases that promise outcomes or suggest market abuse.
pub const DEFAULT_FORBIDDEN_PHRASES: &[&str] = &[
    "guaranteed returns",
    "guaranteed return",
    "guaranteed profit",
    "guaranteed to double",
    "guaranteed to triple",
    "risk-free",
    "no risk",
    "cannot lose",
    "can't lose",
    "will definitely",
    "will certainly",
    "will surely",
    "certain to outperform",
    "certain to beat",
    "you should buy",
    "you should sell",
    "i recommend buying",
    "invest all your",
    "insider information",
    "pump and dump",
    "manipulate the market",
];

/// Case-insensitive substring match against a deny-list.
#[derive(Debug, Clone)]
pub struct ForbiddenPhraseRule {
    phrases: Vec<String>,
}

impl ForbiddenPhraseRule {
    /// Build a rule from a custom deny-list. Phrases are lowercased and
    /// deduplicated; blank phrases are rejected.
    pub fn new<I, S>(phrases: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for phrase in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if phrase.is_empty() {
                return Err(AppError::Compliance(
                    "forbidden phrase list contains a blank entry".to_string(),
                ));
            }
            if !normalized.contains(&phrase) {
                normalized.push(phrase);
            }
        }
        Ok(Self { phrases: normalized })
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for ForbiddenPhraseRule {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_FORBIDDEN_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ComplianceRule for ForbiddenPhraseRule {
    fn id(&self) -> &'static str {
        FORBIDDEN_PHRASE_RULE
    }

    fn evaluate(&self, draft: &str, _query: &str) -> Vec<ComplianceFinding> {
        let lower = draft.to_lowercase();
        let found: Vec<(&String, Vec<(usize, usize)>)> = self
            .phrases
            .iter()
            .map(|p| {
                let spans = lower
                    .match_indices(p.as_str())
                    .map(|(start, m)| (start, start + m.len()))
                    .collect::<Vec<_>>();
                (p, spans)
            })
            .filter(|(_, spans)| !spans.is_empty())
            .collect();

        // A phrase is only subsumed when every occurrence lies inside a
        // longer phrase that was also found
        let subsumed = |phrase: &String, spans: &[(usize, usize)]| {
            spans.iter().all(|&(start, end)| {
                found.iter().any(|(longer, outer)| {
                    longer.len() > phrase.len()
                        && outer.iter().any(|&(s, e)| s <= start && end <= e)
                })
            })
        };

        let findings: Vec<ComplianceFinding> = found
            .iter()
            .filter(|(phrase, spans)| !subsumed(*phrase, spans.as_slice()))
            .map(|(phrase, _)| {
                ComplianceFinding::fail(
                    FORBIDDEN_PHRASE_RULE,
                    format!("Draft contains forbidden phrase '{}'", phrase),
                )
                .with_fix(format!("Remove or rephrase '{}'", phrase))
                .with_subject(phrase.as_str())
            })
            .collect();

        if findings.is_empty() {
            vec![ComplianceFinding::pass(
                FORBIDDEN_PHRASE_RULE,
                "No forbidden phrases found",
            )]
        } else {
            findings
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guaranteed_returns_any_case() {
        let rule = ForbiddenPhraseRule::default();
        for draft in [
            "This plan offers guaranteed returns.",
            "GUARANTEED RETURNS for everyone",
            "We promise Guaranteed Returns, unlike others",
        ] {
            let findings = rule.evaluate(draft, "");
            assert!(
                findings
                    .iter()
                    .any(|f| f.is_failure() && f.subject.as_deref() == Some("guaranteed returns")),
                "missed in: {}",
                draft
            );
        }
    }

    #[test]
    fn test_one_finding_per_distinct_phrase() {
        let rule = ForbiddenPhraseRule::new(["no risk", "risk-free"]).unwrap();
        let findings = rule.evaluate("No risk at all. Really, no risk. It is risk-free.", "");
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.is_failure()));
    }

    #[test]
    fn test_plural_occurrence_covers_singular() {
        let findings = ForbiddenPhraseRule::default().evaluate("Enjoy guaranteed returns.", "");
        let subjects: Vec<_> = findings.iter().filter_map(|f| f.subject.as_deref()).collect();
        assert_eq!(subjects, vec!["guaranteed returns"]);
    }

    #[test]
    fn test_separate_singular_occurrence_reported() {
        let draft = "The fund has guaranteed returns. Each deposit earns a guaranteed return.";
        let findings = ForbiddenPhraseRule::default().evaluate(draft, "");
        let subjects: Vec<_> = findings.iter().filter_map(|f| f.subject.as_deref()).collect();
        assert_eq!(subjects, vec!["guaranteed returns", "guaranteed return"]);
    }

    #[test]
    fn test_prediction_and_unlicensed_advice_phrases() {
        let rule = ForbiddenPhraseRule::default();
        for (draft, phrase) in [
            ("This stock will certainly rise next year.", "will certainly"),
            ("The fund is guaranteed to triple.", "guaranteed to triple"),
            ("I recommend buying the tech ETF now.", "i recommend buying"),
            ("You should buy before the split.", "you should buy"),
        ] {
            let findings = rule.evaluate(draft, "");
            assert!(
                findings.iter().any(|f| f.subject.as_deref() == Some(phrase)),
                "missed '{}' in: {}",
                phrase,
                draft
            );
        }
    }

    #[test]
    fn test_clean_draft_passes() {
        let findings = ForbiddenPhraseRule::default().evaluate("Returns vary with markets.", "");
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].is_failure());
    }

    #[test]
    fn test_custom_list_normalized() {
        let rule = ForbiddenPhraseRule::new(["  Sure Thing ", "sure thing"]).unwrap();
        assert_eq!(rule.phrases(), &["sure thing".to_string()]);
        assert!(ForbiddenPhraseRule::new(["ok", " "]).is_err());
    }
}
