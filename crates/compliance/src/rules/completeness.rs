use super::{ComplianceRule, COMPLETENESS_RULE};
use crate::segment::{keywords, segment_sub_questions};
use crate::types::ComplianceFinding;

/// FAIL once per sub-question of the query that the draft never touches.
///
/// A sub-question counts as addressed when the draft body mentions at least
/// one of its keywords. Heading lines (`# ...` or a fully bold line) only
/// restate the question and are not counted.
#[derive(Debug, Default)]
pub struct CompletenessRule;

impl ComplianceRule for CompletenessRule {
    fn id(&self) -> &'static str {
        COMPLETENESS_RULE
    }

    fn evaluate(&self, draft: &str, query: &str) -> Vec<ComplianceFinding> {
        let lower = body_text(draft).to_lowercase();
        let sub_questions = segment_sub_questions(query);

        let findings: Vec<ComplianceFinding> = sub_questions
            .iter()
            .filter(|q| !keywords(q).iter().any(|k| lower.contains(k.as_str())))
            .map(|q| {
                ComplianceFinding::fail(
                    COMPLETENESS_RULE,
                    format!("Sub-question not addressed: '{}'", q),
                )
                .with_fix(format!("Add a section answering '{}'", q))
                .with_subject(q.clone())
            })
            .collect();

        if findings.is_empty() {
            vec![ComplianceFinding::pass(
                COMPLETENESS_RULE,
                format!("All {} sub-questions addressed", sub_questions.len()),
            )]
        } else {
            findings
        }
    }
}

fn body_text(draft: &str) -> String {
    draft
        .lines()
        .filter(|line| !is_heading(line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#')
        || (line.len() > 4
            && line.starts_with("**")
            && line.ends_with("**")
            && !line[2..line.len() - 2].contains("**"))
}
