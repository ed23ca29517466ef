//! Extractive response synthesis.
//!
//! The synthesizer never generates facts. For every sub-question it quotes
//! the evidence sentences that share the most keywords with it, each with an
//! inline citation. Tables are reproduced under a supporting data section.

use crate::evidence::{EvidenceBody, EvidenceItem};
use advisor_compliance::{
    financial_topic, has_disclaimer, keywords, segment_sub_questions, ComplianceFinding,
    AI_DISCLOSURE_RULE, COMPLETENESS_RULE, DISCLAIMER_RULE, FORBIDDEN_PHRASE_RULE,
    RISK_DISCLOSURE_RULE, STANDARD_DISCLAIMER,
};
use serde::Serialize;

/// A change requested by the compliance battery for the next draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CorrectiveInstruction {
    RemovePhrase(String),
    AddDisclaimer,
    AddressSubQuestion(String),
    /// Append this statement verbatim
    AddStatement(String),
    Note(String),
}

impl CorrectiveInstruction {
    pub fn from_finding(finding: &ComplianceFinding) -> Self {
        match (finding.rule_id.as_str(), &finding.subject) {
            (FORBIDDEN_PHRASE_RULE, Some(phrase)) => Self::RemovePhrase(phrase.clone()),
            (DISCLAIMER_RULE, _) => Self::AddDisclaimer,
            (COMPLETENESS_RULE, Some(question)) => Self::AddressSubQuestion(question.clone()),
            (AI_DISCLOSURE_RULE | RISK_DISCLOSURE_RULE, _) => match &finding.suggested_fix {
                Some(statement) => Self::AddStatement(statement.clone()),
                None => Self::Note(finding.message.clone()),
            },
            _ => Self::Note(
                finding
                    .suggested_fix
                    .clone()
                    .unwrap_or_else(|| finding.message.clone()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub text: String,
    /// Citation ids in order of first use
    pub citations: Vec<String>,
}

struct Candidate<'a> {
    citation: Option<&'a str>,
    sentence: String,
    stems: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResponseSynthesizer {
    sentences_per_question: usize,
    table_rows: usize,
}

impl Default for ResponseSynthesizer {
    fn default() -> Self {
        Self {
            sentences_per_question: 2,
            table_rows: 10,
        }
    }
}

impl ResponseSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn synthesize(
        &self,
        query: &str,
        evidence: &[EvidenceItem],
        gaps: &[String],
        corrective: &[CorrectiveInstruction],
    ) -> Draft {
        let mut removed: Vec<String> = corrective
            .iter()
            .filter_map(|c| match c {
                CorrectiveInstruction::RemovePhrase(p) => Some(p.to_lowercase()),
                _ => None,
            })
            .collect();
        // Longest first so a plural is not left as a stray suffix
        removed.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut questions = segment_sub_questions(query);
        if questions.is_empty() && !query.trim().is_empty() {
            questions.push(query.trim().to_string());
        }
        for instruction in corrective {
            if let CorrectiveInstruction::AddressSubQuestion(q) = instruction {
                if !questions.iter().any(|existing| existing.eq_ignore_ascii_case(q)) {
                    questions.push(q.clone());
                }
            }
        }

        let candidates = collect_candidates(evidence, &removed);
        let mut used = vec![false; candidates.len()];
        let mut citations: Vec<String> = Vec::new();
        let cite = |citation: Option<&str>, citations: &mut Vec<String>| {
            if let Some(id) = citation {
                if !citations.iter().any(|c| c == id) {
                    citations.push(id.to_string());
                }
            }
        };

        let mut sections: Vec<String> = Vec::new();
        for question in &questions {
            let wanted: Vec<String> = keywords(question).iter().map(|k| stem(k)).collect();

            let mut scored: Vec<(usize, usize)> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| !used[*i])
                .map(|(i, c)| (i, c.stems.iter().filter(|s| wanted.contains(s)).count()))
                .filter(|(_, score)| *score > 0)
                .collect();
            // Stable: equal scores keep evidence order
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            scored.truncate(self.sentences_per_question);
            scored.sort_by_key(|(i, _)| *i);

            let mut section = format!("**{}**\n", capitalize(&strip_phrases(question, &removed)));
            if scored.is_empty() {
                section.push_str("The available sources do not cover this question.");
            } else {
                let lines: Vec<String> = scored
                    .iter()
                    .map(|(i, _)| {
                        used[*i] = true;
                        let candidate = &candidates[*i];
                        cite(candidate.citation, &mut citations);
                        match candidate.citation {
                            Some(id) => format!("- {} [{}]", candidate.sentence, id),
                            None => format!("- {}", candidate.sentence),
                        }
                    })
                    .collect();
                section.push_str(&lines.join("\n"));
            }
            sections.push(section);
        }

        let tables: Vec<String> = evidence
            .iter()
            .filter_map(|item| match &item.body {
                EvidenceBody::Table {
                    columns,
                    rows,
                    summary,
                } => {
                    cite(item.citation.as_deref(), &mut citations);
                    Some(self.render_table(
                        item.citation.as_deref(),
                        columns,
                        rows,
                        summary,
                        &removed,
                    ))
                }
                EvidenceBody::Passage { .. } => None,
            })
            .collect();
        if !tables.is_empty() {
            sections.push(format!("### Supporting data\n\n{}", tables.join("\n\n")));
        }

        if !gaps.is_empty() {
            let gaps: Vec<String> = gaps.iter().map(|g| strip_phrases(g, &removed)).collect();
            sections.push(format!(
                "_Some sources could not be used: {}._",
                gaps.join("; ")
            ));
        }

        let has_specific = corrective
            .iter()
            .any(|c| !matches!(c, CorrectiveInstruction::Note(_)));
        if !has_specific {
            for instruction in corrective {
                if let CorrectiveInstruction::Note(note) = instruction {
                    sections.push(format!("Reviewer note: {}", note));
                }
            }
        }

        let statements: Vec<&str> = corrective
            .iter()
            .filter_map(|c| match c {
                CorrectiveInstruction::AddStatement(statement) => Some(statement.as_str()),
                _ => None,
            })
            .collect();
        for statement in statements {
            if !sections.iter().any(|s| s.contains(statement)) {
                sections.push(statement.to_string());
            }
        }

        let mut text = sections.join("\n\n");
        let wants_disclaimer = corrective.contains(&CorrectiveInstruction::AddDisclaimer)
            || financial_topic(&text).is_some();
        if wants_disclaimer && !has_disclaimer(&text) {
            text.push_str("\n\n");
            text.push_str(STANDARD_DISCLAIMER);
        }

        Draft { text, citations }
    }

    fn render_table(
        &self,
        citation: Option<&str>,
        columns: &[String],
        rows: &[Vec<String>],
        summary: &str,
        removed: &[String],
    ) -> String {
        let clean = |cells: &[String]| -> String {
            cells
                .iter()
                .map(|cell| strip_phrases(cell, removed))
                .collect::<Vec<_>>()
                .join(" | ")
        };
        let summary = strip_phrases(summary, removed);
        let mut out = match citation {
            Some(id) => format!("{} [{}]\n\n", summary, id),
            None => format!("{}\n\n", summary),
        };
        out.push_str(&format!("| {} |\n", clean(columns)));
        out.push_str(&format!("|{}\n", "---|".repeat(columns.len())));
        for row in rows.iter().take(self.table_rows) {
            out.push_str(&format!("| {} |\n", clean(row)));
        }
        if rows.len() > self.table_rows {
            out.push_str(&format!("\n({} more rows not shown)\n", rows.len() - self.table_rows));
        }
        out.trim_end().to_string()
    }
}

fn collect_candidates<'a>(evidence: &'a [EvidenceItem], removed: &[String]) -> Vec<Candidate<'a>> {
    let mut out = Vec::new();
    for item in evidence {
        let text = match &item.body {
            EvidenceBody::Passage { text } => text.as_str(),
            EvidenceBody::Table { summary, .. } => summary.as_str(),
        };
        for sentence in split_sentences(text) {
            let lower = sentence.to_lowercase();
            if removed.iter().any(|p| lower.contains(p.as_str())) {
                continue;
            }
            let stems: Vec<String> = keywords(&sentence).iter().map(|k| stem(k)).collect();
            if stems.is_empty() {
                continue;
            }
            out.push(Candidate {
                citation: item.citation.as_deref(),
                sentence,
                stems,
            });
        }
    }
    out
}

/// Split on line breaks and on `.`, `!`, `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line
            .trim()
            .trim_start_matches(|c: char| c == '#' || c == '-' || c == '*' || c == '>')
            .trim();
        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().map_or(true, |next| next.is_whitespace());
            if boundary {
                push_sentence(&mut out, &current);
                current.clear();
            }
        }
        push_sentence(&mut out, &current);
    }
    out
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let sentence = raw.trim();
    if sentence.split_whitespace().count() >= 3 {
        out.push(sentence.to_string());
    }
}

fn stem(word: &str) -> String {
    match word.strip_suffix('s') {
        Some(base) if base.chars().count() >= 3 && !base.ends_with('s') => base.to_string(),
        _ => word.to_string(),
    }
}

/// Remove each phrase (case-insensitive) and collapse leftover spaces.
fn strip_phrases(text: &str, phrases: &[String]) -> String {
    let mut result = text.to_string();
    for phrase in phrases {
        while let Some(pos) = result.to_lowercase().find(phrase.as_str()) {
            // Lowercasing can change byte lengths outside ASCII
            if !result.is_char_boundary(pos) || !result.is_char_boundary(pos + phrase.len()) {
                break;
            }
            result.replace_range(pos..pos + phrase.len(), "");
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
