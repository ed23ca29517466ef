//! Best-effort sub-question segmentation and keyword extraction.

use regex::Regex;
use std::sync::LazyLock;

/// A conjunction that introduces a new question: "... and what ...",
/// "... also can ...". Group 1 is the interrogative or auxiliary word.
static CONJUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:,\s*)?\b(?:and|also|plus)\s+(what|how|why|when|where|which|who|whose|is|are|can|could|should|would|will|do|does|did|may|might|has|have)\b",
    )
    .unwrap()
});

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "how", "why", "when", "where", "which",
    "who", "whom", "whose", "with", "that", "this", "these", "those", "from", "about", "into",
    "can", "could", "should", "would", "will", "does", "did", "has", "have", "had", "been",
    "being", "their", "there", "they", "them", "our", "your", "you", "any", "all", "also",
    "plus", "but", "not", "its", "may", "might", "tell", "give", "show", "please", "explain",
    "some", "more", "most", "much", "many", "than", "then", "over", "under", "out", "get",
    "let", "know", "like", "just", "very", "each", "other", "per",
];

/// Split a query into its sub-questions.
///
/// Splits on `?`, `;` and line breaks, then on `and`/`also`/`plus` when
/// followed by an interrogative or auxiliary word. Fragments without any
/// keyword are dropped.
pub fn segment_sub_questions(query: &str) -> Vec<String> {
    let mut out = Vec::new();

    for piece in query.split(['?', ';', '\n']) {
        let mut start = 0;
        for caps in CONJUNCTION_RE.captures_iter(piece) {
            let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_fragment(&mut out, &piece[start..whole.start()]);
            start = word.start();
        }
        push_fragment(&mut out, &piece[start..]);
    }

    out
}

fn push_fragment(out: &mut Vec<String>, fragment: &str) {
    let cleaned = fragment
        .trim()
        .trim_matches(|c: char| c == ',' || c == '.' || c == '!' || c.is_whitespace());
    if !cleaned.is_empty() && !keywords(cleaned).is_empty() {
        out.push(cleaned.to_string());
    }
}

/// Lowercased content words of `text`: stop-words and words shorter than
/// three characters removed, first occurrence order kept.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        if word.chars().count() < 3 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        if !seen.contains(&word) {
            seen.push(word);
        }
    }
    seen
}
