//! Deterministic character-trigram embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use advisor_core::AppResult;
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "can", "my", "our", "your", "what", "how",
];

/// Trigram-based embedding provider for offline operation.
///
/// Each word (lowercased, punctuation trimmed, stop words removed) contributes
/// to one bucket per character trigram plus one bucket for the whole word.
/// Vectors are unit length, so words sharing stems land close together.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str, multiplier: u64) -> usize {
        let hash = token
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut frequencies: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for trigram in chars.windows(3) {
                let trigram: String = trigram.iter().collect();
                embedding[self.bucket(&trigram, 37)] += (*freq as f32).sqrt();
            }
            embedding[self.bucket(word, 31)] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("Pension plan withdrawal rules").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_punctuation_and_case_are_ignored() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("Early withdrawal?").await.unwrap();
        let b = provider.embed("early WITHDRAWAL").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_related_text_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider
            .embed("penalty for early withdrawal from the pension plan")
            .await
            .unwrap();
        let related = provider
            .embed("Early withdrawals from the pension plan incur a 10% penalty.")
            .await
            .unwrap();
        let unrelated = provider
            .embed("Quarterly newsletter schedule and office opening hours.")
            .await
            .unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
        assert!(cosine(&query, &related) > 0.5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_safety() {
        let provider = TrigramProvider::new(64);
        let embedding = provider
            .embed("Préstamo hipotecário 🏦 com taxa fixa")
            .await
            .unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
