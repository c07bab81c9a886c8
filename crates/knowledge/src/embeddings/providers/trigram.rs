//! Character-trigram embeddings for offline use.

use crate::embeddings::EmbeddingProvider;
use juris_core::AppResult;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Words too common in legal text to carry signal.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "shall", "any", "such", "said",
];

/// Deterministic hashed-trigram embedding provider.
///
/// Not semantic, but content-dependent and stable across runs, so a store
/// built with it can be queried without any model server.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower.unicode_words() {
            // Section numbers ("302", "498a") are kept regardless of length
            let numeric = word.chars().any(|c| c.is_ascii_digit());
            if !numeric && (word.chars().count() < 3 || STOP_WORDS.contains(&word)) {
                continue;
            }
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let graphemes: Vec<&str> = word.graphemes(true).collect();
            for window in graphemes.windows(3) {
                let idx = bucket(window.concat().as_bytes(), 37, self.dimensions);
                embedding[idx] += (*freq as f32).sqrt();
            }

            let idx = bucket(word.as_bytes(), 31, self.dimensions);
            embedding[idx] += *freq as f32;
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

fn bucket(bytes: &[u8], multiplier: u64, dimensions: usize) -> usize {
    let hash = bytes
        .iter()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(u64::from(*b)));
    (hash % dimensions as u64) as usize
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
    use crate::embeddings::cosine_similarity;

    #[tokio::test]
    async fn test_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("punishment for murder").await.unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("dowry death").await.unwrap();
        let b = provider.embed("dowry death").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_related_text_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("punishment for murder section 302").await.unwrap();
        let murder = provider
            .embed("Section 302. Punishment for murder. Whoever commits murder shall be punished")
            .await
            .unwrap();
        let theft = provider
            .embed("Section 378. Theft. Whoever intending to take dishonestly any movable property")
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &murder) > cosine_similarity(&query, &theft));
    }

    #[tokio::test]
    async fn test_non_ascii_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider
            .embed("धारा 302 हत्या के लिए दंड")
            .await
            .unwrap();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
