//! Embedding providers for the knowledge store.
//!
//! The same provider must be used to build a collection and to query it;
//! the store records the provider name per collection and checks it.

pub mod providers;

use juris_core::{AppError, AppResult, KnowledgeSettings};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from knowledge settings.
///
/// `endpoint` overrides the Ollama base URL.
pub fn create_provider(
    settings: &KnowledgeSettings,
    endpoint: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if settings.embedding_dims == 0 {
        return Err(AppError::Config(
            "knowledge.embeddingDims must be at least 1".to_string(),
        ));
    }

    match settings.embedding_provider.as_str() {
        "trigram" => Ok(Arc::new(providers::TrigramProvider::new(
            settings.embedding_dims,
        ))),

        "ollama" => Ok(Arc::new(providers::OllamaProvider::new(
            endpoint,
            &settings.embedding_model,
            settings.embedding_dims,
        )?)),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}

/// Cosine similarity between two vectors; 0.0 on length mismatch or zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let settings = KnowledgeSettings::default();
        let provider = create_provider(&settings, None).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_ollama_provider_is_lazy() {
        let settings = KnowledgeSettings {
            embedding_provider: "ollama".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dims: 768,
            ..Default::default()
        };

        let provider = create_provider(&settings, Some("http://127.0.0.1:9")).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = KnowledgeSettings {
            embedding_provider: "gguf".to_string(),
            ..Default::default()
        };

        let result = create_provider(&settings, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_embed_single_via_default_method() {
        let provider = create_provider(&KnowledgeSettings::default(), None).unwrap();
        let embedding = provider.embed("criminal breach of trust").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
