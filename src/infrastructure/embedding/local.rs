//! Offline embedding provider based on feature hashing

use async_trait::async_trait;

use crate::domain::embedding::{
    Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
};
use crate::domain::DomainError;

const MODEL_NAME: &str = "local-hashing-v1";
const DEFAULT_DIMENSIONS: usize = 256;
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic embedder that needs no network or credentials
///
/// Lower-cased word unigrams and character trigrams are hashed into a
/// fixed number of signed buckets and the result is L2-normalised, so
/// texts sharing vocabulary land close together under cosine distance.
/// It is far weaker than a trained model but stable across processes
/// and releases.
#[derive(Debug, Clone)]
pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::configuration(
                "Local embedding dimensions must be greater than zero",
            ));
        }
        Ok(Self { dimensions })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Err(DomainError::validation(
                "Text has no word characters to embed",
            ));
        }

        for word in &words {
            self.add_feature(&mut vector, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, trigram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        Ok(vector)
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
        if let Some(dims) = request.dimensions() {
            if dims != self.dimensions {
                return Err(DomainError::validation(format!(
                    "Requested {} dimensions but local provider produces {}",
                    dims, self.dimensions
                )));
            }
        }

        let inputs = request.inputs();
        let embeddings = inputs
            .iter()
            .enumerate()
            .map(|(idx, text)| Ok(Embedding::new(idx, self.embed_text(text)?)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        let tokens = inputs
            .iter()
            .map(|t| t.split_whitespace().count())
            .sum::<usize>() as u32;

        Ok(EmbeddingResponse::new(
            MODEL_NAME.to_string(),
            embeddings,
            EmbeddingUsage::new(tokens, tokens),
        ))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }

    fn default_model(&self) -> &'static str {
        MODEL_NAME
    }

    fn dimensions(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DistanceMetric;

    async fn vector(provider: &LocalEmbeddingProvider, text: &str) -> Vec<f32> {
        provider
            .embed(EmbeddingRequest::single(MODEL_NAME, text))
            .await
            .unwrap()
            .into_first_vector()
            .unwrap()
    }

    #[tokio::test]
    async fn test_vectors_are_normalised_and_sized() {
        let provider = LocalEmbeddingProvider::new();
        let v = vector(&provider, "What is the capital of France?").await;

        assert_eq!(v.len(), DEFAULT_DIMENSIONS);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_same_text_gives_same_vector() {
        let provider = LocalEmbeddingProvider::new();
        let a = vector(&provider, "Hello World").await;
        let b = vector(&provider, "hello world").await;

        assert_eq!(a, b);
        assert_eq!(DistanceMetric::Cosine.distance(&a, &b), Some(0.0));
    }

    #[tokio::test]
    async fn test_paraphrase_is_closer_than_unrelated_text() {
        let provider = LocalEmbeddingProvider::new();
        let base = vector(&provider, "What is the capital of France?").await;
        let paraphrase = vector(&provider, "Tell me the capital city of France").await;
        let unrelated = vector(&provider, "How do I bake sourdough bread").await;

        let near = DistanceMetric::Cosine.distance(&base, &paraphrase).unwrap();
        let far = DistanceMetric::Cosine.distance(&base, &unrelated).unwrap();
        assert!(near < far, "near={near} far={far}");
    }

    #[tokio::test]
    async fn test_text_without_words_is_rejected() {
        let provider = LocalEmbeddingProvider::new();
        let result = provider
            .embed(EmbeddingRequest::single(MODEL_NAME, "?!"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mismatched_requested_dimensions() {
        let provider = LocalEmbeddingProvider::with_dimensions(64).unwrap();
        assert_eq!(provider.dimensions("anything"), Some(64));

        let result = provider
            .embed(EmbeddingRequest::single(MODEL_NAME, "hi").with_dimensions(32))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_dimensions_is_configuration_error() {
        let error = LocalEmbeddingProvider::with_dimensions(0).unwrap_err();
        assert!(error.is_configuration());
    }
}
