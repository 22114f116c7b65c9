//! Embedding response types

use serde::{Deserialize, Serialize};

/// A single embedding vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    /// Index of this embedding in the batch
    index: usize,
    embedding: Vec<f32>,
}

impl Embedding {
    pub fn new(index: usize, embedding: Vec<f32>) -> Self {
        Self { index, embedding }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn vector(&self) -> &[f32] {
        &self.embedding
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }

    /// Consume and return the vector
    pub fn into_vector(self) -> Vec<f32> {
        self.embedding
    }
}

/// Usage statistics for embedding request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

impl EmbeddingUsage {
    pub fn new(prompt_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            total_tokens,
        }
    }

    pub fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }
}

/// Response from an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    model: String,
    data: Vec<Embedding>,
    usage: EmbeddingUsage,
}

impl EmbeddingResponse {
    pub fn new(model: String, data: Vec<Embedding>, usage: EmbeddingUsage) -> Self {
        Self { model, data, usage }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.data
    }

    /// Get the first embedding (for single input requests)
    pub fn first(&self) -> Option<&Embedding> {
        self.data.first()
    }

    pub fn usage(&self) -> &EmbeddingUsage {
        &self.usage
    }

    /// Consume and return the first vector
    pub fn into_first_vector(self) -> Option<Vec<f32>> {
        self.data.into_iter().next().map(Embedding::into_vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_response() {
        let embeddings = vec![
            Embedding::new(0, vec![0.1, 0.2]),
            Embedding::new(1, vec![0.3, 0.4]),
        ];
        let response =
            EmbeddingResponse::new("test-model".into(), embeddings, EmbeddingUsage::new(10, 10));

        assert_eq!(response.model(), "test-model");
        assert_eq!(response.embeddings().len(), 2);
        assert_eq!(response.first().map(Embedding::dimensions), Some(2));
        assert_eq!(response.usage().total_tokens(), 10);
        assert_eq!(response.into_first_vector(), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_empty_response_has_no_first_vector() {
        let response = EmbeddingResponse::new("m".into(), vec![], EmbeddingUsage::default());
        assert!(response.into_first_vector().is_none());
    }
}
