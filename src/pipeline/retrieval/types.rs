use serde::{Deserialize, Serialize};

use super::RetrievalError;
use crate::models::enums::{RerankMode, RetrievalMode};

/// A contiguous window of the note. Offsets are UTF-8 byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub chunk: TextChunk,
    /// 0 when retrieval ran lexical-only.
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub combined_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedCandidate {
    pub chunk: TextChunk,
    pub relevance_score: f32,
}

/// Ranked candidates plus the mode that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub mode: RetrievalMode,
    pub candidates: Vec<RetrievedCandidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reranked {
    pub mode: RerankMode,
    pub candidates: Vec<RerankedCandidate>,
}

/// Chunking strategy trait
pub trait Chunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk>;
}

/// Embedding model abstraction
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError>;
    fn dimension(&self) -> usize;
    /// Identifies the model in cache keys.
    fn model_id(&self) -> &str;
}

/// Allow `Box<dyn EmbeddingModel>` to be used as `&impl EmbeddingModel`.
impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Query/passage relevance model used for reranking.
pub trait RelevanceScorer: Send + Sync {
    /// One score per passage, higher is more relevant.
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError>;
    fn name(&self) -> &str;
}
