use std::sync::Arc;

use super::embedder::cosine_similarity;
use super::index_cache::{ChunkEmbeddings, EmbeddingIndexCache};
use super::lexical::Bm25Index;
use super::types::{EmbeddingModel, RetrievedCandidate, Retrieval, TextChunk};
use super::RetrievalError;
use crate::models::enums::RetrievalMode;

/// Semantic + BM25 retriever over one note's chunks.
///
/// Without an embedding backend, or when it errors, ranking is lexical-only
/// and every semantic score is 0.
pub struct HybridRetriever {
    embedder: Option<Arc<dyn EmbeddingModel>>,
    cache: Arc<EmbeddingIndexCache>,
    semantic_weight: f32,
    lexical_weight: f32,
}

impl HybridRetriever {
    pub fn new(
        embedder: Option<Arc<dyn EmbeddingModel>>,
        cache: Arc<EmbeddingIndexCache>,
        semantic_weight: f32,
        lexical_weight: f32,
    ) -> Self {
        Self {
            embedder,
            cache,
            semantic_weight,
            lexical_weight,
        }
    }

    /// Lexical-only retriever with default weights.
    pub fn lexical_only() -> Self {
        Self::new(None, Arc::new(EmbeddingIndexCache::default()), 0.6, 0.4)
    }

    pub fn retrieve(&self, query: &str, chunks: &[TextChunk], top_n: usize) -> Retrieval {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let lexical = Bm25Index::build(&texts).normalized_scores(query);

        let semantic = match self.semantic_scores(query, chunks) {
            Some(Ok(scores)) => Some(scores),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Embedding backend failed, using lexical-only retrieval");
                None
            }
            None => None,
        };
        let mode = if semantic.is_some() {
            RetrievalMode::Hybrid
        } else {
            RetrievalMode::LexicalOnly
        };

        let mut candidates: Vec<RetrievedCandidate> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let lexical_score = lexical[i];
                let (semantic_score, combined_score) = match &semantic {
                    Some(scores) => (
                        scores[i],
                        self.semantic_weight * scores[i] + self.lexical_weight * lexical_score,
                    ),
                    None => (0.0, lexical_score),
                };
                RetrievedCandidate {
                    chunk: chunk.clone(),
                    semantic_score,
                    lexical_score,
                    combined_score,
                }
            })
            .collect();

        // Stable: equal scores keep chunk order.
        candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        candidates.truncate(top_n);

        tracing::debug!(
            mode = %mode,
            chunks = chunks.len(),
            returned = candidates.len(),
            "Retrieved candidates"
        );

        Retrieval { mode, candidates }
    }

    fn semantic_scores(
        &self,
        query: &str,
        chunks: &[TextChunk],
    ) -> Option<Result<Vec<f32>, RetrievalError>> {
        let embedder = self.embedder.as_deref()?;
        if chunks.is_empty() {
            return Some(Ok(Vec::new()));
        }
        Some(self.embed_and_score(embedder, query, chunks))
    }

    fn embed_and_score(
        &self,
        embedder: &dyn EmbeddingModel,
        query: &str,
        chunks: &[TextChunk],
    ) -> Result<Vec<f32>, RetrievalError> {
        let index: ChunkEmbeddings = self.cache.get_or_build(embedder, chunks)?;
        let query_vec = embedder.embed(query)?;
        Ok(index
            .iter()
            .map(|v| cosine_similarity(&query_vec, v).max(0.0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retrieval::chunker::NoteChunker;
    use crate::pipeline::retrieval::embedder::MockEmbedder;
    use crate::pipeline::retrieval::types::Chunker;

    struct UnavailableEmbedder;

    impl EmbeddingModel for UnavailableEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::BackendUnavailable("http://localhost:11434".into()))
        }

        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Err(RetrievalError::BackendUnavailable("http://localhost:11434".into()))
        }

        fn dimension(&self) -> usize {
            384
        }

        fn model_id(&self) -> &str {
            "unavailable"
        }
    }

    fn chunk(id: usize, text: &str) -> TextChunk {
        TextChunk {
            chunk_id: id,
            text: text.into(),
            start_offset: id * 100,
            end_offset: id * 100 + text.len(),
        }
    }

    fn retriever(embedder: Option<Arc<dyn EmbeddingModel>>) -> HybridRetriever {
        HybridRetriever::new(embedder, Arc::new(EmbeddingIndexCache::default()), 0.6, 0.4)
    }

    #[test]
    fn hybrid_ranks_relevant_chunk_first() {
        let chunks = vec![
            chunk(0, "Patient reports mild headaches."),
            chunk(1, "Completed radiation therapy XRT on 10/15/2024."),
            chunk(2, "Neurologic exam unchanged."),
        ];
        let r = retriever(Some(Arc::new(MockEmbedder::new())));
        let result = r.retrieve("radiation therapy XRT completed finished date", &chunks, 5);

        assert_eq!(result.mode, RetrievalMode::Hybrid);
        assert_eq!(result.candidates[0].chunk.chunk_id, 1);
        let top = &result.candidates[0];
        let expected = 0.6 * top.semantic_score + 0.4 * top.lexical_score;
        assert!((top.combined_score - expected).abs() < 1e-6);
    }

    #[test]
    fn unavailable_embedder_falls_back_to_lexical() {
        let chunks = vec![
            chunk(0, "Headaches improving."),
            chunk(1, "On dexamethasone and avastin."),
        ];
        let r = retriever(Some(Arc::new(UnavailableEmbedder)));
        let result = r.retrieve("dexamethasone avastin", &chunks, 5);

        assert_eq!(result.mode, RetrievalMode::LexicalOnly);
        assert!(result.candidates.iter().all(|c| c.semantic_score == 0.0));
        assert_eq!(result.candidates[0].chunk.chunk_id, 1);
    }

    #[test]
    fn ties_keep_chunk_order() {
        let chunks: Vec<TextChunk> = (0..4).map(|i| chunk(i, "unrelated words")).collect();
        let result = HybridRetriever::lexical_only().retrieve("avastin", &chunks, 3);
        let ids: Vec<usize> = result.candidates.iter().map(|c| c.chunk.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn truncates_to_top_n() {
        let text = "steroids dexamethasone avastin bevacizumab ".repeat(60);
        let chunks = NoteChunker::new(100, 20).unwrap().chunk(&text);
        assert!(chunks.len() > 5);
        let r = retriever(Some(Arc::new(MockEmbedder::new())));
        let result = r.retrieve("medications steroids", &chunks, 5);
        assert_eq!(result.candidates.len(), 5);
        for pair in result.candidates.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
    }

    #[test]
    fn empty_chunks_return_no_candidates() {
        let r = retriever(Some(Arc::new(MockEmbedder::new())));
        let result = r.retrieve("query", &[], 5);
        assert!(result.candidates.is_empty());
        assert_eq!(result.mode, RetrievalMode::Hybrid);
    }
}
