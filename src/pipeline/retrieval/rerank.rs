use std::sync::Arc;

use super::lexical::tokenize;
use super::types::{RelevanceScorer, RerankedCandidate, Reranked, RetrievedCandidate};
use super::RetrievalError;
use crate::models::enums::RerankMode;
use crate::pipeline::text;

/// Reorders retrieved candidates by query relevance.
///
/// Without a scorer, or when it errors, candidates pass through in
/// combined-score order truncated to top K. That identity mode is expected
/// operation, not a failure.
pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>) -> Self {
        Self { scorer }
    }

    pub fn identity() -> Self {
        Self { scorer: None }
    }

    pub fn rerank(&self, query: &str, candidates: &[RetrievedCandidate], top_k: usize) -> Reranked {
        let Some(scorer) = self.scorer.as_deref() else {
            return identity(candidates, top_k);
        };

        let passages: Vec<&str> = candidates.iter().map(|c| c.chunk.text.as_str()).collect();
        let scores = match scorer.score(query, &passages) {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    scorer = scorer.name(),
                    expected = candidates.len(),
                    got = scores.len(),
                    "Reranker returned wrong number of scores, passing candidates through"
                );
                return identity(candidates, top_k);
            }
            Err(e) => {
                tracing::warn!(scorer = scorer.name(), error = %e, "Reranking failed, passing candidates through");
                return identity(candidates, top_k);
            }
        };

        let mut reranked: Vec<RerankedCandidate> = candidates
            .iter()
            .zip(scores)
            .map(|(c, relevance_score)| RerankedCandidate {
                chunk: c.chunk.clone(),
                relevance_score,
            })
            .collect();
        reranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        reranked.truncate(top_k);

        Reranked {
            mode: RerankMode::Scored,
            candidates: reranked,
        }
    }
}

fn identity(candidates: &[RetrievedCandidate], top_k: usize) -> Reranked {
    let mut ordered: Vec<&RetrievedCandidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    Reranked {
        mode: RerankMode::Identity,
        candidates: ordered
            .into_iter()
            .take(top_k)
            .map(|c| RerankedCandidate {
                chunk: c.chunk.clone(),
                relevance_score: c.combined_score,
            })
            .collect(),
    }
}

// ═══════════════════════════════════════════════════════════
// Keyword relevance scorer
// ═══════════════════════════════════════════════════════════

const MEDICATION_TERMS: &[&str] = &["dexamethasone", "steroid", "avastin", "bevacizumab", "dose", "mg"];
const RADIATION_QUERY_TERMS: &[&str] = &["radiation", "xrt", "radiotherapy", "chemoradiation"];

/// Term-matching relevance scorer for use without a cross-encoder model.
///
/// Medication queries score +0.1 per medication term in the passage (at
/// most +0.5); radiation queries score +0.3 for a date and +0.2 for a
/// radiation term. Other queries score +0.1 per shared token (at most
/// +0.5). All scores start at 0.5 and are capped at 1.0.
pub struct KeywordRelevanceScorer;

impl KeywordRelevanceScorer {
    fn score_one(query_tokens: &[String], passage: &str) -> f32 {
        let lower = passage.to_lowercase();
        let mentions = |terms: &[&str]| query_tokens.iter().any(|t| terms.contains(&t.as_str()));

        let bonus = if mentions(RADIATION_QUERY_TERMS) {
            let date = if text::has_date(passage) { 0.3 } else { 0.0 };
            let term = if text::has_radiation_term(passage) { 0.2 } else { 0.0 };
            date + term
        } else if mentions(MEDICATION_TERMS) || query_tokens.iter().any(|t| t == "medications") {
            let matches = MEDICATION_TERMS.iter().filter(|t| lower.contains(*t)).count();
            (matches as f32 * 0.1).min(0.5)
        } else {
            let passage_tokens = tokenize(passage);
            let shared = query_tokens
                .iter()
                .filter(|t| passage_tokens.contains(t))
                .count();
            (shared as f32 * 0.1).min(0.5)
        };

        (0.5 + bonus).min(1.0)
    }
}

impl RelevanceScorer for KeywordRelevanceScorer {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError> {
        let query_tokens = tokenize(query);
        Ok(passages
            .iter()
            .map(|p| Self::score_one(&query_tokens, p))
            .collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX cross-encoder (feature `onnx-embeddings`)
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{RelevanceScorer, RetrievalError};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// bge-reranker-v2-m3 exported to ONNX. Scores are sigmoid(logit).
    ///
    /// `model_dir` must contain `model.onnx` and `tokenizer.json`.
    pub struct OnnxCrossEncoder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxCrossEncoder {
        pub fn load(model_dir: &Path) -> Result<Self, RetrievalError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(RetrievalError::ModelNotFound(model_path));
            }
            if !tokenizer_path.exists() {
                return Err(RetrievalError::ModelNotFound(tokenizer_path));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| RetrievalError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| {
                    RetrievalError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| RetrievalError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            tracing::info!(dir = %model_dir.display(), "ONNX cross-encoder loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        fn score_pair(&self, query: &str, passage: &str) -> Result<f32, RetrievalError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode((query, passage), true)
                .map_err(|e| RetrievalError::Tokenization(e.to_string()))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let seq_len = input_ids.len();

            let ids = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
                .map_err(|e| RetrievalError::Scoring(e.to_string()))?;
            let mask = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)
                .map_err(|e| RetrievalError::Scoring(e.to_string()))?;
            let ids_tensor = TensorRef::from_array_view(&ids)
                .map_err(|e| RetrievalError::Scoring(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask)
                .map_err(|e| RetrievalError::Scoring(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| RetrievalError::Scoring("Session lock poisoned".to_string()))?;
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor])
                .map_err(|e| RetrievalError::Scoring(format!("ONNX inference failed: {e}")))?;

            // Logits: [1, 1]
            let (_, logits) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| RetrievalError::Scoring(format!("Output extraction: {e}")))?;
            let logit = logits
                .first()
                .copied()
                .ok_or_else(|| RetrievalError::Scoring("Empty logits".into()))?;

            Ok(1.0 / (1.0 + (-logit).exp()))
        }
    }

    impl RelevanceScorer for OnnxCrossEncoder {
        fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, RetrievalError> {
            passages.iter().map(|p| self.score_pair(query, p)).collect()
        }

        fn name(&self) -> &str {
            crate::config::RERANKER_MODEL
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxCrossEncoder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::retrieval::types::TextChunk;

    struct BrokenScorer;

    impl RelevanceScorer for BrokenScorer {
        fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::ModelInit("model weights missing".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn candidate(id: usize, text: &str, combined: f32) -> RetrievedCandidate {
        RetrievedCandidate {
            chunk: TextChunk {
                chunk_id: id,
                text: text.into(),
                start_offset: 0,
                end_offset: text.len(),
            },
            semantic_score: combined,
            lexical_score: combined,
            combined_score: combined,
        }
    }

    fn candidates() -> Vec<RetrievedCandidate> {
        vec![
            candidate(0, "Follow-up MRI next month.", 0.9),
            candidate(1, "Completed radiation therapy on 10/15/2024.", 0.8),
            candidate(2, "Headache resolved.", 0.7),
            candidate(3, "XRT planning discussed.", 0.6),
        ]
    }

    #[test]
    fn no_scorer_is_identity_truncated() {
        let result = Reranker::identity().rerank("radiation", &candidates(), 3);
        assert_eq!(result.mode, RerankMode::Identity);
        let ids: Vec<usize> = result.candidates.iter().map(|c| c.chunk.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(result.candidates[0].relevance_score, 0.9);
    }

    #[test]
    fn failing_scorer_falls_back_to_identity() {
        let reranker = Reranker::new(Some(Arc::new(BrokenScorer)));
        let result = reranker.rerank("radiation", &candidates(), 2);
        assert_eq!(result.mode, RerankMode::Identity);
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].chunk.chunk_id, 0);
    }

    #[test]
    fn keyword_scorer_promotes_dated_radiation_chunk() {
        let reranker = Reranker::new(Some(Arc::new(KeywordRelevanceScorer)));
        let result = reranker.rerank(
            "radiation therapy XRT completed finished date",
            &candidates(),
            3,
        );
        assert_eq!(result.mode, RerankMode::Scored);
        assert_eq!(result.candidates[0].chunk.chunk_id, 1);
        assert!((result.candidates[0].relevance_score - 1.0).abs() < 1e-6);
        // XRT term without a date: 0.5 + 0.2
        assert_eq!(result.candidates[1].chunk.chunk_id, 3);
        assert!((result.candidates[1].relevance_score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn keyword_scorer_medication_bonus_is_capped() {
        let scores = KeywordRelevanceScorer
            .score(
                "medications steroids dexamethasone avastin bevacizumab treatment",
                &[
                    "dexamethasone steroid avastin bevacizumab dose 4mg",
                    "dexamethasone 4mg",
                    "no relevant content",
                ],
            )
            .unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!((scores[1] - 0.7).abs() < 1e-6);
        assert!((scores[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_candidates_rerank_to_empty() {
        let reranker = Reranker::new(Some(Arc::new(KeywordRelevanceScorer)));
        assert!(reranker.rerank("q", &[], 3).candidates.is_empty());
    }
}
