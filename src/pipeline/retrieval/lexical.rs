//! BM25 ranking over a note's chunks treated as a small corpus.

use std::collections::{HashMap, HashSet};

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// Lowercased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

pub struct Bm25Index {
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f32,
    doc_freqs: HashMap<String, usize>,
}

impl Bm25Index {
    pub fn build(documents: &[&str]) -> Self {
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut doc_lens = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let tokens = tokenize(doc);
            doc_lens.push(tokens.len());
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_default() += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(tf);
        }

        let total: usize = doc_lens.iter().sum();
        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            total as f32 / doc_lens.len() as f32
        };

        Self {
            term_freqs,
            doc_lens,
            avg_doc_len,
            doc_freqs,
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.term_freqs.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw BM25 score of every document, in document order.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(tf, &len)| {
                let norm = if self.avg_doc_len > 0.0 {
                    1.0 - B + B * len as f32 / self.avg_doc_len
                } else {
                    1.0
                };
                terms
                    .iter()
                    .filter_map(|term| tf.get(term).map(|&f| (term, f as f32)))
                    .map(|(term, f)| self.idf(term) * f * (K1 + 1.0) / (f + K1 * norm))
                    .sum()
            })
            .collect()
    }

    /// Scores scaled into [0, 1] by the best document.
    pub fn normalized_scores(&self, query: &str) -> Vec<f32> {
        let scores = self.scores(query);
        let max = scores.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return vec![0.0; scores.len()];
        }
        scores.into_iter().map(|s| s / max).collect()
    }
}
