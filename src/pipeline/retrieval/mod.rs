pub mod types;
pub mod chunker;
pub mod embedder;
pub mod lexical;
pub mod index_cache;
pub mod hybrid;
pub mod rerank;

pub use types::*;
pub use chunker::*;
pub use embedder::*;
pub use index_cache::*;
pub use hybrid::*;
pub use rerank::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Embedding backend unavailable at {0}")]
    BackendUnavailable(String),

    #[error("Backend returned error (status {status}): {body}")]
    BackendError { status: u16, body: String },

    #[error("Backend request timed out after {0}s")]
    Timeout(u64),

    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Relevance scoring failed: {0}")]
    Scoring(String),

    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("Embedding index lock poisoned")]
    LockPoisoned,
}
