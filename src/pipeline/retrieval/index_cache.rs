//! Per-note embedding index cache with idle eviction.
//!
//! The key covers the embedding model and every chunk's text, so an entry is
//! only ever reused for the same note chunked the same way.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::types::{EmbeddingModel, TextChunk};
use super::RetrievalError;

pub type ChunkEmbeddings = Arc<Vec<Vec<f32>>>;

struct CachedIndex {
    embeddings: ChunkEmbeddings,
    last_used: Instant,
}

pub struct EmbeddingIndexCache {
    entries: Mutex<HashMap<String, CachedIndex>>,
    idle_timeout: Duration,
}

impl EmbeddingIndexCache {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Return the cached embeddings for these chunks, embedding them on a miss.
    ///
    /// The lock is not held while embedding; two concurrent misses for the
    /// same note both embed and the later insert wins.
    pub fn get_or_build(
        &self,
        embedder: &dyn EmbeddingModel,
        chunks: &[TextChunk],
    ) -> Result<ChunkEmbeddings, RetrievalError> {
        let key = cache_key(embedder.model_id(), chunks);

        {
            let mut entries = self.entries.lock().map_err(|_| RetrievalError::LockPoisoned)?;
            if let Some(entry) = entries.get_mut(&key) {
                entry.last_used = Instant::now();
                tracing::debug!(chunks = chunks.len(), "Embedding index cache hit");
                return Ok(Arc::clone(&entry.embeddings));
            }
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = Arc::new(embedder.embed_batch(&texts)?);
        if embeddings.len() != chunks.len() {
            return Err(RetrievalError::Embedding(format!(
                "Backend returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut entries = self.entries.lock().map_err(|_| RetrievalError::LockPoisoned)?;
        entries.insert(
            key,
            CachedIndex {
                embeddings: Arc::clone(&embeddings),
                last_used: Instant::now(),
            },
        );
        tracing::debug!(chunks = chunks.len(), cached = entries.len(), "Embedding index built");
        Ok(embeddings)
    }

    /// Drop entries idle for longer than the timeout. Returns how many.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.last_used) <= self.idle_timeout);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle embedding indexes");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for EmbeddingIndexCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

fn cache_key(model_id: &str, chunks: &[TextChunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    for chunk in chunks {
        hasher.update((chunk.start_offset as u64).to_le_bytes());
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
