use super::types::{Chunker, TextChunk};
use super::RetrievalError;

/// Fixed-window chunker with a constant character overlap.
///
/// Windows are measured in characters so consecutive chunks overlap by
/// exactly `overlap` characters; offsets are reported as byte offsets on
/// character boundaries.
pub struct NoteChunker {
    chunk_size: usize,
    overlap: usize,
}

impl NoteChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RetrievalError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(RetrievalError::InvalidChunking {
                size: chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for NoteChunker {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            overlap: 150,
        }
    }
}

impl Chunker for NoteChunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        // Byte offset of every character start, plus the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;
        if char_count == 0 {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(char_count);
            let (start_offset, end_offset) = (boundaries[start], boundaries[end]);
            chunks.push(TextChunk {
                chunk_id: chunks.len(),
                text: text[start_offset..end_offset].to_string(),
                start_offset,
                end_offset,
            });
            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(text: &str, chunks: &[TextChunk]) {
        assert_eq!(chunks.first().unwrap().start_offset, 0);
        assert_eq!(chunks.last().unwrap().end_offset, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset <= pair[0].end_offset, "gap between chunks");
        }
        for c in chunks {
            assert_eq!(&text[c.start_offset..c.end_offset], c.text);
        }
    }

    #[test]
    fn empty_note_returns_empty() {
        let chunker = NoteChunker::default();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn short_note_is_single_chunk() {
        let chunker = NoteChunker::default();
        let text = "Patient on dexamethasone 4mg daily.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn consecutive_chunks_overlap_exactly() {
        let chunker = NoteChunker::new(100, 30).unwrap();
        let text = "abcdefghij".repeat(37);
        let chunks = chunker.chunk(&text);

        assert_covers(&text, &chunks);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_offset - pair[1].start_offset, 30);
        }
        assert!(chunks.iter().all(|c| c.text.len() <= 100));
    }

    #[test]
    fn default_sizes_cover_long_note() {
        let chunker = NoteChunker::default();
        let text = "MRI brain shows stable FLAIR signal. ".repeat(100);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        assert_covers(&text, &chunks);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_offset - pair[1].start_offset, 150);
        }
    }

    #[test]
    fn multibyte_text_stays_on_char_boundaries() {
        let chunker = NoteChunker::new(10, 3).unwrap();
        let text = "Ödem ↑ nach Radiatio, Kontrast stabil — Verlauf µl".to_string();
        let chunks = chunker.chunk(&text);
        assert_covers(&text, &chunks);
        for pair in chunks.windows(2) {
            let overlap = &text[pair[1].start_offset..pair[0].end_offset];
            assert_eq!(overlap.chars().count(), 3);
        }
    }

    #[test]
    fn chunk_ids_are_sequential() {
        let chunker = NoteChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&"x".repeat(70));
        let ids: Vec<usize> = chunks.iter().map(|c| c.chunk_id).collect();
        assert_eq!(ids, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn overlap_not_smaller_than_size_rejected() {
        assert!(matches!(
            NoteChunker::new(100, 100),
            Err(RetrievalError::InvalidChunking { size: 100, overlap: 100 })
        ));
        assert!(NoteChunker::new(0, 0).is_err());
    }
}
