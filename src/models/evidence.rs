use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EvidenceConfidence, ExtractionType};

/// A span of the source note cited as support for an extracted fact.
///
/// Offsets are UTF-8 byte offsets into the note. For a located item
/// `&note[start_index..end_index] == source_text`. An unlocated item has
/// `start_index == end_index == 0` and keeps the cited text as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: Uuid,
    pub source_text: String,
    pub start_index: usize,
    pub end_index: usize,
    pub category: ExtractionType,
    pub confidence: EvidenceConfidence,
    pub matched_pattern: String,
    pub relevance_score: f32,
    pub reasoning: String,
    pub located: bool,
}

impl EvidenceItem {
    /// Evidence that could not be mapped back onto the note.
    pub fn unlocated(category: ExtractionType, cited: &str, reasoning: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_text: cited.to_string(),
            start_index: 0,
            end_index: 0,
            category,
            confidence: EvidenceConfidence::Low,
            matched_pattern: "unlocated".into(),
            relevance_score: 0.0,
            reasoning: reasoning.into(),
            located: false,
        }
    }

    pub fn span_len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }
}
