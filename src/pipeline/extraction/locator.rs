//! Maps text the model cited back onto byte offsets in the note.
//!
//! Matching is tried from strict to loose: exact substring, then a
//! case- and whitespace-insensitive match, then the sentence sharing the
//! most tokens with the citation. Citations that match nothing are kept as
//! unlocated evidence rather than dropped.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{
    EvidenceConfidence, EvidenceItem, ExtractedValue, ExtractionType, RadiationDate,
};
use crate::pipeline::retrieval::lexical::tokenize;
use crate::pipeline::retrieval::RerankedCandidate;
use crate::pipeline::text::{find_dates, find_medications, sentence_spans};

/// Smallest share of citation tokens a sentence must contain to count as an
/// approximate match.
pub const MIN_TOKEN_OVERLAP: f32 = 0.5;

pub struct EvidenceLocator<'a> {
    note: &'a str,
    category: ExtractionType,
    context: &'a [RerankedCandidate],
}

impl<'a> EvidenceLocator<'a> {
    /// `context` holds the chunks the model was shown; located spans inherit
    /// the relevance of the chunk containing them.
    pub fn new(note: &'a str, category: ExtractionType, context: &'a [RerankedCandidate]) -> Self {
        Self { note, category, context }
    }

    pub fn locate(&self, value: &ExtractedValue, cited: &[String]) -> Vec<EvidenceItem> {
        if cited.is_empty() {
            return self.supporting_mentions(value);
        }
        cited.iter().map(|c| self.locate_one(c)).collect()
    }

    fn locate_one(&self, cited: &str) -> EvidenceItem {
        if let Some(start) = self.note.find(cited) {
            return self.item(
                start,
                start + cited.len(),
                EvidenceConfidence::High,
                "exact",
                "Cited text found verbatim in note",
            );
        }
        if let Some((start, end)) = normalized_find(self.note, cited) {
            return self.item(
                start,
                end,
                EvidenceConfidence::Medium,
                "normalized",
                "Cited text matched ignoring case and whitespace",
            );
        }
        if let Some((start, end, overlap)) = self.best_sentence(cited) {
            return self.item(
                start,
                end,
                EvidenceConfidence::Low,
                "approximate",
                format!("Closest sentence shares {:.0}% of cited tokens", overlap * 100.0),
            );
        }
        tracing::debug!(category = %self.category, "Cited evidence not found in note");
        EvidenceItem::unlocated(self.category, cited, "Cited text not found in note")
    }

    fn best_sentence(&self, cited: &str) -> Option<(usize, usize, f32)> {
        let cited_tokens: HashSet<String> = tokenize(cited).into_iter().collect();
        if cited_tokens.is_empty() {
            return None;
        }
        let mut best: Option<(usize, usize, f32)> = None;
        for (start, end) in sentence_spans(self.note) {
            let sentence_tokens: HashSet<String> =
                tokenize(&self.note[start..end]).into_iter().collect();
            let shared = cited_tokens.intersection(&sentence_tokens).count();
            let overlap = shared as f32 / cited_tokens.len() as f32;
            if overlap >= MIN_TOKEN_OVERLAP && best.map_or(true, |(_, _, o)| overlap > o) {
                best = Some((start, end, overlap));
            }
        }
        best
    }

    /// With nothing cited, fall back to mentions in the note that support the
    /// value: the date itself, or medication names.
    fn supporting_mentions(&self, value: &ExtractedValue) -> Vec<EvidenceItem> {
        match value {
            ExtractedValue::RadiationDate(RadiationDate::Known(date)) => find_dates(self.note)
                .into_iter()
                .filter(|(_, parsed)| parsed.as_ref() == Some(date))
                .map(|(m, _)| {
                    self.item(
                        m.start,
                        m.end,
                        EvidenceConfidence::Medium,
                        "date_mention",
                        "Date in note matches extracted radiation date",
                    )
                })
                .collect(),
            ExtractedValue::RadiationDate(RadiationDate::Unknown) => Vec::new(),
            ExtractedValue::Medications(status) => {
                if status.unknown_count() == 2 {
                    return Vec::new();
                }
                find_medications(self.note)
                    .into_iter()
                    .map(|m| {
                        self.item(
                            m.start,
                            m.end,
                            EvidenceConfidence::Low,
                            "medication_mention",
                            format!("Medication mention \"{}\" in note", m.text),
                        )
                    })
                    .collect()
            }
        }
    }

    fn item(
        &self,
        start: usize,
        end: usize,
        confidence: EvidenceConfidence,
        matched_pattern: &str,
        reasoning: impl Into<String>,
    ) -> EvidenceItem {
        EvidenceItem {
            id: Uuid::new_v4(),
            source_text: self.note[start..end].to_string(),
            start_index: start,
            end_index: end,
            category: self.category,
            confidence,
            matched_pattern: matched_pattern.to_string(),
            relevance_score: self.relevance_for(start, end),
            reasoning: reasoning.into(),
            located: true,
        }
    }

    /// Relevance of the best context chunk containing the span, falling back
    /// to any overlapping chunk.
    fn relevance_for(&self, start: usize, end: usize) -> f32 {
        let containing = self
            .context
            .iter()
            .filter(|c| c.chunk.start_offset <= start && end <= c.chunk.end_offset)
            .map(|c| c.relevance_score)
            .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s))));
        containing.unwrap_or_else(|| {
            self.context
                .iter()
                .filter(|c| c.chunk.start_offset < end && start < c.chunk.end_offset)
                .map(|c| c.relevance_score)
                .fold(0.0, f32::max)
        })
    }
}

/// Lowercased text with whitespace runs collapsed to one space. Each output
/// byte records the byte range of the input character it came from.
struct Normalized {
    text: String,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

fn normalize(input: &str) -> Normalized {
    let mut out = Normalized {
        text: String::with_capacity(input.len()),
        starts: Vec::with_capacity(input.len()),
        ends: Vec::with_capacity(input.len()),
    };
    let mut pending_space: Option<(usize, usize)> = None;

    for (i, c) in input.char_indices() {
        let end = i + c.len_utf8();
        if c.is_whitespace() {
            if pending_space.is_none() && !out.text.is_empty() {
                pending_space = Some((i, end));
            }
            continue;
        }
        if let Some((s, e)) = pending_space.take() {
            out.text.push(' ');
            out.starts.push(s);
            out.ends.push(e);
        }
        for lower in c.to_lowercase() {
            let before = out.text.len();
            out.text.push(lower);
            for _ in before..out.text.len() {
                out.starts.push(i);
                out.ends.push(end);
            }
        }
    }
    out
}

/// Find `needle` in `haystack` ignoring case and whitespace differences.
/// Returns byte offsets into the original haystack.
fn normalized_find(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle = normalize(needle).text;
    if needle.is_empty() {
        return None;
    }
    let hay = normalize(haystack);
    let pos = hay.text.find(&needle)?;
    let last = pos + needle.len() - 1;
    Some((hay.starts[pos], hay.ends[last]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvastinStatus, MedicationStatus, SteroidStatus};
    use crate::pipeline::retrieval::TextChunk;
    use chrono::NaiveDate;

    const NOTE: &str = "Oncology follow-up.\nPatient completed XRT on 10/15/2024 without complications.\nDexamethasone   4mg daily, increased from 2mg.  Avastin not started.";

    fn rad_value() -> ExtractedValue {
        ExtractedValue::RadiationDate(RadiationDate::Known(
            NaiveDate::from_ymd_opt(2024, 10, 15).unwrap(),
        ))
    }

    fn assert_round_trip(item: &EvidenceItem) {
        assert!(item.located);
        assert_eq!(&NOTE[item.start_index..item.end_index], item.source_text);
    }

    #[test]
    fn exact_match_is_high_confidence() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &[]);
        let items = locator.locate(&rad_value(), &["completed XRT on 10/15/2024".into()]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].confidence, EvidenceConfidence::High);
        assert_round_trip(&items[0]);
    }

    #[test]
    fn normalized_match_maps_back_to_original_offsets() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::Medications, &[]);
        let value = ExtractedValue::Medications(MedicationStatus {
            steroid_status: SteroidStatus::Increasing,
            avastin_status: AvastinStatus::None,
        });
        let items = locator.locate(&value, &["dexamethasone 4mg DAILY".into()]);
        assert_eq!(items[0].confidence, EvidenceConfidence::Medium);
        assert_eq!(items[0].source_text, "Dexamethasone   4mg daily");
        assert_round_trip(&items[0]);
    }

    #[test]
    fn paraphrase_matches_closest_sentence() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &[]);
        let items = locator.locate(&rad_value(), &["XRT completed 10/15/2024".into()]);
        assert_eq!(items[0].confidence, EvidenceConfidence::Low);
        assert!(items[0].source_text.starts_with("Patient completed XRT"));
        assert_round_trip(&items[0]);
    }

    #[test]
    fn unmatched_citation_is_unlocated() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &[]);
        let items = locator.locate(&rad_value(), &["proton therapy in Boston".into()]);
        assert!(!items[0].located);
        assert_eq!(items[0].start_index, 0);
        assert_eq!(items[0].end_index, 0);
        assert_eq!(items[0].source_text, "proton therapy in Boston");
    }

    #[test]
    fn no_citation_falls_back_to_date_mention() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &[]);
        let items = locator.locate(&rad_value(), &[]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_text, "10/15/2024");
        assert_round_trip(&items[0]);
    }

    #[test]
    fn no_citation_unknown_date_has_no_evidence() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &[]);
        let value = ExtractedValue::RadiationDate(RadiationDate::Unknown);
        assert!(locator.locate(&value, &[]).is_empty());
    }

    #[test]
    fn no_citation_falls_back_to_medication_mentions() {
        let locator = EvidenceLocator::new(NOTE, ExtractionType::Medications, &[]);
        let value = ExtractedValue::Medications(MedicationStatus {
            steroid_status: SteroidStatus::Increasing,
            avastin_status: AvastinStatus::None,
        });
        let items = locator.locate(&value, &[]);
        let names: Vec<&str> = items.iter().map(|i| i.source_text.as_str()).collect();
        assert_eq!(names, vec!["Dexamethasone", "Avastin"]);
        items.iter().for_each(assert_round_trip);
    }

    #[test]
    fn relevance_comes_from_containing_chunk() {
        let start = NOTE.find("Patient").unwrap();
        let context = vec![RerankedCandidate {
            chunk: TextChunk {
                chunk_id: 1,
                text: NOTE[start..].to_string(),
                start_offset: start,
                end_offset: NOTE.len(),
            },
            relevance_score: 0.87,
        }];
        let locator = EvidenceLocator::new(NOTE, ExtractionType::RadiationDate, &context);
        let items = locator.locate(&rad_value(), &["10/15/2024".into()]);
        assert!((items[0].relevance_score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn normalize_handles_multibyte_characters() {
        let text = "Patiënt  ÉTAIT stable";
        let (s, e) = normalized_find(text, "patiënt était").unwrap();
        assert_eq!(&text[s..e], "Patiënt  ÉTAIT");
    }
}
