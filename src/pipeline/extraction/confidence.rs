use crate::models::{ExtractionMethod, EvidenceItem};

/// Extraction confidence constants (0-100 scale)
pub mod thresholds {
    /// Starting score when the model reports no confidence of its own.
    pub const BASE: f32 = 80.0;

    /// Added per evidence item found in the note.
    pub const PER_LOCATED_EVIDENCE: f32 = 10.0;

    /// Ceiling after evidence bonuses.
    pub const EVIDENCE_CAP: f32 = 95.0;

    /// Fraction removed per field that came back unknown.
    pub const UNKNOWN_FIELD_PENALTY: f32 = 0.3;

    /// Subtracted per documented fallback taken.
    pub const DEGRADED_PENALTY: f32 = 10.0;

    /// Ceiling for pattern extraction.
    pub const PATTERN_CAP: f32 = 60.0;
}

/// Inputs to [`score_extraction`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    /// Self-reported confidence in [0, 1].
    pub model_confidence: Option<f32>,
    pub located_evidence: usize,
    pub unknown_fields: usize,
    pub invalid_fields: usize,
    pub degraded_tags: usize,
    pub method: ExtractionMethod,
}

/// Score one extraction on a 0-100 scale.
pub fn score_extraction(inputs: &ConfidenceInputs) -> f32 {
    if inputs.invalid_fields > 0 {
        return 0.0;
    }

    let base = inputs
        .model_confidence
        .map(|c| c.clamp(0.0, 1.0) * 100.0)
        .unwrap_or(thresholds::BASE);
    let with_evidence = (base
        + thresholds::PER_LOCATED_EVIDENCE * inputs.located_evidence as f32)
        .min(thresholds::EVIDENCE_CAP);

    let unknown_factor =
        (1.0 - thresholds::UNKNOWN_FIELD_PENALTY * inputs.unknown_fields as f32).max(0.0);
    let mut score =
        with_evidence * unknown_factor - thresholds::DEGRADED_PENALTY * inputs.degraded_tags as f32;

    if inputs.method == ExtractionMethod::Pattern {
        score = score.min(thresholds::PATTERN_CAP);
    }
    score.clamp(0.0, 100.0)
}

pub fn located_count(evidence: &[EvidenceItem]) -> usize {
    evidence.iter().filter(|e| e.located).count()
}
