use crate::models::{ConfidenceLevel, ConfidenceReport};

/// Decision confidence deductions (0-100 scale)
pub mod thresholds {
    /// Extraction confidence below this costs `LOW_FIELD_PENALTY`.
    pub const LOW_FIELD: f32 = 50.0;
    /// Extraction confidence below this costs `MODERATE_FIELD_PENALTY`.
    pub const MODERATE_FIELD: f32 = 80.0;

    pub const LOW_FIELD_PENALTY: f32 = 20.0;
    pub const MODERATE_FIELD_PENALTY: f32 = 10.0;
    pub const MISSING_VOLUME_PENALTY: f32 = 15.0;
    pub const MISSING_ITEM_PENALTY: f32 = 5.0;

    /// At or above: high.
    pub const HIGH: f32 = 80.0;
    /// At or above: medium.
    pub const MEDIUM: f32 = 60.0;
}

/// One overall confidence for a decision run. Every deduction is recorded
/// as a factor.
pub fn aggregate(
    extraction_confidences: &[f32],
    volume_data_available: bool,
    missing_info_count: usize,
) -> ConfidenceReport {
    let mut overall = 100.0_f32;
    let mut factors = Vec::new();

    for (i, &c) in extraction_confidences.iter().enumerate() {
        if c < thresholds::LOW_FIELD {
            overall -= thresholds::LOW_FIELD_PENALTY;
            factors.push(format!(
                "Extraction {} low confidence ({c:.0}): -{}",
                i + 1,
                thresholds::LOW_FIELD_PENALTY
            ));
        } else if c < thresholds::MODERATE_FIELD {
            overall -= thresholds::MODERATE_FIELD_PENALTY;
            factors.push(format!(
                "Extraction {} moderate confidence ({c:.0}): -{}",
                i + 1,
                thresholds::MODERATE_FIELD_PENALTY
            ));
        }
    }

    if !volume_data_available {
        overall -= thresholds::MISSING_VOLUME_PENALTY;
        factors.push(format!(
            "Volume data unavailable: -{}",
            thresholds::MISSING_VOLUME_PENALTY
        ));
    }

    if missing_info_count > 0 {
        let penalty = thresholds::MISSING_ITEM_PENALTY * missing_info_count as f32;
        overall -= penalty;
        factors.push(format!("{missing_info_count} missing information item(s): -{penalty}"));
    }

    let overall = overall.max(0.0);
    ConfidenceReport {
        overall,
        level: level_for(overall),
        factors,
    }
}

pub fn level_for(overall: f32) -> ConfidenceLevel {
    if overall >= thresholds::HIGH {
        ConfidenceLevel::High
    } else if overall >= thresholds::MEDIUM {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}
