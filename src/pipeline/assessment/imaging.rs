//! Volumetric imaging rules: per-signal classification, the enhancement
//! priority rule for mixed patterns, and the component and extent questions
//! asked of worsening scans.

use crate::models::{ImagingCategory, VolumeAssessment, WorseComponent, WorseningExtent};
use crate::pipeline_config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagingThresholds {
    /// ± percent change still counted as stable.
    pub stability_pct: f64,
    /// Percent increase above which worsening is major.
    pub progression_pct: f64,
    /// Absolute change in mL below which a signal is stable regardless of
    /// its percent change.
    pub measurable_ml: f64,
}

impl Default for ImagingThresholds {
    fn default() -> Self {
        Self {
            stability_pct: 10.0,
            progression_pct: 40.0,
            measurable_ml: 1.0,
        }
    }
}

impl ImagingThresholds {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            stability_pct: config.stability_threshold_pct,
            progression_pct: config.progression_threshold_pct,
            measurable_ml: config.measurable_change_ml,
        }
    }
}

/// Classify one signal from its percent change and, when known, its
/// absolute change in mL.
pub fn classify_signal(
    pct: f64,
    abs_change: Option<f64>,
    th: &ImagingThresholds,
) -> (ImagingCategory, String) {
    if let Some(abs) = abs_change {
        if abs.abs() < th.measurable_ml {
            return (
                ImagingCategory::Stable,
                format!("Absolute change {abs:.2}ml < {}ml threshold", th.measurable_ml),
            );
        }
    }
    if pct > th.stability_pct {
        (ImagingCategory::Worse, format!("Increased {pct:.1}%"))
    } else if pct < -th.stability_pct {
        (ImagingCategory::Improved, format!("Decreased {pct:.1}%"))
    } else {
        (
            ImagingCategory::Stable,
            format!("Stable {pct:.1}% (within ±{}%)", th.stability_pct),
        )
    }
}

/// Combine FLAIR and enhancement into one imaging category.
///
/// When the two signals move in opposite directions and neither is stable,
/// the enhancement signal decides. Otherwise worse outranks improved, which
/// outranks stable.
pub fn resolve(
    flair_pct: f64,
    enh_pct: f64,
    flair_abs: Option<f64>,
    enh_abs: Option<f64>,
    th: &ImagingThresholds,
) -> VolumeAssessment {
    let (flair_category, flair_reason) = classify_signal(flair_pct, flair_abs, th);
    let (enhancement_category, enh_reason) = classify_signal(enh_pct, enh_abs, th);

    let mixed_pattern = flair_category != enhancement_category
        && flair_category != ImagingCategory::Stable
        && enhancement_category != ImagingCategory::Stable;

    let (category, reasoning) = if mixed_pattern {
        (
            enhancement_category,
            format!(
                "Mixed pattern - Enhancement priority: ENH {enh_reason}{} (FLAIR {flair_reason}{})",
                ml_suffix(enh_abs),
                ml_suffix(flair_abs),
            ),
        )
    } else {
        let dominant = [ImagingCategory::Worse, ImagingCategory::Improved]
            .into_iter()
            .find(|c| flair_category == *c || enhancement_category == *c);
        match dominant {
            Some(c) => {
                let mut reasons = Vec::new();
                if flair_category == c {
                    reasons.push(format!("FLAIR {flair_reason}"));
                }
                if enhancement_category == c {
                    reasons.push(format!("ENH {enh_reason}"));
                }
                (c, reasons.join(" and "))
            }
            None => (
                ImagingCategory::Stable,
                format!("FLAIR {flair_reason}, ENH {enh_reason}"),
            ),
        }
    };

    VolumeAssessment {
        flair_change_pct: flair_pct,
        enhancement_change_pct: enh_pct,
        flair_abs_change: flair_abs,
        enh_abs_change: enh_abs,
        flair_category,
        enhancement_category,
        mixed_pattern,
        category,
        reasoning,
    }
}

fn ml_suffix(abs: Option<f64>) -> String {
    abs.map(|a| format!(" ({a:+.2}ml)")).unwrap_or_default()
}

/// Which components are worse: a signal counts when it classifies as worse.
pub fn what_is_worse(assessment: &VolumeAssessment) -> (WorseComponent, String) {
    let flair_worse = assessment.flair_category == ImagingCategory::Worse;
    let enh_worse = assessment.enhancement_category == ImagingCategory::Worse;
    let flair = assessment.flair_change_pct;
    let enh = assessment.enhancement_change_pct;

    match (flair_worse, enh_worse) {
        (true, true) => (
            WorseComponent::FlairAndEnh,
            format!("Both components worse: FLAIR {flair:+.1}%, ENH {enh:+.1}%"),
        ),
        (true, false) => (
            WorseComponent::FlairOrEnh,
            format!("FLAIR worse: {flair:+.1}% (ENH {enh:+.1}%)"),
        ),
        (false, true) => (
            WorseComponent::FlairOrEnh,
            format!("Enhancement worse: {enh:+.1}% (FLAIR {flair:+.1}%)"),
        ),
        (false, false) => (
            WorseComponent::Unknown,
            format!("No significant worsening: FLAIR {flair:+.1}%, ENH {enh:+.1}%"),
        ),
    }
}

/// Size of the larger increase against the progression threshold.
pub fn how_much_worse(
    flair_pct: f64,
    enh_pct: f64,
    th: &ImagingThresholds,
) -> (WorseningExtent, String) {
    let max_increase = flair_pct.max(enh_pct);
    if max_increase > th.progression_pct {
        let component = if flair_pct >= enh_pct { "FLAIR" } else { "Enhancement" };
        (
            WorseningExtent::Major,
            format!(
                "{component} increased {max_increase:.1}% (>{}% threshold)",
                th.progression_pct
            ),
        )
    } else if max_increase > 0.0 {
        (
            WorseningExtent::Minor,
            format!(
                "Maximum increase {max_increase:.1}% (≤{}% threshold)",
                th.progression_pct
            ),
        )
    } else {
        (
            WorseningExtent::Unknown,
            format!("No positive changes to evaluate: FLAIR {flair_pct:+.1}%, ENH {enh_pct:+.1}%"),
        )
    }
}
