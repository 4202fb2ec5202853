//! Walks the flowchart from note intake to a BT-RADS outcome.
//!
//! The walk is deterministic: identical facts, volumes and config produce an
//! identical [`Decision`], path included.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{
    AlgorithmPath, AlternativePath, Decision, DecisionPoint, ExtractedFacts, FlowTarget,
    MissingInfo, NodeId, VolumeAssessment, VolumeInputs,
};
use crate::pipeline::assessment::{aggregate, days_between, resolve, ImagingThresholds};
use crate::pipeline_config::PipelineConfig;

use super::flowchart::{node_spec, DecisionContext};
use super::DecisionError;

/// Upper bound on nodes visited in one walk. The longest flowchart path
/// visits seven.
pub const MAX_STEPS: usize = 16;

/// Score one follow-up study.
///
/// Errors only on malformed numeric input. Missing facts take each node's
/// default branch and are reported in `missing_info`.
pub fn decide(
    facts: &ExtractedFacts,
    volumes: &VolumeInputs,
    config: &PipelineConfig,
) -> Result<Decision, DecisionError> {
    validate_volumes(volumes)?;
    let thresholds = ImagingThresholds::from_config(config);
    let assessment = assess(facts, volumes, &thresholds)?;

    let ctx = DecisionContext {
        facts,
        volumes,
        thresholds,
        treatment_window_days: config.treatment_window_days,
        assessment,
        days_since_radiation: days_since_radiation(facts, volumes),
    };

    let mut path = AlgorithmPath::new();
    let mut missing: Vec<MissingInfo> = facts.missing_info.clone();
    let mut current = NodeId::NoteIntake;

    for _ in 0..MAX_STEPS {
        let spec = node_spec(current).ok_or(DecisionError::UnknownNode(current))?;
        let evaluation = (spec.evaluator)(&ctx)?;
        let edge = spec
            .edges
            .iter()
            .find(|e| e.label == evaluation.edge)
            .ok_or(DecisionError::UnknownEdge {
                node: current,
                label: evaluation.edge,
            })?;

        let alternative_paths = spec
            .edges
            .iter()
            .filter(|e| e.label != edge.label)
            .map(|e| AlternativePath {
                node_id: current.as_str().to_string(),
                label: e.label.to_string(),
                reason: format!("{} was not satisfied", e.condition),
                would_lead_to: e.target.label(),
            })
            .collect();

        tracing::debug!(node = %current, path = edge.label, "Decision node evaluated");
        if let Some(info) = evaluation.missing {
            missing.push(info);
        }

        path.push(DecisionPoint {
            node_id: current,
            label: current.label().to_string(),
            criteria: evaluation.criteria,
            selected_path: edge.label.to_string(),
            next: edge.target,
            alternative_paths,
            confidence: evaluation.confidence.clamp(0.0, 1.0),
        })?;

        match edge.target {
            FlowTarget::Node(next) => current = next,
            FlowTarget::Outcome(score) => {
                let missing_info = dedupe_missing(missing);
                let confidence = aggregate(
                    &facts.extraction_confidences(),
                    volumes.has_volume_data(),
                    missing_info.len(),
                );
                tracing::info!(
                    score = %score.label(),
                    nodes = path.points().len(),
                    confidence = confidence.overall,
                    missing = missing_info.len(),
                    "BT-RADS decision reached"
                );
                return Ok(Decision {
                    score,
                    reasoning: format!(
                        "{} {}: {}",
                        score.label(),
                        score.description(),
                        evaluation.reasoning
                    ),
                    path,
                    confidence,
                    volume_assessment: ctx.assessment,
                    missing_info,
                });
            }
        }
    }

    Err(DecisionError::Unterminated(MAX_STEPS))
}

fn validate_volumes(volumes: &VolumeInputs) -> Result<(), DecisionError> {
    let percents = [
        ("flair_change_pct", volumes.flair_change_pct),
        ("enhancement_change_pct", volumes.enhancement_change_pct),
    ];
    let measured = [
        ("baseline_flair_volume", volumes.baseline_flair_volume),
        ("followup_flair_volume", volumes.followup_flair_volume),
        ("baseline_enhancement_volume", volumes.baseline_enhancement_volume),
        ("followup_enhancement_volume", volumes.followup_enhancement_volume),
    ];

    for (field, value) in percents.into_iter().chain(measured) {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(DecisionError::NonFinite { field });
            }
        }
    }
    for (field, value) in measured {
        if let Some(v) = value {
            if v < 0.0 {
                return Err(DecisionError::NegativeVolume { field, value: v });
            }
        }
    }
    Ok(())
}

/// Resolve the imaging direction. Both change percentages are required
/// unless the facts already rule out a suitable prior.
fn assess(
    facts: &ExtractedFacts,
    volumes: &VolumeInputs,
    th: &ImagingThresholds,
) -> Result<Option<VolumeAssessment>, DecisionError> {
    match (volumes.flair_pct(), volumes.enhancement_pct()) {
        (Some(flair), Some(enh)) => Ok(Some(resolve(
            flair,
            enh,
            volumes.flair_abs_change(),
            volumes.enhancement_abs_change(),
            th,
        ))),
        _ if facts.prior_available == Some(false) => Ok(None),
        (None, _) => Err(DecisionError::MissingVolumeData("flair_change_pct")),
        (_, None) => Err(DecisionError::MissingVolumeData("enhancement_change_pct")),
    }
}

/// Days from radiation completion to the follow-up study. A date supplied
/// with the measurements wins over one extracted from the note.
pub fn days_since_radiation(facts: &ExtractedFacts, volumes: &VolumeInputs) -> Option<i64> {
    let radiation: Option<NaiveDate> = volumes
        .radiation_date
        .or_else(|| facts.radiation_date.and_then(|r| r.date()));
    Some(days_between(radiation?, volumes.followup_date?))
}

/// One entry per underlying fact, first occurrence kept.
fn dedupe_missing(items: Vec<MissingInfo>) -> Vec<MissingInfo> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|m| seen.insert(fact_key(&m.field).to_string()))
        .collect()
}

/// Steroid and Avastin status are both parts of the medication fact.
fn fact_key(field: &str) -> &str {
    match field {
        "steroid_status" | "avastin_status" => "medications",
        other => other,
    }
}
