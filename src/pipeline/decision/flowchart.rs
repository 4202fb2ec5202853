//! The BT-RADS flowchart as a static node table.
//!
//! Each node names its outgoing edges and an evaluator that inspects the
//! decision context and selects exactly one of them. Edges not selected
//! become the alternative paths of the audit trail.

use crate::models::{
    BtradsScore, DecisionCriterion, ExtractedFacts, FlowTarget, ImagingCategory,
    MedicationEffect, MedicationStatus, MissingInfo, NodeId, RadiationTiming, SteroidStatus,
    AvastinStatus, VolumeAssessment, VolumeInputs, WorseComponent, WorseningExtent,
};
use crate::pipeline::assessment::{
    classify_signal, how_much_worse, radiation_timing, what_is_worse, ImagingThresholds,
};

use super::DecisionError;

/// An outgoing edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Path label recorded when the edge is taken.
    pub label: &'static str,
    /// Condition under which the edge is taken.
    pub condition: &'static str,
    pub target: FlowTarget,
}

pub type Evaluator = fn(&DecisionContext<'_>) -> Result<Evaluation, DecisionError>;

pub struct NodeSpec {
    pub id: NodeId,
    pub evaluator: Evaluator,
    pub edges: &'static [Edge],
}

/// What an evaluator decided at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Label of the selected edge.
    pub edge: &'static str,
    pub criteria: Vec<DecisionCriterion>,
    /// 0-1.
    pub confidence: f32,
    pub reasoning: String,
    /// Set when the node fell back to its default branch.
    pub missing: Option<MissingInfo>,
}

/// Inputs shared by every evaluator of one decision run.
pub struct DecisionContext<'a> {
    pub facts: &'a ExtractedFacts,
    pub volumes: &'a VolumeInputs,
    pub thresholds: ImagingThresholds,
    pub treatment_window_days: i64,
    pub assessment: Option<VolumeAssessment>,
    pub days_since_radiation: Option<i64>,
}

impl DecisionContext<'_> {
    fn medications(&self) -> MedicationStatus {
        self.facts.medications.unwrap_or_else(MedicationStatus::unknown)
    }

    fn medication_confidence(&self) -> f32 {
        self.facts
            .medication_confidence
            .map(|c| (c / 100.0).clamp(0.0, 1.0))
            .unwrap_or(ASSUMED_CONFIDENCE)
    }

    fn assessment(&self) -> Result<&VolumeAssessment, DecisionError> {
        self.assessment
            .as_ref()
            .ok_or(DecisionError::MissingVolumeData("imaging assessment"))
    }
}

/// Node confidence when a default branch was taken.
const ASSUMED_CONFIDENCE: f32 = 0.5;
/// Node confidence for branches decided by volumetric thresholds.
const VOLUMETRIC_CONFIDENCE: f32 = 0.95;

const fn node(id: NodeId) -> FlowTarget {
    FlowTarget::Node(id)
}

const fn outcome(score: BtradsScore) -> FlowTarget {
    FlowTarget::Outcome(score)
}

// ═══════════════════════════════════════════════════════════
// Node table
// ═══════════════════════════════════════════════════════════

pub static FLOWCHART: &[NodeSpec] = &[
    NodeSpec {
        id: NodeId::NoteIntake,
        evaluator: note_intake,
        edges: &[Edge {
            label: "NOTE_RECEIVED",
            condition: "Clinical note and measurements received",
            target: node(NodeId::SuitablePrior),
        }],
    },
    NodeSpec {
        id: NodeId::SuitablePrior,
        evaluator: suitable_prior,
        edges: &[
            Edge {
                label: "SUITABLE_PRIOR",
                condition: "Suitable prior study available",
                target: node(NodeId::ImagingAssessment),
            },
            Edge {
                label: "PRIOR_UNKNOWN_ASSUMED_SUITABLE",
                condition: "Prior availability unknown (assume suitable prior)",
                target: node(NodeId::ImagingAssessment),
            },
            Edge {
                label: "NO_SUITABLE_PRIOR",
                condition: "No suitable prior study",
                target: outcome(BtradsScore::Bt0),
            },
        ],
    },
    NodeSpec {
        id: NodeId::ImagingAssessment,
        evaluator: imaging_assessment,
        edges: &[
            Edge {
                label: "IMPROVED",
                condition: "Imaging improved",
                target: node(NodeId::OnMedications),
            },
            Edge {
                label: "STABLE",
                condition: "Imaging stable",
                target: outcome(BtradsScore::Bt2),
            },
            Edge {
                label: "WORSE",
                condition: "Imaging worse",
                target: node(NodeId::TimeSinceXrt),
            },
        ],
    },
    NodeSpec {
        id: NodeId::OnMedications,
        evaluator: on_medications,
        edges: &[
            Edge {
                label: "ON_AVASTIN",
                condition: "Patient on Avastin",
                target: node(NodeId::AvastinResponse),
            },
            Edge {
                label: "INCREASING_STEROIDS",
                condition: "Steroids increasing or newly started",
                target: node(NodeId::SteroidEffect),
            },
            Edge {
                label: "NO_MEDICATIONS",
                condition: "No steroids and no Avastin",
                target: outcome(BtradsScore::Bt1a),
            },
            Edge {
                label: "NO_MEDICATION_EFFECT",
                condition: "Medications without a change that explains improvement",
                target: outcome(BtradsScore::Bt1a),
            },
            Edge {
                label: "MEDICATIONS_UNKNOWN",
                condition: "Medication status unknown (assume neither)",
                target: outcome(BtradsScore::Bt1a),
            },
        ],
    },
    NodeSpec {
        id: NodeId::AvastinResponse,
        evaluator: avastin_response,
        edges: &[
            Edge {
                label: "AVASTIN_SUSTAINED_IMPROVEMENT",
                condition: "Ongoing Avastin with FLAIR and enhancement both improved",
                target: outcome(BtradsScore::Bt1a),
            },
            Edge {
                label: "AVASTIN_FIRST_OR_ENH_ONLY",
                condition: "First study on Avastin or enhancement-only improvement",
                target: outcome(BtradsScore::Bt1b),
            },
        ],
    },
    NodeSpec {
        id: NodeId::SteroidEffect,
        evaluator: steroid_effect,
        edges: &[
            Edge {
                label: "STEROID_EFFECT_LIKELY",
                condition: "Improvement led by edema reduction on increasing steroids",
                target: outcome(BtradsScore::Bt1b),
            },
            Edge {
                label: "STEROID_EFFECT_UNLIKELY",
                condition: "Enhancement improved beyond edema on steroids",
                target: outcome(BtradsScore::Bt1a),
            },
        ],
    },
    NodeSpec {
        id: NodeId::TimeSinceXrt,
        evaluator: time_since_xrt,
        edges: &[
            Edge {
                label: "WITHIN_90_DAYS",
                condition: "Follow-up within 90 days of radiation completion",
                target: outcome(BtradsScore::Bt3a),
            },
            Edge {
                label: "BEYOND_90_DAYS",
                condition: "Follow-up 90 or more days after radiation completion",
                target: node(NodeId::WhatIsWorse),
            },
            Edge {
                label: "XRT_TIMING_UNKNOWN",
                condition: "Time since radiation unknown (assume 90 or more days)",
                target: node(NodeId::WhatIsWorse),
            },
        ],
    },
    NodeSpec {
        id: NodeId::WhatIsWorse,
        evaluator: what_is_worse_node,
        edges: &[
            Edge {
                label: "BOTH_COMPONENTS_WORSE",
                condition: "FLAIR and enhancement both worse",
                target: node(NodeId::HowMuchWorse),
            },
            Edge {
                label: "ONE_COMPONENT_WORSE",
                condition: "Only one of FLAIR or enhancement worse",
                target: outcome(BtradsScore::Bt3b),
            },
            Edge {
                label: "COMPONENT_UNKNOWN",
                condition: "Worse component undetermined",
                target: outcome(BtradsScore::Bt3b),
            },
        ],
    },
    NodeSpec {
        id: NodeId::HowMuchWorse,
        evaluator: how_much_worse_node,
        edges: &[
            Edge {
                label: "MAJOR_INCREASE",
                condition: "Largest increase above 40%",
                target: outcome(BtradsScore::Bt4),
            },
            Edge {
                label: "MINOR_INCREASE",
                condition: "Largest increase 40% or less",
                target: node(NodeId::Progressive),
            },
            Edge {
                label: "EXTENT_UNKNOWN",
                condition: "Extent of increase unknown",
                target: outcome(BtradsScore::Bt3c),
            },
        ],
    },
    NodeSpec {
        id: NodeId::Progressive,
        evaluator: progressive,
        edges: &[
            Edge {
                label: "PROGRESSIVE",
                condition: "Progression across multiple prior studies",
                target: outcome(BtradsScore::Bt4),
            },
            Edge {
                label: "NOT_PROGRESSIVE",
                condition: "No progression across prior studies",
                target: outcome(BtradsScore::Bt3c),
            },
            Edge {
                label: "PROGRESSION_UNKNOWN",
                condition: "Progression history unknown",
                target: outcome(BtradsScore::Bt3c),
            },
        ],
    },
];

pub fn node_spec(id: NodeId) -> Option<&'static NodeSpec> {
    FLOWCHART.iter().find(|n| n.id == id)
}

// ═══════════════════════════════════════════════════════════
// Evaluators
// ═══════════════════════════════════════════════════════════

fn criterion(
    id: &str,
    condition: &str,
    observed_value: impl Into<String>,
    threshold: Option<String>,
    operator: Option<&str>,
    met: bool,
    reasoning: impl Into<String>,
) -> DecisionCriterion {
    DecisionCriterion {
        id: id.to_string(),
        condition: condition.to_string(),
        observed_value: observed_value.into(),
        threshold,
        operator: operator.map(String::from),
        met,
        reasoning: reasoning.into(),
    }
}

fn yes_no_unknown(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

fn note_intake(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let has_volumes = ctx.volumes.has_volume_data();
    Ok(Evaluation {
        edge: "NOTE_RECEIVED",
        criteria: vec![criterion(
            "volume_data",
            "Paired FLAIR and enhancement changes available",
            if has_volumes { "available" } else { "unavailable" },
            None,
            None,
            has_volumes,
            "Inputs received for scoring",
        )],
        confidence: 1.0,
        reasoning: "Clinical note and measurements received".into(),
        missing: None,
    })
}

fn suitable_prior(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let available = ctx.facts.prior_available;
    let (edge, confidence, reasoning, missing) = match available {
        Some(true) => ("SUITABLE_PRIOR", 1.0, "Suitable prior study available", None),
        Some(false) => ("NO_SUITABLE_PRIOR", 1.0, "No suitable prior study for comparison", None),
        None => (
            "PRIOR_UNKNOWN_ASSUMED_SUITABLE",
            ASSUMED_CONFIDENCE,
            "Prior availability not stated; assuming a suitable prior",
            Some(MissingInfo::new(
                "prior_available",
                "Availability of a suitable prior study was not stated",
                "Scored against the supplied baseline; BT-0 was not considered",
                "Confirm that a prior comparison study exists",
            )),
        ),
    };
    Ok(Evaluation {
        edge,
        criteria: vec![criterion(
            "prior_available",
            "Suitable prior study available for comparison",
            yes_no_unknown(available),
            None,
            Some("=="),
            available != Some(false),
            reasoning,
        )],
        confidence,
        reasoning: reasoning.into(),
        missing,
    })
}

fn imaging_assessment(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let a = ctx.assessment()?;
    let th = &ctx.thresholds;
    let (_, flair_reason) = classify_signal(a.flair_change_pct, a.flair_abs_change, th);
    let (_, enh_reason) = classify_signal(a.enhancement_change_pct, a.enh_abs_change, th);
    let band = format!("±{}%", th.stability_pct);

    let criteria = vec![
        criterion(
            "flair_change",
            "FLAIR change outside the stability band",
            format!("{:+.1}%", a.flair_change_pct),
            Some(band.clone()),
            Some("outside"),
            a.flair_category != ImagingCategory::Stable,
            flair_reason,
        ),
        criterion(
            "enhancement_change",
            "Enhancement change outside the stability band",
            format!("{:+.1}%", a.enhancement_change_pct),
            Some(band),
            Some("outside"),
            a.enhancement_category != ImagingCategory::Stable,
            enh_reason,
        ),
        criterion(
            "mixed_pattern",
            "FLAIR and enhancement change in opposite directions",
            if a.mixed_pattern { "mixed" } else { "concordant" },
            None,
            None,
            a.mixed_pattern,
            if a.mixed_pattern {
                "Enhancement priority applied"
            } else {
                "No mixed pattern"
            },
        ),
    ];

    let edge = match a.category {
        ImagingCategory::Improved => "IMPROVED",
        ImagingCategory::Stable => "STABLE",
        ImagingCategory::Worse => "WORSE",
    };
    Ok(Evaluation {
        edge,
        criteria,
        confidence: if a.mixed_pattern { 0.85 } else { VOLUMETRIC_CONFIDENCE },
        reasoning: a.reasoning.clone(),
        missing: None,
    })
}

fn on_medications(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let meds = ctx.medications();
    let effect = meds.effect();

    let criteria = vec![
        criterion(
            "avastin_status",
            "Patient on Avastin",
            meds.avastin_status.as_str(),
            None,
            None,
            meds.avastin_status.is_active(),
            format!("Avastin status: {}", meds.avastin_status),
        ),
        criterion(
            "steroid_status",
            "Steroids increasing or newly started",
            meds.steroid_status.as_str(),
            None,
            None,
            matches!(meds.steroid_status, SteroidStatus::Increasing | SteroidStatus::Started),
            format!("Steroid status: {}", meds.steroid_status),
        ),
    ];

    let (edge, confidence, reasoning, missing) = match effect {
        MedicationEffect::Avastin => (
            "ON_AVASTIN",
            ctx.medication_confidence(),
            "Improvement on Avastin; response type decides",
            None,
        ),
        MedicationEffect::IncreasingSteroids => (
            "INCREASING_STEROIDS",
            ctx.medication_confidence(),
            "Improvement with increasing steroids",
            None,
        ),
        MedicationEffect::Neither
            if meds.steroid_status == SteroidStatus::None
                && meds.avastin_status == AvastinStatus::None =>
        (
            "NO_MEDICATIONS",
            ctx.medication_confidence(),
            "No steroids or Avastin: true tumor improvement",
            None,
        ),
        MedicationEffect::Neither => (
            "NO_MEDICATION_EFFECT",
            ctx.medication_confidence(),
            "No medication change explains the improvement",
            None,
        ),
        MedicationEffect::Unknown => (
            "MEDICATIONS_UNKNOWN",
            ASSUMED_CONFIDENCE,
            "Medication status unknown; assuming no medication effect",
            Some(MissingInfo::new(
                "medications",
                "Medication status unknown at an improved scan",
                "A medication effect (BT-1b) cannot be excluded; scored as true improvement",
                "Review the current medication list for steroids and Avastin",
            )),
        ),
    };
    Ok(Evaluation {
        edge,
        criteria,
        confidence,
        reasoning: reasoning.into(),
        missing,
    })
}

fn avastin_response(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let meds = ctx.medications();
    let a = ctx.assessment()?;
    let ongoing = meds.avastin_status == AvastinStatus::Ongoing;
    let both_improved = a.flair_category == ImagingCategory::Improved
        && a.enhancement_category == ImagingCategory::Improved;
    let sustained = ongoing && both_improved;

    let criteria = vec![
        criterion(
            "avastin_ongoing",
            "Avastin established beyond the first study",
            meds.avastin_status.as_str(),
            None,
            Some("=="),
            ongoing,
            format!("Avastin status: {}", meds.avastin_status),
        ),
        criterion(
            "both_improved",
            "FLAIR and enhancement both improved",
            format!("FLAIR {}, ENH {}", a.flair_category, a.enhancement_category),
            None,
            None,
            both_improved,
            a.reasoning.clone(),
        ),
    ];

    let (edge, reasoning) = if sustained {
        (
            "AVASTIN_SUSTAINED_IMPROVEMENT",
            "Sustained improvement of both components on ongoing Avastin",
        )
    } else if !ongoing {
        ("AVASTIN_FIRST_OR_ENH_ONLY", "First study after starting Avastin")
    } else {
        ("AVASTIN_FIRST_OR_ENH_ONLY", "Enhancement-only improvement on Avastin")
    };
    Ok(Evaluation {
        edge,
        criteria,
        confidence: ctx.medication_confidence(),
        reasoning: reasoning.into(),
        missing: None,
    })
}

/// Steroids shrink vasogenic edema first. An improvement is attributed to a
/// steroid increase only when FLAIR fell at least as far as enhancement.
fn steroid_effect(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let meds = ctx.medications();
    let a = ctx.assessment()?;
    let increasing = matches!(
        meds.steroid_status,
        SteroidStatus::Increasing | SteroidStatus::Started
    );
    let flair_led = a.flair_change_pct <= a.enhancement_change_pct;
    let likely = increasing && flair_led;

    let criteria = vec![
        criterion(
            "steroid_increase",
            "Steroid dose increased or newly started",
            meds.steroid_status.as_str(),
            None,
            None,
            increasing,
            format!("Steroid status: {}", meds.steroid_status),
        ),
        criterion(
            "flair_led_improvement",
            "FLAIR improved at least as much as enhancement",
            format!(
                "FLAIR {:.1}%, ENH {:.1}%",
                a.flair_change_pct, a.enhancement_change_pct
            ),
            Some(format!("{:.1}%", a.enhancement_change_pct)),
            Some("<="),
            flair_led,
            if flair_led {
                "Edema reduction leads the response".to_string()
            } else {
                "Enhancing tumor reduction exceeds edema reduction".to_string()
            },
        ),
    ];

    let reasoning = if likely {
        "Improvement may reflect increased steroids"
    } else {
        "Enhancing tumor regressed beyond the edema change; steroids do not explain it"
    };
    Ok(Evaluation {
        edge: if likely { "STEROID_EFFECT_LIKELY" } else { "STEROID_EFFECT_UNLIKELY" },
        criteria,
        confidence: ctx.medication_confidence(),
        reasoning: reasoning.into(),
        missing: None,
    })
}

fn time_since_xrt(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let window = ctx.treatment_window_days;
    let (timing, reasoning) = radiation_timing(ctx.days_since_radiation, window);
    let observed = match (timing, ctx.days_since_radiation) {
        (RadiationTiming::Unknown, _) | (_, None) => "unknown".to_string(),
        (_, Some(days)) => format!("{days} days"),
    };

    let (edge, confidence, missing) = match timing {
        RadiationTiming::Within90Days => ("WITHIN_90_DAYS", radiation_confidence(ctx), None),
        RadiationTiming::Beyond90Days => ("BEYOND_90_DAYS", radiation_confidence(ctx), None),
        RadiationTiming::Unknown => (
            "XRT_TIMING_UNKNOWN",
            ASSUMED_CONFIDENCE,
            Some(MissingInfo::new(
                "radiation_date",
                "Time since radiation completion could not be established",
                format!(
                    "Treatment effect within {window} days of radiation (BT-3a) cannot be considered"
                ),
                "Check the radiation oncology treatment summary for the completion date",
            )),
        ),
    };

    Ok(Evaluation {
        edge,
        criteria: vec![criterion(
            "days_since_radiation",
            "Follow-up within the post-radiation treatment window",
            observed,
            Some(format!("{window} days")),
            Some("<"),
            timing == RadiationTiming::Within90Days,
            reasoning.clone(),
        )],
        confidence,
        reasoning,
        missing,
    })
}

/// Dates supplied with the measurements are taken as certain.
fn radiation_confidence(ctx: &DecisionContext<'_>) -> f32 {
    if ctx.volumes.radiation_date.is_some() {
        return 1.0;
    }
    ctx.facts
        .radiation_confidence
        .map(|c| (c / 100.0).clamp(0.0, 1.0))
        .unwrap_or(ASSUMED_CONFIDENCE)
}

fn what_is_worse_node(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let a = ctx.assessment()?;
    let (component, reasoning) = what_is_worse(a);
    let band = format!("+{}%", ctx.thresholds.stability_pct);

    let criteria = vec![
        criterion(
            "flair_worse",
            "FLAIR worse",
            format!("{:+.1}%", a.flair_change_pct),
            Some(band.clone()),
            Some(">"),
            a.flair_category == ImagingCategory::Worse,
            format!("FLAIR {}", a.flair_category),
        ),
        criterion(
            "enhancement_worse",
            "Enhancement worse",
            format!("{:+.1}%", a.enhancement_change_pct),
            Some(band),
            Some(">"),
            a.enhancement_category == ImagingCategory::Worse,
            format!("ENH {}", a.enhancement_category),
        ),
    ];

    let (edge, missing) = match component {
        WorseComponent::FlairAndEnh => ("BOTH_COMPONENTS_WORSE", None),
        WorseComponent::FlairOrEnh => ("ONE_COMPONENT_WORSE", None),
        WorseComponent::Unknown => (
            "COMPONENT_UNKNOWN",
            Some(MissingInfo::new(
                "worse_component",
                "Neither component individually exceeds the worsening threshold",
                "Scored indeterminate (BT-3b)",
                "Review the measurements or the radiologist's impression",
            )),
        ),
    };
    Ok(Evaluation {
        edge,
        criteria,
        confidence: if missing.is_some() { ASSUMED_CONFIDENCE } else { VOLUMETRIC_CONFIDENCE },
        reasoning,
        missing,
    })
}

fn how_much_worse_node(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let a = ctx.assessment()?;
    let th = &ctx.thresholds;
    let (extent, reasoning) = how_much_worse(a.flair_change_pct, a.enhancement_change_pct, th);
    let max_increase = a.flair_change_pct.max(a.enhancement_change_pct);

    let (edge, missing) = match extent {
        WorseningExtent::Major => ("MAJOR_INCREASE", None),
        WorseningExtent::Minor => ("MINOR_INCREASE", None),
        WorseningExtent::Unknown => (
            "EXTENT_UNKNOWN",
            Some(MissingInfo::new(
                "worsening_extent",
                "No positive change to measure the extent of worsening",
                "Scored as favoring tumor (BT-3c) without an extent",
                "Review the measurements",
            )),
        ),
    };
    Ok(Evaluation {
        edge,
        criteria: vec![criterion(
            "max_increase",
            "Largest increase above the progression threshold",
            format!("{max_increase:+.1}%"),
            Some(format!("{}%", th.progression_pct)),
            Some(">"),
            extent == WorseningExtent::Major,
            reasoning.clone(),
        )],
        confidence: if missing.is_some() { ASSUMED_CONFIDENCE } else { VOLUMETRIC_CONFIDENCE },
        reasoning,
        missing,
    })
}

fn progressive(ctx: &DecisionContext<'_>) -> Result<Evaluation, DecisionError> {
    let value = ctx.facts.progressive_over_prior_studies;
    let (edge, confidence, reasoning, missing) = match value {
        Some(true) => ("PROGRESSIVE", 1.0, "Progressive over multiple prior studies", None),
        Some(false) => ("NOT_PROGRESSIVE", 1.0, "Not progressive over prior studies", None),
        None => (
            "PROGRESSION_UNKNOWN",
            ASSUMED_CONFIDENCE,
            "Progression history unknown; favoring tumor without certainty",
            Some(MissingInfo::new(
                "progressive_over_prior_studies",
                "Progression across earlier studies was not stated",
                "Highly suspicious (BT-4) cannot be assigned for minor worsening",
                "Compare with earlier follow-up studies",
            )),
        ),
    };
    Ok(Evaluation {
        edge,
        criteria: vec![criterion(
            "progressive",
            "Progression across multiple prior studies",
            yes_no_unknown(value),
            None,
            Some("=="),
            value == Some(true),
            reasoning,
        )],
        confidence,
        reasoning: reasoning.into(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_node_in_table_once() {
        let ids: HashSet<NodeId> = FLOWCHART.iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), FLOWCHART.len());
        for id in NodeId::all() {
            assert!(node_spec(*id).is_some(), "missing node {id}");
        }
    }

    #[test]
    fn edge_targets_exist_and_labels_unique_per_node() {
        for spec in FLOWCHART {
            let labels: HashSet<&str> = spec.edges.iter().map(|e| e.label).collect();
            assert_eq!(labels.len(), spec.edges.len(), "duplicate label at {}", spec.id);
            for edge in spec.edges {
                if let FlowTarget::Node(next) = edge.target {
                    assert!(node_spec(next).is_some());
                }
            }
        }
    }

    /// Every node reaches an outcome without revisiting a node.
    #[test]
    fn table_is_acyclic() {
        fn walk(id: NodeId, seen: &mut Vec<NodeId>) {
            assert!(!seen.contains(&id), "cycle through {id}");
            seen.push(id);
            for edge in node_spec(id).unwrap().edges {
                if let FlowTarget::Node(next) = edge.target {
                    walk(next, seen);
                }
            }
            seen.pop();
        }
        walk(NodeId::NoteIntake, &mut Vec::new());
    }
}
