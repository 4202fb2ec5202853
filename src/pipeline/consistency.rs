//! Reconciles extracted medication and timing facts with the path the
//! decision engine took.
//!
//! Pure and total: every input yields a report, nothing here returns an
//! error or panics.

use serde::{Deserialize, Serialize};

use crate::models::{
    AvastinStatus, Decision, ExtractedFacts, MedicationStatus, NodeId, SteroidStatus,
    VolumeInputs,
};
use crate::pipeline::decision::days_since_radiation;
use crate::pipeline_config::PipelineConfig;

/// One step of an algorithm path, reduced to what the rules inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub node: String,
    pub label: String,
}

/// Facts and path under validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSubject {
    pub medications: MedicationStatus,
    pub days_since_radiation: Option<i64>,
    pub treatment_window_days: i64,
    pub path: Vec<PathStep>,
}

impl ValidationSubject {
    pub fn from_decision(
        decision: &Decision,
        facts: &ExtractedFacts,
        volumes: &VolumeInputs,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            medications: facts.medications.unwrap_or_else(MedicationStatus::unknown),
            days_since_radiation: days_since_radiation(facts, volumes),
            treatment_window_days: config.treatment_window_days,
            path: decision
                .path
                .points()
                .iter()
                .map(|p| PathStep {
                    node: p.node_id.as_str().to_string(),
                    label: p.selected_path.clone(),
                })
                .collect(),
        }
    }
}

/// A contradiction between a fact and the path. Makes the report invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub path_label: String,
    pub field: String,
    pub message: String,
}

/// An unknown status filled in from the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub path_label: String,
    pub field: String,
    pub from: String,
    pub to: String,
}

/// A medication path with no status mapping. Left unknown, not guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unresolved {
    pub path_label: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ConsistencyIssue>,
    pub corrections: Vec<Correction>,
    pub warnings: Vec<String>,
    pub unresolved: Vec<Unresolved>,
    /// Medication status after corrections.
    pub corrected: MedicationStatus,
}

enum Implied {
    Avastin(AvastinStatus),
    Steroid(SteroidStatus),
}

/// Status a path label asserts, if any.
fn implied_status(label: &str) -> Option<Implied> {
    if label.contains("SUSTAINED") {
        Some(Implied::Avastin(AvastinStatus::Ongoing))
    } else if label.contains("FIRST") {
        Some(Implied::Avastin(AvastinStatus::FirstTreatment))
    } else if label.contains("STEROID") && !label.contains("UNLIKELY") {
        Some(Implied::Steroid(SteroidStatus::Increasing))
    } else {
        None
    }
}

fn is_medication_label(label: &str) -> bool {
    label.contains("AVASTIN") || label.contains("MEDICATION") || label.contains("STEROID")
}

pub fn validate(subject: &ValidationSubject) -> ValidationReport {
    let mut issues = Vec::new();
    let mut corrections = Vec::new();
    let mut warnings = Vec::new();
    let mut unresolved = Vec::new();
    let mut corrected = subject.medications;
    let original = subject.medications;

    for step in &subject.path {
        let label = step.label.as_str();

        // Unknown-branch labels assert nothing.
        if !label.contains("UNKNOWN") && label != "NO_MEDICATIONS" {
            match implied_status(label) {
                Some(Implied::Avastin(status)) if corrected.avastin_status == AvastinStatus::Unknown => {
                    corrected.avastin_status = status;
                    corrections.push(Correction {
                        path_label: label.to_string(),
                        field: "avastin_status".into(),
                        from: AvastinStatus::Unknown.as_str().into(),
                        to: status.as_str().into(),
                    });
                    warnings.push(format!(
                        "avastin_status inferred as {status} from path {label}"
                    ));
                }
                Some(Implied::Steroid(status)) if corrected.steroid_status == SteroidStatus::Unknown => {
                    corrected.steroid_status = status;
                    corrections.push(Correction {
                        path_label: label.to_string(),
                        field: "steroid_status".into(),
                        from: SteroidStatus::Unknown.as_str().into(),
                        to: status.as_str().into(),
                    });
                    warnings.push(format!(
                        "steroid_status inferred as {status} from path {label}"
                    ));
                }
                Some(_) => {}
                None if is_medication_label(label) && corrected.unknown_count() > 0 => {
                    unresolved.push(Unresolved {
                        path_label: label.to_string(),
                        reason: "Path implies a medication category with no status mapping"
                            .into(),
                    });
                }
                None => {}
            }
        }

        if label == "NO_MEDICATIONS" {
            let steroid = original.steroid_status;
            let avastin = original.avastin_status;
            if !matches!(steroid, SteroidStatus::None | SteroidStatus::Unknown) {
                issues.push(ConsistencyIssue {
                    path_label: label.to_string(),
                    field: "steroid_status".into(),
                    message: format!("Path states no medications but steroid status is {steroid}"),
                });
            }
            if !matches!(avastin, AvastinStatus::None | AvastinStatus::Unknown) {
                issues.push(ConsistencyIssue {
                    path_label: label.to_string(),
                    field: "avastin_status".into(),
                    message: format!("Path states no medications but Avastin status is {avastin}"),
                });
            }
        }

        if let Some(days) = subject.days_since_radiation.filter(|d| *d >= 0) {
            let window = subject.treatment_window_days;
            let contradiction = (label == "WITHIN_90_DAYS" && days >= window)
                || (label == "BEYOND_90_DAYS" && days < window);
            if contradiction {
                issues.push(ConsistencyIssue {
                    path_label: label.to_string(),
                    field: "days_since_radiation".into(),
                    message: format!(
                        "Path {label} contradicts {days} days since radiation (window {window} days)"
                    ),
                });
            }
        }
    }

    let no_medications = original.steroid_status == SteroidStatus::None
        && original.avastin_status == AvastinStatus::None;
    let medication_node = subject.path.iter().any(|s| {
        s.node == NodeId::AvastinResponse.as_str() || s.node == NodeId::SteroidEffect.as_str()
    });
    if no_medications && medication_node {
        warnings.push(
            "No steroids or Avastin extracted but the path evaluated a medication effect".into(),
        );
    }

    if !issues.is_empty() {
        tracing::warn!(issues = issues.len(), "Decision path inconsistent with extracted facts");
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
        corrections,
        warnings,
        unresolved,
        corrected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(steroid: SteroidStatus, avastin: AvastinStatus, steps: &[(&str, &str)]) -> ValidationSubject {
        ValidationSubject {
            medications: MedicationStatus {
                steroid_status: steroid,
                avastin_status: avastin,
            },
            days_since_radiation: None,
            treatment_window_days: 90,
            path: steps
                .iter()
                .map(|(node, label)| PathStep {
                    node: node.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn sustained_label_fills_unknown_avastin() {
        let s = subject(
            SteroidStatus::None,
            AvastinStatus::Unknown,
            &[("avastin_response", "AVASTIN_SUSTAINED_IMPROVEMENT")],
        );
        let report = validate(&s);
        assert!(report.is_valid);
        assert_eq!(report.corrected.avastin_status, AvastinStatus::Ongoing);
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].to, "ongoing");
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn first_label_fills_first_treatment() {
        let s = subject(
            SteroidStatus::Stable,
            AvastinStatus::Unknown,
            &[("avastin_response", "AVASTIN_FIRST_OR_ENH_ONLY")],
        );
        let report = validate(&s);
        assert_eq!(report.corrected.avastin_status, AvastinStatus::FirstTreatment);
    }

    #[test]
    fn steroid_label_fills_increasing() {
        let s = subject(
            SteroidStatus::Unknown,
            AvastinStatus::None,
            &[("on_medications", "INCREASING_STEROIDS")],
        );
        let report = validate(&s);
        assert_eq!(report.corrected.steroid_status, SteroidStatus::Increasing);
        assert_eq!(report.corrections[0].field, "steroid_status");
    }

    #[test]
    fn known_status_is_not_overwritten() {
        let s = subject(
            SteroidStatus::Started,
            AvastinStatus::None,
            &[("steroid_effect", "STEROID_EFFECT_LIKELY")],
        );
        let report = validate(&s);
        assert!(report.corrections.is_empty());
        assert_eq!(report.corrected.steroid_status, SteroidStatus::Started);
    }

    #[test]
    fn unmapped_medication_label_is_unresolved() {
        let s = subject(
            SteroidStatus::None,
            AvastinStatus::Unknown,
            &[("on_medications", "ON_AVASTIN")],
        );
        let report = validate(&s);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].path_label, "ON_AVASTIN");
        assert_eq!(report.corrected.avastin_status, AvastinStatus::Unknown);
    }

    #[test]
    fn unknown_branch_labels_assert_nothing() {
        let s = subject(
            SteroidStatus::Unknown,
            AvastinStatus::Unknown,
            &[("on_medications", "MEDICATIONS_UNKNOWN")],
        );
        let report = validate(&s);
        assert!(report.unresolved.is_empty());
        assert!(report.corrections.is_empty());
        assert!(report.is_valid);
    }

    #[test]
    fn no_medications_with_active_status_is_invalid() {
        let s = subject(
            SteroidStatus::Stable,
            AvastinStatus::None,
            &[("on_medications", "NO_MEDICATIONS")],
        );
        let report = validate(&s);
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].field, "steroid_status");
        assert_eq!(report.corrected.steroid_status, SteroidStatus::Stable);
    }

    #[test]
    fn timing_label_must_match_days() {
        let mut s = subject(
            SteroidStatus::None,
            AvastinStatus::None,
            &[("time_since_xrt", "WITHIN_90_DAYS")],
        );
        s.days_since_radiation = Some(120);
        assert!(!validate(&s).is_valid);

        s.days_since_radiation = Some(45);
        assert!(validate(&s).is_valid);

        s.path[0].label = "BEYOND_90_DAYS".into();
        assert!(!validate(&s).is_valid);
    }

    #[test]
    fn medication_node_without_medications_warns() {
        let s = subject(
            SteroidStatus::None,
            AvastinStatus::None,
            &[("steroid_effect", "STEROID_EFFECT_UNLIKELY")],
        );
        let report = validate(&s);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn engine_paths_validate_cleanly() {
        use crate::models::BtradsScore;
        use crate::pipeline::decision::decide;

        let facts = ExtractedFacts {
            medications: Some(MedicationStatus {
                steroid_status: SteroidStatus::Increasing,
                avastin_status: AvastinStatus::None,
            }),
            prior_available: Some(true),
            ..Default::default()
        };
        let volumes = VolumeInputs {
            flair_change_pct: Some(-30.0),
            enhancement_change_pct: Some(-20.0),
            ..Default::default()
        };
        let config = PipelineConfig::default();
        let decision = decide(&facts, &volumes, &config).unwrap();
        assert_eq!(decision.score, BtradsScore::Bt1b);

        let subject = ValidationSubject::from_decision(&decision, &facts, &volumes, &config);
        let report = validate(&subject);
        assert!(report.is_valid);
        assert!(report.corrections.is_empty());
        assert!(report.unresolved.is_empty());
    }
}
