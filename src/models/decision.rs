use serde::{Deserialize, Serialize};

use super::enums::InvalidEnum;
use super::enums::{BtradsScore, ConfidenceLevel};
use super::extraction::MissingInfo;
use super::volume::VolumeAssessment;

str_enum!(
    /// Decision nodes of the BT-RADS flowchart.
    NodeId {
        NoteIntake => "note_intake",
        SuitablePrior => "suitable_prior",
        ImagingAssessment => "imaging_assessment",
        OnMedications => "on_medications",
        AvastinResponse => "avastin_response",
        SteroidEffect => "steroid_effect",
        TimeSinceXrt => "time_since_xrt",
        WhatIsWorse => "what_is_worse",
        HowMuchWorse => "how_much_worse",
        Progressive => "progressive",
    }
);

impl NodeId {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoteIntake => "Note Intake",
            Self::SuitablePrior => "Suitable Prior?",
            Self::ImagingAssessment => "Imaging Assessment",
            Self::OnMedications => "On Medications?",
            Self::AvastinResponse => "Avastin Response",
            Self::SteroidEffect => "Steroid Effect",
            Self::TimeSinceXrt => "Time Since XRT",
            Self::WhatIsWorse => "What Is Worse?",
            Self::HowMuchWorse => "How Much Worse?",
            Self::Progressive => "Progressive?",
        }
    }
}

/// Where an edge of the flowchart leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum FlowTarget {
    Node(NodeId),
    Outcome(BtradsScore),
}

impl FlowTarget {
    pub fn id(&self) -> String {
        match self {
            Self::Node(node) => node.as_str().to_string(),
            Self::Outcome(score) => format!("outcome_bt_{}", score.as_str()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Node(node) => node.label().to_string(),
            Self::Outcome(score) => format!("{} {}", score.label(), score.description()),
        }
    }
}

/// One condition evaluated at a decision node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCriterion {
    pub id: String,
    pub condition: String,
    pub observed_value: String,
    pub threshold: Option<String>,
    pub operator: Option<String>,
    pub met: bool,
    pub reasoning: String,
}

/// An edge of a node that was not taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativePath {
    pub node_id: String,
    pub label: String,
    pub reason: String,
    pub would_lead_to: String,
}

/// Audit record of one node traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPoint {
    pub node_id: NodeId,
    pub label: String,
    pub criteria: Vec<DecisionCriterion>,
    pub selected_path: String,
    pub next: FlowTarget,
    pub alternative_paths: Vec<AlternativePath>,
    /// 0-1.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Algorithm path already sealed at {0}")]
pub struct PathSealed(pub String);

/// Ordered, append-only trail of decision points. Sealed once an outcome
/// is reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmPath {
    points: Vec<DecisionPoint>,
    outcome: Option<BtradsScore>,
}

impl AlgorithmPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: DecisionPoint) -> Result<(), PathSealed> {
        if let Some(score) = self.outcome {
            return Err(PathSealed(score.label()));
        }
        if let FlowTarget::Outcome(score) = point.next {
            self.outcome = Some(score);
        }
        self.points.push(point);
        Ok(())
    }

    pub fn points(&self) -> &[DecisionPoint] {
        &self.points
    }

    pub fn outcome(&self) -> Option<BtradsScore> {
        self.outcome
    }

    pub fn is_sealed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Selected path labels in traversal order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|p| p.selected_path.as_str())
    }

    pub fn point(&self, node: NodeId) -> Option<&DecisionPoint> {
        self.points.iter().find(|p| p.node_id == node)
    }
}

/// Overall confidence for a decision run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// 0-100.
    pub overall: f32,
    pub level: ConfidenceLevel,
    pub factors: Vec<String>,
}

/// Output of the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub score: BtradsScore,
    pub path: AlgorithmPath,
    pub confidence: ConfidenceReport,
    pub volume_assessment: Option<VolumeAssessment>,
    pub missing_info: Vec<MissingInfo>,
    pub reasoning: String,
}
