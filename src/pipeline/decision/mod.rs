pub mod engine;
pub mod flowchart;

pub use engine::{days_since_radiation, decide, MAX_STEPS};
pub use flowchart::{node_spec, DecisionContext, Edge, Evaluation, NodeSpec, FLOWCHART};

use thiserror::Error;

use crate::models::{NodeId, PathSealed};

/// Malformed decision input. Ambiguous or missing facts are not errors:
/// they take the documented default branch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("No change percentage or volumes available for {0}")]
    MissingVolumeData(&'static str),

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} is negative ({value})")]
    NegativeVolume { field: &'static str, value: f64 },

    #[error("Flowchart has no node {0}")]
    UnknownNode(NodeId),

    #[error("Node {node} has no edge labeled {label}")]
    UnknownEdge { node: NodeId, label: &'static str },

    #[error("Flowchart walk did not terminate after {0} nodes")]
    Unterminated(usize),

    #[error(transparent)]
    Path(#[from] PathSealed),
}
