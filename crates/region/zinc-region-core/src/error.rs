use thiserror::Error;

use crate::{ElementId, NodeId};

/// Errors raised by region, node and texture operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RegionError {
    #[error("node {id} already exists in region '{region}'")]
    DuplicateNode { region: String, id: NodeId },
    #[error("node {id} not found in region '{region}'")]
    NodeNotFound { region: String, id: NodeId },
    #[error("element {id} already exists in region '{region}'")]
    DuplicateElement { region: String, id: ElementId },
    #[error("element {id} has unsupported dimension {dimension}")]
    InvalidElementDimension { id: ElementId, dimension: usize },
    #[error("child region '{0}' already exists")]
    DuplicateRegion(String),
    #[error("region '{0}' not found")]
    RegionNotFound(String),
    #[error("node {node} does not define nodal parameters '{field}'")]
    FieldNotDefined { node: NodeId, field: String },
    #[error("nodal parameters '{field}' expect {expected} components, got {actual}")]
    ComponentMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("nodal parameters need at least one component")]
    NoComponents,
    #[error("time sequence must be non-empty, finite and strictly increasing")]
    InvalidTimeSequence,
    #[error("time sequence has {times} times but {samples} samples were given")]
    SampleCountMismatch { times: usize, samples: usize },
    #[error("time {time} is not a sample of the time sequence")]
    TimeNotInSequence { time: f64 },
    #[error("invalid texture: {0}")]
    InvalidTexture(String),
    #[error("image filter failed: {0}")]
    Filter(String),
}

impl RegionError {
    /// Attach the nodal field name to errors raised by anonymous parameters.
    pub(crate) fn for_field(self, name: &str) -> Self {
        match self {
            RegionError::ComponentMismatch {
                expected, actual, ..
            } => RegionError::ComponentMismatch {
                field: name.to_string(),
                expected,
                actual,
            },
            other => other,
        }
    }
}
