use thiserror::Error;
use zinc_region_core::{NodeId, RegionError};

/// Reasons a composite component map is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CompositeError {
    #[error("composite needs at least one component")]
    NoComponents,
    #[error("source field '{0}' is repeated")]
    RepeatedSource(String),
    #[error("component {component}: literal index {found} out of order, expected {expected}")]
    LiteralOutOfOrder {
        component: usize,
        expected: usize,
        found: usize,
    },
    #[error("component {component}: source field {index} used before field {next}")]
    FieldOutOfOrder {
        component: usize,
        index: usize,
        next: usize,
    },
    #[error("component {component}: invalid source field index {index}")]
    InvalidFieldIndex { component: usize, index: usize },
    #[error("component {component}: field '{field}' has no component {index}")]
    ComponentOutOfRange {
        component: usize,
        field: String,
        index: usize,
    },
    #[error("not all source fields are used")]
    UnusedFields,
    #[error("not all source values are used")]
    UnusedValues,
}

/// Errors raised while constructing, evaluating or assigning fields.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FieldError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error("a field named '{0}' already exists")]
    DuplicateName(String),
    #[error("field '{field}' cannot depend on '{dependency}': the source graph would contain a cycle")]
    Cycle { field: String, dependency: String },
    #[error("field '{field}' is in use; its component count cannot change from {current} to {requested}")]
    ComponentCountLocked {
        field: String,
        current: usize,
        requested: usize,
    },
    #[error("field '{0}' is a source of other fields")]
    InUse(String),

    #[error("field '{field}' is not defined at this location")]
    NotDefined { field: String },
    #[error("field '{field}' was reached again while it was being evaluated")]
    Recursion { field: String },
    #[error("field '{field}' has no time sequence at node {node}")]
    MissingTimeSequence { field: String, node: NodeId },
    #[error("find element xi is not supported by field '{0}'")]
    FindElementXiUnsupported(String),

    #[error("field '{0}' cannot be assigned")]
    NotAssignable(String),
    #[error("assigning field '{field}' failed: {reason}")]
    AssignmentFailed { field: String, reason: String },

    #[error("manager is dispatching change messages")]
    ManagerBusy,
    #[error("field '{0}' does not belong to this manager")]
    NotManaged(String),

    #[error(transparent)]
    Region(#[from] RegionError),
}

impl FieldError {
    pub(crate) fn not_defined(field: &str) -> Self {
        FieldError::NotDefined {
            field: field.to_string(),
        }
    }
}
