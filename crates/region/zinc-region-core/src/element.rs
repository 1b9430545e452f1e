use std::fmt;

use serde::{Deserialize, Serialize};

/// Element identifier, unique within one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mesh element. Only its dimension matters to field evaluation: it fixes
/// the number of xi coordinates and derivatives at element locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub identifier: ElementId,
    pub dimension: usize,
}

impl Element {
    pub const MAX_DIMENSION: usize = 3;

    pub fn new(identifier: ElementId, dimension: usize) -> Self {
        Self {
            identifier,
            dimension,
        }
    }
}
