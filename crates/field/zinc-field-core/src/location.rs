//! Where (and when) a field is evaluated.

use zinc_region_core::{ElementHandle, NodeHandle};

use crate::Field;

/// Evaluation context bound into an [`EvaluationCache`](crate::EvaluationCache).
#[derive(Clone, Debug)]
pub enum Location {
    /// Nowhere in particular: only fields independent of space evaluate here.
    Unbound { time: f64 },
    ElementXi {
        element: ElementHandle,
        xi: Vec<f64>,
        /// Enclosing element used when the element is a face or line of it.
        top_level_element: Option<ElementHandle>,
        time: f64,
    },
    Node { node: NodeHandle, time: f64 },
    /// Known values of a reference field, e.g. coordinates being searched for.
    FieldValues {
        field: Field,
        values: Vec<f64>,
        time: f64,
    },
}

impl Location {
    pub fn time(&self) -> f64 {
        match self {
            Location::Unbound { time }
            | Location::ElementXi { time, .. }
            | Location::Node { time, .. }
            | Location::FieldValues { time, .. } => *time,
        }
    }

    pub(crate) fn set_time(&mut self, new_time: f64) {
        match self {
            Location::Unbound { time }
            | Location::ElementXi { time, .. }
            | Location::Node { time, .. }
            | Location::FieldValues { time, .. } => *time = new_time,
        }
    }

    /// Derivatives are taken with respect to element xi, so only element
    /// locations have any.
    pub fn number_of_derivatives(&self) -> usize {
        match self {
            Location::ElementXi { element, .. } => element.dimension(),
            _ => 0,
        }
    }

    pub fn node(&self) -> Option<&NodeHandle> {
        match self {
            Location::Node { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn element_xi(&self) -> Option<(&ElementHandle, &[f64])> {
        match self {
            Location::ElementXi { element, xi, .. } => Some((element, xi.as_slice())),
            _ => None,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::Unbound { time: 0.0 }
    }
}
