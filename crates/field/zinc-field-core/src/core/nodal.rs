use std::fmt;

use zinc_region_core::{ElementHandle, NodeHandle, Region, RegionChange, RegionSubscription, TimeSequence};

use crate::{AssignmentResult, ChangeFlags, EvaluationCache, Field, FieldError, Location, ValueCache};

/// Nodal parameters stored under a name on mesh nodes.
pub(crate) struct NodeValue {
    parameter_name: String,
    region: Region,
    subscription: Option<RegionSubscription>,
}

impl fmt::Debug for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeValue")
            .field("parameter_name", &self.parameter_name)
            .field("region", &self.region.name())
            .finish()
    }
}

impl NodeValue {
    pub(crate) fn new(parameter_name: impl Into<String>, region: Region) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            region,
            subscription: None,
        }
    }

    pub(crate) fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub(crate) fn copy_definition(&self) -> Self {
        Self::new(self.parameter_name.clone(), self.region.clone())
    }

    pub(crate) fn compare(&self, other: &NodeValue) -> bool {
        self.parameter_name == other.parameter_name && self.region == other.region
    }

    /// Edits of the parameters at some nodes change some results.
    pub(crate) fn attach_to_field(&mut self, field: &Field) {
        let weak = field.downgrade();
        let name = self.parameter_name.clone();
        self.subscription = Some(self.region.add_callback(move |changes| {
            let relevant = changes.iter().any(|change| match change {
                RegionChange::NodeFieldChanged { field, .. } => *field == name,
                RegionChange::NodeRemoved(_) => true,
                _ => false,
            });
            if relevant {
                if let Some(field) = weak.upgrade() {
                    field.dependency_changed(ChangeFlags::PARTIAL_RESULT);
                }
            }
        }));
    }

    fn node_and_time<'a>(&self, field: &Field, cache: &'a EvaluationCache) -> Result<(&'a NodeHandle, f64), FieldError> {
        match cache.location() {
            Location::Node { node, time } => Ok((node, *time)),
            _ => Err(FieldError::not_defined(&field.name())),
        }
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let (node, time) = self.node_and_time(field, cache)?;
        let values = node
            .field_values(&self.parameter_name, time)
            .map_err(|_| FieldError::not_defined(&field.name()))?;
        if values.len() != field.number_of_components() {
            return Err(FieldError::not_defined(&field.name()));
        }
        Ok(ValueCache::from_values(values))
    }

    /// Writes the sample at the cache time unless assigning to the cache only.
    pub(crate) fn assign(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
        values: &[f64],
    ) -> Result<AssignmentResult, FieldError> {
        let (node, time) = self.node_and_time(field, cache)?;
        if !node.defines(&self.parameter_name) {
            return Err(FieldError::not_defined(&field.name()));
        }
        if cache.assign_in_cache_only() {
            return Ok(AssignmentResult::AllValuesSet);
        }
        node.set_field_values(&self.parameter_name, time, values, field.config().time_tolerance)
            .map_err(|e| FieldError::AssignmentFailed {
                field: field.name(),
                reason: e.to_string(),
            })?;
        Ok(AssignmentResult::AllValuesSet)
    }

    pub(crate) fn is_defined_at_location(&self, field: &Field, cache: &EvaluationCache) -> bool {
        cache.location().node().map_or(false, |node| {
            node.region()
                .with_node(node.identifier(), |n| {
                    n.parameters(&self.parameter_name)
                        .map_or(false, |p| p.number_of_components() == field.number_of_components())
                })
                .unwrap_or(false)
        })
    }

    pub(crate) fn time_sequence_at_node(&self, node: &NodeHandle) -> Option<TimeSequence> {
        node.time_sequence(&self.parameter_name)
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        format!(
            "parameters {} components {}",
            self.parameter_name,
            field.number_of_components()
        )
    }
}

/// Element xi padded to three components, with identity derivatives.
pub(crate) fn evaluate_xi(field: &Field, cache: &mut EvaluationCache) -> Result<ValueCache, FieldError> {
    let (element, xi) = cache
        .location()
        .element_xi()
        .ok_or_else(|| FieldError::not_defined(&field.name()))?;
    let dimension = element.dimension();
    let mut values = xi.to_vec();
    values.resize(field.number_of_components(), 0.0);

    let derivatives = cache.derivatives_wanted();
    let mut result = ValueCache::new(values.len(), derivatives);
    result.values = values;
    if derivatives > 0 {
        for d in 0..dimension.min(result.values.len()) {
            result.derivative_row_mut(d)[d] = 1.0;
        }
        result.derivatives_valid = true;
    }
    Ok(result)
}

/// First element of the search region whose xi range holds `values`.
pub(crate) fn find_element_xi(
    field: &Field,
    values: &[f64],
    search_region: &Region,
) -> Result<(ElementHandle, Vec<f64>), FieldError> {
    let tolerance = field.config().xi_tolerance;
    for element in search_region.elements() {
        let dimension = element.dimension();
        let (xi, rest) = values.split_at(dimension.min(values.len()));
        let inside = xi
            .iter()
            .all(|&v| (-tolerance..=1.0 + tolerance).contains(&v));
        let flat = rest.iter().all(|v| v.abs() <= tolerance);
        if xi.len() == dimension && inside && flat {
            let clamped = xi.iter().map(|v| v.clamp(0.0, 1.0)).collect();
            return Ok((element, clamped));
        }
    }
    Err(FieldError::not_defined(&field.name()))
}
