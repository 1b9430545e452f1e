use serde::{Deserialize, Serialize};
use zinc_region_core::{ElementHandle, Region};

use super::format_number;
use crate::{AssignmentResult, CompositeError, EvaluationCache, Field, FieldError, ValueCache};

/// Where one composite component comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSource {
    /// Component `component` of source field `field`.
    Field { field: usize, component: usize },
    /// Literal value at this index of the composite's own values.
    Literal(usize),
}

impl ComponentSource {
    pub fn field(field: usize, component: usize) -> Self {
        ComponentSource::Field { field, component }
    }
}

/// Check a component map against its sources and literals.
///
/// Fields and literals must be introduced in order of first use, every
/// referenced component must exist, and every source field and literal must
/// be consumed.
pub(crate) fn validate_component_map(
    sources: &[Field],
    values: &[f64],
    map: &[ComponentSource],
) -> Result<(), CompositeError> {
    if map.is_empty() {
        return Err(CompositeError::NoComponents);
    }
    for (i, field) in sources.iter().enumerate() {
        if sources[..i].contains(field) {
            return Err(CompositeError::RepeatedSource(field.name()));
        }
    }
    let mut next_field = 0;
    let mut next_value = 0;
    for (component, entry) in map.iter().enumerate() {
        match *entry {
            ComponentSource::Literal(index) => {
                if index != next_value {
                    return Err(CompositeError::LiteralOutOfOrder {
                        component,
                        expected: next_value,
                        found: index,
                    });
                }
                next_value += 1;
            }
            ComponentSource::Field { field, component: source_component } => {
                let Some(source) = sources.get(field) else {
                    return Err(CompositeError::InvalidFieldIndex {
                        component,
                        index: field,
                    });
                };
                if field > next_field {
                    return Err(CompositeError::FieldOutOfOrder {
                        component,
                        index: field,
                        next: next_field,
                    });
                }
                if field == next_field {
                    next_field += 1;
                }
                if source_component >= source.number_of_components() {
                    return Err(CompositeError::ComponentOutOfRange {
                        component,
                        field: source.name(),
                        index: source_component,
                    });
                }
            }
        }
    }
    if next_field < sources.len() {
        return Err(CompositeError::UnusedFields);
    }
    if next_value < values.len() {
        return Err(CompositeError::UnusedValues);
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Composite {
    map: Vec<ComponentSource>,
}

impl Composite {
    pub(crate) fn new(map: Vec<ComponentSource>) -> Self {
        Self { map }
    }

    pub(crate) fn map(&self) -> &[ComponentSource] {
        &self.map
    }

    pub(crate) fn compare(&self, other: &Composite) -> bool {
        self.map == other.map
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let sources = cache.evaluate_source_fields(field)?;
        let literals = field.source_values();
        let derivatives = cache.derivatives_wanted();
        let derivatives_valid = derivatives > 0
            && sources
                .iter()
                .all(|s| s.derivatives_valid && s.number_of_derivatives == derivatives);

        let mut result =
            ValueCache::new(self.map.len(), if derivatives_valid { derivatives } else { 0 });
        let missing = || FieldError::not_defined(&field.name());
        for (c, entry) in self.map.iter().enumerate() {
            match *entry {
                ComponentSource::Field { field: f, component } => {
                    let source = sources.get(f).ok_or_else(missing)?;
                    result.values[c] = *source.values.get(component).ok_or_else(missing)?;
                    if derivatives_valid {
                        let row = source.derivative_row(component).ok_or_else(missing)?.to_vec();
                        result.derivative_row_mut(c).copy_from_slice(&row);
                    }
                }
                // literal rows stay zero
                ComponentSource::Literal(index) => {
                    result.values[c] = *literals.get(index).ok_or_else(missing)?;
                }
            }
        }
        result.derivatives_valid = derivatives_valid;
        Ok(result)
    }

    /// Route values back to each source in turn; already-assigned sources stay
    /// changed if a later one fails.
    pub(crate) fn assign(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
        values: &[f64],
    ) -> Result<AssignmentResult, FieldError> {
        let mut result = AssignmentResult::AllValuesSet;
        for (index, source) in field.source_fields().iter().enumerate() {
            let mut source_values = cache.evaluate(source)?.values.clone();
            for (c, entry) in self.map.iter().enumerate() {
                if let ComponentSource::Field { field: f, component } = *entry {
                    if f == index {
                        let slot = source_values
                            .get_mut(component)
                            .ok_or_else(|| FieldError::not_defined(&source.name()))?;
                        *slot = values[c];
                    }
                }
            }
            result = result.worst(cache.assign(source, &source_values)?);
        }

        let has_literals = self
            .map
            .iter()
            .any(|entry| matches!(entry, ComponentSource::Literal(_)));
        if has_literals {
            if cache.assign_in_cache_only() {
                result = result.worst(AssignmentResult::PartialValuesSet);
            } else {
                let mut changed = false;
                for (c, entry) in self.map.iter().enumerate() {
                    if let ComponentSource::Literal(index) = *entry {
                        changed |= field.set_source_value(index, values[c]);
                    }
                }
                if changed {
                    field.set_changed();
                }
            }
        }
        Ok(result)
    }

    /// Only works with exactly one source field: unmapped source components
    /// are searched for as zero.
    pub(crate) fn propagate_find_element_xi(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
        values: &[f64],
        search_region: &Region,
    ) -> Result<(ElementHandle, Vec<f64>), FieldError> {
        let sources = field.source_fields();
        let [source] = sources.as_slice() else {
            return Err(FieldError::FindElementXiUnsupported(field.name()));
        };
        let mut source_values = vec![0.0; source.number_of_components()];
        for (c, entry) in self.map.iter().enumerate() {
            if let ComponentSource::Field { component, .. } = *entry {
                let slot = source_values
                    .get_mut(component)
                    .ok_or_else(|| FieldError::not_defined(&source.name()))?;
                *slot = values[c];
            }
        }
        cache.find_element_xi(source, &source_values, search_region)
    }

    /// Whole source fields collapse to their name; otherwise `name.N` with a
    /// 1-based component, and literals as numbers.
    pub(crate) fn source_string(&self, field: &Field) -> String {
        let sources = field.source_fields();
        let literals = field.source_values();
        let mut tokens = Vec::with_capacity(self.map.len());
        let mut c = 0;
        while c < self.map.len() {
            match self.map[c] {
                ComponentSource::Field { field: f, component } => {
                    let source = &sources[f];
                    let width = source.number_of_components();
                    let whole = (0..width).all(|j| {
                        self.map.get(c + j)
                            == Some(&ComponentSource::Field {
                                field: f,
                                component: j,
                            })
                    });
                    if whole {
                        tokens.push(source.name());
                        c += width;
                        continue;
                    }
                    tokens.push(format!("{}.{}", source.name(), component + 1));
                }
                ComponentSource::Literal(index) => tokens.push(format_number(literals[index])),
            }
            c += 1;
        }
        tokens.join(" ")
    }
}
