use log::trace;
use zinc_region_core::Region;

use crate::{EvaluationCache, Field, FieldError, ValueCache};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReductionKind {
    Sum,
    Mean,
    /// Root mean square over every component of every node: a scalar.
    Rms,
}

impl ReductionKind {
    pub(crate) fn number_of_components(self, source_components: usize) -> usize {
        match self {
            ReductionKind::Sum | ReductionKind::Mean => source_components,
            ReductionKind::Rms => 1,
        }
    }
}

/// Reduces a source over the nodes of a region, independent of the caller's
/// location apart from its time.
#[derive(Clone, Debug)]
pub(crate) struct RegionOperation {
    kind: ReductionKind,
    region: Region,
}

impl RegionOperation {
    pub(crate) fn new(kind: ReductionKind, region: Region) -> Self {
        Self { kind, region }
    }

    pub(crate) fn kind(&self) -> ReductionKind {
        self.kind
    }

    pub(crate) fn region(&self) -> &Region {
        &self.region
    }

    pub(crate) fn compare(&self, other: &RegionOperation) -> bool {
        self.kind == other.kind && self.region == other.region
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let source = field
            .source_field(0)
            .ok_or_else(|| FieldError::not_defined(&field.name()))?;
        let width = source.number_of_components();
        if self.kind != ReductionKind::Rms && width != field.number_of_components() {
            return Err(FieldError::not_defined(&field.name()));
        }
        let mut nested = cache.nested();
        let mut sum = vec![0.0; width];
        let mut sum_of_squares = 0.0;
        let mut count = 0usize;
        for id in self.region.node_ids() {
            let Some(node) = self.region.node(id) else {
                continue;
            };
            nested.set_node(node);
            if let Ok(value) = nested.evaluate(&source) {
                for (total, v) in sum.iter_mut().zip(&value.values) {
                    *total += v;
                    sum_of_squares += v * v;
                }
                count += 1;
            }
        }
        trace!(
            "{} '{}': {count} of {} nodes contributed",
            field.type_name(),
            field.name(),
            self.region.number_of_nodes()
        );

        let values = match self.kind {
            ReductionKind::Sum => sum,
            ReductionKind::Mean if count > 0 => sum.iter().map(|v| v / count as f64).collect(),
            ReductionKind::Mean => vec![0.0; sum.len()],
            ReductionKind::Rms if count > 0 => vec![(sum_of_squares / count as f64).sqrt()],
            ReductionKind::Rms => vec![0.0],
        };
        Ok(ValueCache::from_values(values))
    }

    /// Checks only the first node of the region.
    pub(crate) fn is_defined_at_location(&self, field: &Field, cache: &mut EvaluationCache) -> bool {
        let (Some(source), Some(first)) = (
            field.source_field(0),
            self.region.node_ids().first().and_then(|&id| self.region.node(id)),
        ) else {
            return false;
        };
        let mut nested = cache.nested();
        nested.set_node(first);
        nested.is_defined(&source)
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        let source = field.source_field(0).map(|s| s.name()).unwrap_or_default();
        format!("field {source} region {}", self.region.name())
    }
}
