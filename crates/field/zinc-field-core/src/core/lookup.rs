use std::cell::RefCell;
use std::fmt;

use log::debug;
use zinc_region_core::{NodeHandle, RegionChange, RegionSubscription};

use crate::quaternion;
use crate::{ChangeFlags, EvaluationCache, Field, FieldError, ValueCache};

/// A fixed node plus the private cache pinned to it.
///
/// The cache is created when the field is attached and lives as long as the
/// field. A region callback reports edits to the node as a dependency change.
pub(crate) struct NodeBinding {
    node: NodeHandle,
    cache: RefCell<Option<EvaluationCache>>,
    subscription: Option<RegionSubscription>,
}

impl fmt::Debug for NodeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBinding")
            .field("node", &self.node)
            .field("attached", &self.subscription.is_some())
            .finish()
    }
}

impl NodeBinding {
    fn new(node: NodeHandle) -> Self {
        Self {
            node,
            cache: RefCell::new(None),
            subscription: None,
        }
    }

    fn attach(&mut self, field: &Field) -> Result<(), FieldError> {
        if !self.node.exists() {
            return Err(FieldError::InvalidArgument(format!(
                "node {} is not in region '{}'",
                self.node.identifier(),
                self.node.region().name()
            )));
        }
        let mut cache = EvaluationCache::new(field.0.config.clone());
        cache.set_node(self.node.clone());
        *self.cache.borrow_mut() = Some(cache);

        let weak = field.downgrade();
        let node_id = self.node.identifier();
        self.subscription = Some(self.node.region().add_callback(move |changes| {
            let touched = changes
                .iter()
                .any(|change| change.node() == Some(node_id));
            if !touched {
                return;
            }
            if let Some(field) = weak.upgrade() {
                if changes.contains(&RegionChange::NodeRemoved(node_id)) {
                    debug!("lookup node {node_id} of '{}' was removed", field.name());
                }
                field.dependency_changed(ChangeFlags::FULL_RESULT);
            }
        }));
        Ok(())
    }

    /// Evaluate `source` at the bound node and the given time.
    fn evaluate_at(&self, field: &Field, source: &Field, time: f64) -> Result<ValueCache, FieldError> {
        let mut slot = self
            .cache
            .try_borrow_mut()
            .map_err(|_| FieldError::Recursion { field: field.name() })?;
        let cache = slot
            .as_mut()
            .ok_or_else(|| FieldError::not_defined(&field.name()))?;
        cache.set_time(time);
        Ok(cache.evaluate(source)?.clone())
    }

    fn is_defined(&self, source: &Field) -> bool {
        if !self.node.exists() {
            return false;
        }
        match self.cache.try_borrow_mut() {
            Ok(mut slot) => slot.as_mut().map_or(false, |cache| cache.is_defined(source)),
            Err(_) => false,
        }
    }
}

fn first_source(field: &Field) -> Result<Field, FieldError> {
    field
        .source_field(0)
        .ok_or_else(|| FieldError::not_defined(&field.name()))
}

/// The source's value at a fixed node, whatever the caller's location.
#[derive(Debug)]
pub(crate) struct NodalLookup {
    binding: NodeBinding,
}

impl NodalLookup {
    pub(crate) fn new(node: NodeHandle) -> Self {
        Self {
            binding: NodeBinding::new(node),
        }
    }

    pub(crate) fn node(&self) -> &NodeHandle {
        &self.binding.node
    }

    pub(crate) fn copy_definition(&self) -> Self {
        Self::new(self.binding.node.clone())
    }

    pub(crate) fn compare(&self, other: &NodalLookup) -> bool {
        self.binding.node == other.binding.node
    }

    pub(crate) fn attach_to_field(&mut self, field: &Field) -> Result<(), FieldError> {
        self.binding.attach(field)
    }

    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let source = first_source(field)?;
        let value = self.binding.evaluate_at(field, &source, cache.time())?;
        Ok(ValueCache::from_values(value.values))
    }

    pub(crate) fn is_defined_at_location(&self, field: &Field) -> bool {
        field
            .source_field(0)
            .map_or(false, |source| self.binding.is_defined(&source))
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        let source = field.source_field(0).map(|s| s.name()).unwrap_or_default();
        format!("{source} node {}", self.binding.node.identifier())
    }
}

/// Interpolates a (w, x, y, z) quaternion source between the time-sequence
/// samples of a fixed node.
#[derive(Debug)]
pub(crate) struct QuaternionSlerp {
    binding: NodeBinding,
}

impl QuaternionSlerp {
    pub(crate) fn new(node: NodeHandle) -> Self {
        Self {
            binding: NodeBinding::new(node),
        }
    }

    pub(crate) fn node(&self) -> &NodeHandle {
        &self.binding.node
    }

    pub(crate) fn copy_definition(&self) -> Self {
        Self::new(self.binding.node.clone())
    }

    pub(crate) fn compare(&self, other: &QuaternionSlerp) -> bool {
        self.binding.node == other.binding.node
    }

    pub(crate) fn attach_to_field(&mut self, field: &Field) -> Result<(), FieldError> {
        self.binding.attach(field)
    }

    /// Times outside the sequence clamp to its first or last sample.
    pub(crate) fn evaluate(
        &self,
        field: &Field,
        cache: &mut EvaluationCache,
    ) -> Result<ValueCache, FieldError> {
        let source = first_source(field)?;
        let node = &self.binding.node;
        let sequence = source.time_sequence_at_node(node).ok_or_else(|| {
            FieldError::MissingTimeSequence {
                field: field.name(),
                node: node.identifier(),
            }
        })?;
        let found = sequence.interpolation_for_time(cache.time());
        let time_one = sequence.time(found.index_one).unwrap_or_else(|| sequence.first_time());
        let time_two = sequence.time(found.index_two).unwrap_or_else(|| sequence.last_time());

        let from = self.binding.evaluate_at(field, &source, time_one)?.values;
        let to = if found.index_two == found.index_one {
            from.clone()
        } else {
            self.binding.evaluate_at(field, &source, time_two)?.values
        };
        let blended = quaternion::slerp(&from, &to, found.xi, field.config().slerp_epsilon)
            .ok_or_else(|| FieldError::not_defined(&field.name()))?;
        Ok(ValueCache::from_values(blended.to_vec()))
    }

    pub(crate) fn is_defined_at_location(&self, field: &Field) -> bool {
        field.source_field(0).map_or(false, |source| {
            source.time_sequence_at_node(&self.binding.node).is_some()
                && self.binding.is_defined(&source)
        })
    }

    pub(crate) fn source_string(&self, field: &Field) -> String {
        let source = field.source_field(0).map(|s| s.name()).unwrap_or_default();
        format!("{source} node {}", self.binding.node.identifier())
    }
}
