//! Per-call evaluation context with a memo table.
//!
//! A cache is bound to one [`Location`]; every change of location or time
//! clears the memo table, so within one location each field is computed at
//! most once. Nested caches created for region reductions share the set of
//! fields currently being computed, so a field reached again through its own
//! sources fails with [`FieldError::Recursion`] instead of recursing forever.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use log::{debug, trace};
use zinc_region_core::{ElementHandle, NodeHandle, Region};

use crate::config::Config;
use crate::{AssignmentResult, Field, FieldError, FieldId, Location, ValueCache};

struct CacheEntry {
    field: Field,
    with_derivatives: bool,
    value: ValueCache,
}

pub struct EvaluationCache {
    location: Location,
    derivatives_requested: bool,
    assign_in_cache_only: bool,
    entries: HashMap<FieldId, CacheEntry>,
    in_progress: Rc<RefCell<HashSet<FieldId>>>,
    config: Rc<Config>,
    computations: u64,
}

impl std::fmt::Debug for EvaluationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationCache")
            .field("location", &self.location)
            .field("derivatives_requested", &self.derivatives_requested)
            .field("assign_in_cache_only", &self.assign_in_cache_only)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl EvaluationCache {
    pub(crate) fn new(config: Rc<Config>) -> Self {
        Self {
            location: Location::default(),
            derivatives_requested: false,
            assign_in_cache_only: false,
            entries: HashMap::with_capacity(config.memo_capacity),
            in_progress: Rc::new(RefCell::new(HashSet::new())),
            config,
            computations: 0,
        }
    }

    /// Child cache at the same time sharing the in-progress set.
    pub(crate) fn nested(&self) -> Self {
        Self {
            location: Location::Unbound {
                time: self.location.time(),
            },
            derivatives_requested: false,
            assign_in_cache_only: self.assign_in_cache_only,
            entries: HashMap::with_capacity(self.config.memo_capacity),
            in_progress: Rc::clone(&self.in_progress),
            config: Rc::clone(&self.config),
            computations: 0,
        }
    }

    // --- Location ---

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn time(&self) -> f64 {
        self.location.time()
    }

    pub fn set_time(&mut self, time: f64) {
        self.location.set_time(time);
        self.invalidate();
    }

    pub fn set_node(&mut self, node: NodeHandle) {
        self.location = Location::Node {
            node,
            time: self.time(),
        };
        self.invalidate();
    }

    pub fn set_element_xi(&mut self, element: ElementHandle, xi: &[f64]) -> Result<(), FieldError> {
        self.set_element_xi_with_top_level(element, xi, None)
    }

    pub fn set_element_xi_with_top_level(
        &mut self,
        element: ElementHandle,
        xi: &[f64],
        top_level_element: Option<ElementHandle>,
    ) -> Result<(), FieldError> {
        if !element.exists() || xi.len() != element.dimension() {
            return Err(FieldError::InvalidArgument(format!(
                "{} xi values for {element:?}",
                xi.len()
            )));
        }
        self.location = Location::ElementXi {
            element,
            xi: xi.to_vec(),
            top_level_element,
            time: self.time(),
        };
        self.invalidate();
        Ok(())
    }

    /// Evaluate at known values of `field`.
    pub fn set_field_values(&mut self, field: &Field, values: &[f64]) -> Result<(), FieldError> {
        if values.len() != field.number_of_components() {
            return Err(FieldError::InvalidArgument(format!(
                "field '{}' has {} components, got {} values",
                field.name(),
                field.number_of_components(),
                values.len()
            )));
        }
        self.location = Location::FieldValues {
            field: field.clone(),
            values: values.to_vec(),
            time: self.time(),
        };
        self.invalidate();
        Ok(())
    }

    pub fn clear_location(&mut self) {
        self.location = Location::Unbound { time: self.time() };
        self.invalidate();
    }

    pub fn set_derivatives_requested(&mut self, requested: bool) {
        self.derivatives_requested = requested;
    }

    pub fn derivatives_requested(&self) -> bool {
        self.derivatives_requested
    }

    /// Assignments only update cached values, leaving sources untouched.
    pub fn set_assign_in_cache_only(&mut self, cache_only: bool) {
        self.assign_in_cache_only = cache_only;
    }

    pub fn assign_in_cache_only(&self) -> bool {
        self.assign_in_cache_only
    }

    /// Forget every memoized value.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    /// Number of field computations run through this cache, memo hits excluded.
    pub fn computation_count(&self) -> u64 {
        self.computations
    }

    pub(crate) fn derivatives_wanted(&self) -> usize {
        if self.derivatives_requested {
            self.location.number_of_derivatives()
        } else {
            0
        }
    }

    // --- Evaluation ---

    pub fn evaluate(&mut self, field: &Field) -> Result<&ValueCache, FieldError> {
        let id = field.id();
        let with_derivatives = self.derivatives_wanted() > 0;
        let current = matches!(
            self.entries.get(&id),
            Some(entry) if entry.with_derivatives || !with_derivatives
        );
        if current {
            trace!("memo hit for '{}'", field.name());
        } else {
            let value = self.compute(field)?;
            self.entries.insert(
                id,
                CacheEntry {
                    field: field.clone(),
                    with_derivatives,
                    value,
                },
            );
        }
        Ok(&self.entries[&id].value)
    }

    pub fn evaluate_real(&mut self, field: &Field) -> Result<Vec<f64>, FieldError> {
        Ok(self.evaluate(field)?.values.clone())
    }

    /// Values plus derivatives with respect to element xi, when available.
    pub fn evaluate_with_derivatives(
        &mut self,
        field: &Field,
    ) -> Result<(Vec<f64>, Option<Vec<f64>>), FieldError> {
        let requested = self.derivatives_requested;
        self.derivatives_requested = true;
        let result = self
            .evaluate(field)
            .map(|v| (v.values.clone(), v.valid_derivatives().map(<[f64]>::to_vec)));
        self.derivatives_requested = requested;
        result
    }

    /// Evaluate every source of `field` depth-first, left to right.
    pub(crate) fn evaluate_source_fields(
        &mut self,
        field: &Field,
    ) -> Result<Vec<ValueCache>, FieldError> {
        field
            .source_fields()
            .iter()
            .map(|source| self.evaluate(source).cloned())
            .collect()
    }

    fn compute(&mut self, field: &Field) -> Result<ValueCache, FieldError> {
        if let Location::FieldValues {
            field: reference,
            values,
            ..
        } = &self.location
        {
            if reference == field {
                return Ok(ValueCache::from_values(values.clone()));
            }
        }
        let id = field.id();
        if !self.in_progress.borrow_mut().insert(id) {
            debug!("'{}' reached again while being evaluated", field.name());
            return Err(FieldError::Recursion { field: field.name() });
        }
        self.computations += 1;
        let result = field.core().evaluate(field, self);
        self.in_progress.borrow_mut().remove(&id);
        match result {
            Ok(mut value) => {
                if value.number_of_derivatives == 0 {
                    value.invalidate_derivatives();
                }
                Ok(value)
            }
            Err(err) => {
                debug!("evaluating '{}' failed: {err}", field.name());
                Err(err)
            }
        }
    }

    pub fn is_defined(&mut self, field: &Field) -> bool {
        if let Location::FieldValues { field: reference, .. } = &self.location {
            if reference == field {
                return true;
            }
        }
        field.core().is_defined_at_location(field, self)
    }

    // --- Assignment ---

    /// Set `field` to `values` at the current location.
    ///
    /// Failure after some sources were assigned leaves those sources changed.
    pub fn assign(&mut self, field: &Field, values: &[f64]) -> Result<AssignmentResult, FieldError> {
        if values.len() != field.number_of_components() {
            return Err(FieldError::InvalidArgument(format!(
                "field '{}' has {} components, got {} values",
                field.name(),
                field.number_of_components(),
                values.len()
            )));
        }
        let result = field.core().assign(field, self, values);
        match &result {
            Ok(outcome) if self.assign_in_cache_only => {
                let id = field.id();
                self.entries
                    .retain(|key, entry| *key == id || !entry.field.depends_on(field));
                let value = ValueCache::from_values(values.to_vec());
                self.entries.insert(
                    id,
                    CacheEntry {
                        field: field.clone(),
                        with_derivatives: true,
                        value,
                    },
                );
                trace!("assigned '{}' in cache only: {outcome:?}", field.name());
            }
            Ok(_) => self.invalidate(),
            Err(err) => {
                debug!("assigning '{}' failed: {err}", field.name());
                if !self.assign_in_cache_only {
                    self.invalidate();
                }
            }
        }
        result
    }

    /// Find the element and xi where `field` takes `values`, searching the
    /// elements of `search_region`.
    pub fn find_element_xi(
        &mut self,
        field: &Field,
        values: &[f64],
        search_region: &Region,
    ) -> Result<(ElementHandle, Vec<f64>), FieldError> {
        if values.len() != field.number_of_components() {
            return Err(FieldError::InvalidArgument(format!(
                "field '{}' has {} components, got {} values",
                field.name(),
                field.number_of_components(),
                values.len()
            )));
        }
        field.core().find_element_xi(field, self, values, search_region)
    }
}

#[cfg(test)]
mod tests {
    use zinc_region_core::Region;

    use crate::{FieldError, FieldModule};

    #[test]
    fn field_reached_while_in_progress_is_recursion() {
        let module = FieldModule::new(Region::new("root"));
        let k = module.create_constant(&[1.0]).expect("constant");
        let copy = module.create_identity(&k).expect("identity");
        let mut cache = module.create_cache();

        cache.in_progress.borrow_mut().insert(k.id());
        let err = cache.evaluate(&copy).unwrap_err();
        assert_eq!(err, FieldError::Recursion { field: k.name() });
        assert!(cache.in_progress.borrow().contains(&k.id()));
        assert!(!cache.in_progress.borrow().contains(&copy.id()));

        cache.in_progress.borrow_mut().clear();
        assert_eq!(cache.evaluate_real(&copy).expect("evaluate"), vec![1.0]);
    }

    #[test]
    fn nested_caches_share_the_in_progress_set() {
        let module = FieldModule::new(Region::new("root"));
        let mut cache = module.create_cache();
        cache.set_time(2.5);
        let nested = cache.nested();
        assert_eq!(nested.time(), 2.5);
        nested.in_progress.borrow_mut().insert(crate::FieldId(7));
        assert!(cache.in_progress.borrow().contains(&crate::FieldId(7)));
    }
}
