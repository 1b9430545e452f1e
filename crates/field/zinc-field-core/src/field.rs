//! Field handles: named, reference-counted nodes of the source graph.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use zinc_region_core::{NodeHandle, TimeSequence};

use crate::config::Config;
use crate::core::{FieldCore, FieldKind};
use crate::manager::{Manager, ManagerInner};
use crate::{ChangeFlags, FieldError, FieldId};

pub(crate) struct FieldNode {
    pub(crate) id: FieldId,
    pub(crate) name: RefCell<String>,
    pub(crate) number_of_components: Cell<usize>,
    pub(crate) sources: RefCell<Vec<Field>>,
    pub(crate) source_values: RefCell<Vec<f64>>,
    pub(crate) core: RefCell<FieldCore>,
    pub(crate) manager: Weak<ManagerInner>,
    pub(crate) managed: Cell<bool>,
    pub(crate) config: Rc<Config>,
    /// Fields that listed this one as a source; stale links are pruned lazily.
    pub(crate) dependents: RefCell<Vec<WeakField>>,
}

/// Shared handle to a field. Cloning accesses the field; dropping the last
/// handle (and every dependent field) destroys it.
#[derive(Clone)]
pub struct Field(pub(crate) Rc<FieldNode>);

/// Non-owning reference used by callbacks registered on regions.
#[derive(Clone)]
pub(crate) struct WeakField(Weak<FieldNode>);

impl WeakField {
    pub(crate) fn upgrade(&self) -> Option<Field> {
        self.0.upgrade().map(Field)
    }

    fn points_to(&self, field: &Field) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&field.0))
    }
}

/// Serializable summary of a field's definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub name: String,
    pub kind: FieldKind,
    pub components: usize,
    pub sources: Vec<String>,
    pub source_values: Vec<f64>,
    /// Type-specific definition, in command syntax.
    pub definition: String,
    pub managed: bool,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Field {}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.0.id)
            .field("name", &*self.0.name.borrow())
            .field("kind", &self.kind())
            .field("components", &self.number_of_components())
            .finish()
    }
}

impl Field {
    pub(crate) fn new(node: FieldNode) -> Field {
        Field(Rc::new(node))
    }

    pub fn id(&self) -> FieldId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    /// Rename through the owning manager, which keeps names unique.
    pub fn set_name(&self, name: &str) -> Result<(), FieldError> {
        self.manager()
            .ok_or_else(|| FieldError::NotManaged(self.name()))?
            .rename(self, name)
    }

    pub fn number_of_components(&self) -> usize {
        self.0.number_of_components.get()
    }

    pub fn kind(&self) -> FieldKind {
        self.core().kind()
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn source_fields(&self) -> Vec<Field> {
        self.0.sources.borrow().clone()
    }

    pub fn number_of_source_fields(&self) -> usize {
        self.0.sources.borrow().len()
    }

    pub fn source_field(&self, index: usize) -> Option<Field> {
        self.0.sources.borrow().get(index).cloned()
    }

    /// Literal constants owned by the field.
    pub fn source_values(&self) -> Vec<f64> {
        self.0.source_values.borrow().clone()
    }

    /// Managed fields stay registered when no handle refers to them.
    pub fn is_managed(&self) -> bool {
        self.0.managed.get()
    }

    pub fn set_managed(&self, managed: bool) {
        if self.0.managed.replace(managed) != managed {
            if let Some(manager) = self.manager() {
                manager.field_changed(self, ChangeFlags::DEFINITION);
            }
        }
    }

    /// Number of handles and dependent fields referring to this field.
    pub fn access_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn manager(&self) -> Option<Manager> {
        self.0.manager.upgrade().map(Manager::from_inner)
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Whether `other` is in this field's transitive source closure.
    pub fn depends_on(&self, other: &Field) -> bool {
        let mut visited = HashSet::new();
        let mut stack = self.source_fields();
        while let Some(field) = stack.pop() {
            if field == *other {
                return true;
            }
            if visited.insert(field.id()) {
                stack.extend(field.source_fields());
            }
        }
        false
    }

    /// Whether any live field, registered or not, reads this one as a direct
    /// source.
    pub fn has_dependents(&self) -> bool {
        let mut dependents = self.0.dependents.borrow_mut();
        dependents.retain(|link| link.upgrade().is_some());
        dependents.iter().filter_map(WeakField::upgrade).any(|dependent| {
            dependent != *self && dependent.0.sources.borrow().contains(self)
        })
    }

    /// A composite with no source fields: every component is a literal.
    pub fn is_constant(&self) -> bool {
        self.kind() == FieldKind::Composite && self.number_of_source_fields() == 0
    }

    pub fn is_constant_scalar(&self, value: f64) -> bool {
        self.is_constant()
            && self.number_of_components() == 1
            && self.0.source_values.borrow().first() == Some(&value)
    }

    /// Time sequence governing this field's values at `node`, if any.
    pub fn time_sequence_at_node(&self, node: &NodeHandle) -> Option<TimeSequence> {
        self.core().time_sequence_at_node(self, node)
    }

    pub fn describe(&self) -> FieldDescription {
        FieldDescription {
            name: self.name(),
            kind: self.kind(),
            components: self.number_of_components(),
            sources: self.source_fields().iter().map(Field::name).collect(),
            source_values: self.source_values(),
            definition: self.core().source_string(self),
            managed: self.is_managed(),
        }
    }

    /// Definition in command syntax, e.g. `composite a b.2 3.5`.
    pub fn command_string(&self) -> String {
        let definition = self.core().source_string(self);
        if definition.is_empty() {
            self.type_name().to_string()
        } else {
            format!("{} {}", self.type_name(), definition)
        }
    }

    // --- crate internals ---

    pub(crate) fn downgrade(&self) -> WeakField {
        WeakField(Rc::downgrade(&self.0))
    }

    /// Record this field as a dependent of each of its sources.
    pub(crate) fn link_sources(&self) {
        for source in self.0.sources.borrow().iter() {
            let mut dependents = source.0.dependents.borrow_mut();
            if !dependents.iter().any(|link| link.points_to(self)) {
                dependents.push(self.downgrade());
            }
        }
    }

    pub(crate) fn core(&self) -> Ref<'_, FieldCore> {
        self.0.core.borrow()
    }

    pub(crate) fn core_mut(&self) -> Result<RefMut<'_, FieldCore>, FieldError> {
        self.0
            .core
            .try_borrow_mut()
            .map_err(|_| FieldError::ManagerBusy)
    }

    pub(crate) fn set_source_value(&self, index: usize, value: f64) -> bool {
        let mut values = self.0.source_values.borrow_mut();
        match values.get_mut(index) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Report a change of this field's own definition or values.
    pub(crate) fn set_changed(&self) {
        if let Some(manager) = self.manager() {
            manager.field_changed(self, ChangeFlags::OBJECT_NOT_IDENTIFIER);
        }
    }

    /// Report that data this field reads outside the source graph changed.
    pub(crate) fn dependency_changed(&self, flags: ChangeFlags) {
        if let Some(manager) = self.manager() {
            manager.field_changed(self, flags);
        }
    }

    pub(crate) fn belongs_to(&self, manager: &Manager) -> bool {
        Weak::ptr_eq(&self.0.manager, &manager.downgrade())
    }

    /// Same kind, sources, literals and type-specific parameters.
    pub(crate) fn has_same_definition(&self, other: &Field) -> bool {
        self.number_of_components() == other.number_of_components()
            && *self.0.sources.borrow() == *other.0.sources.borrow()
            && *self.0.source_values.borrow() == *other.0.source_values.borrow()
            && self.core().compare(&other.core())
    }

    /// Replace the definition in place, keeping identity and name.
    pub(crate) fn install_definition(
        &self,
        mut core: FieldCore,
        components: usize,
        sources: Vec<Field>,
        source_values: Vec<f64>,
    ) -> Result<(), FieldError> {
        core.attach_to_field(self)?;
        *self.core_mut()? = core;
        self.0.number_of_components.set(components);
        *self.0.sources.borrow_mut() = sources;
        *self.0.source_values.borrow_mut() = source_values;
        self.link_sources();
        Ok(())
    }
}
