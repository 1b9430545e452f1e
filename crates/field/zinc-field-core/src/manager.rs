//! Field registry with batched change notification.
//!
//! The manager owns the canonical reference to every registered field and
//! keeps names unique. Changes are recorded per field and coalesced while a
//! `begin_change`/`end_change` bracket is open; when the outermost bracket
//! closes, result changes are propagated to dependent fields and a single
//! [`ManagerMessage`] is sent to every subscriber.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::{ChangeFlags, Field, FieldError, FieldId};

type Listener = Rc<dyn Fn(&ManagerMessage)>;

#[derive(Default)]
struct ManagerState {
    fields: IndexMap<String, Field>,
    change_level: usize,
    changes: IndexMap<FieldId, (Field, ChangeFlags)>,
    dispatching: bool,
    next_temporary: usize,
}

pub(crate) struct ManagerInner {
    state: RefCell<ManagerState>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_listener: Cell<u64>,
    next_field_id: Cell<u64>,
}

/// Shared handle to a field registry.
#[derive(Clone)]
pub struct Manager(Rc<ManagerInner>);

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Manager")
            .field("fields", &state.fields.len())
            .field("change_level", &state.change_level)
            .field("pending_changes", &state.changes.len())
            .finish()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Manager(Rc::new(ManagerInner {
            state: RefCell::new(ManagerState::default()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            next_field_id: Cell::new(1),
        }))
    }

    pub(crate) fn from_inner(inner: Rc<ManagerInner>) -> Self {
        Manager(inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ManagerInner> {
        Rc::downgrade(&self.0)
    }

    #[inline]
    pub(crate) fn allocate_field_id(&self) -> FieldId {
        let id = self.0.next_field_id.get();
        self.0.next_field_id.set(id.wrapping_add(1));
        FieldId(id)
    }

    /// Next `<prefix><n>` not naming a registered field.
    pub(crate) fn temporary_name(&self, prefix: &str) -> String {
        let mut state = self.0.state.borrow_mut();
        loop {
            state.next_temporary += 1;
            let name = format!("{prefix}{}", state.next_temporary);
            if !state.fields.contains_key(&name) {
                return name;
            }
        }
    }

    // --- Registry ---

    pub fn find_by_name(&self, name: &str) -> Option<Field> {
        self.0.state.borrow().fields.get(name).cloned()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.0.state.borrow().fields.values().cloned().collect()
    }

    pub fn number_of_fields(&self) -> usize {
        self.0.state.borrow().fields.len()
    }

    pub fn contains(&self, field: &Field) -> bool {
        self.0
            .state
            .borrow()
            .fields
            .get(&field.name())
            .map_or(false, |f| f == field)
    }

    /// Whether another live field uses `field` as a direct source, including
    /// fields already removed from the registry but still held elsewhere.
    pub fn is_in_use(&self, field: &Field) -> bool {
        field.belongs_to(self) && field.has_dependents()
    }

    fn ensure_idle(&self) -> Result<(), FieldError> {
        if self.0.state.borrow().dispatching {
            return Err(FieldError::ManagerBusy);
        }
        Ok(())
    }

    pub fn add(&self, field: &Field) -> Result<(), FieldError> {
        self.ensure_idle()?;
        if !field.belongs_to(self) {
            return Err(FieldError::NotManaged(field.name()));
        }
        let name = field.name();
        {
            let mut state = self.0.state.borrow_mut();
            if state.fields.contains_key(&name) {
                return Err(FieldError::DuplicateName(name));
            }
            state.fields.insert(name.clone(), field.clone());
        }
        trace!("added field '{name}'");
        self.field_changed(field, ChangeFlags::ADD);
        Ok(())
    }

    /// Unregister a field no other registered field depends on.
    pub fn remove(&self, field: &Field) -> Result<(), FieldError> {
        self.ensure_idle()?;
        if !self.contains(field) {
            return Err(FieldError::NotManaged(field.name()));
        }
        if self.is_in_use(field) {
            return Err(FieldError::InUse(field.name()));
        }
        self.0.state.borrow_mut().fields.shift_remove(&field.name());
        self.record_change(field, ChangeFlags::REMOVE);
        self.update_if_idle();
        Ok(())
    }

    pub fn rename(&self, field: &Field, name: &str) -> Result<(), FieldError> {
        self.ensure_idle()?;
        let old = field.name();
        if old == name {
            return Ok(());
        }
        if name.is_empty() {
            return Err(FieldError::InvalidArgument("field name is empty".to_string()));
        }
        {
            let mut state = self.0.state.borrow_mut();
            if !state.fields.get(&old).map_or(false, |f| f == field) {
                return Err(FieldError::NotManaged(old));
            }
            if state.fields.contains_key(name) {
                return Err(FieldError::DuplicateName(name.to_string()));
            }
            state.fields.shift_remove(&old);
            state.fields.insert(name.to_string(), field.clone());
        }
        *field.0.name.borrow_mut() = name.to_string();
        debug!("renamed field '{old}' to '{name}'");
        self.field_changed(field, ChangeFlags::IDENTIFIER);
        Ok(())
    }

    /// Give `target` the definition of `replacement`, keeping its identity
    /// and name. Identical definitions change nothing.
    pub fn redefine(&self, target: &Field, replacement: &Field) -> Result<(), FieldError> {
        self.ensure_idle()?;
        if !self.contains(target) {
            return Err(FieldError::NotManaged(target.name()));
        }
        if !replacement.belongs_to(self) {
            return Err(FieldError::NotManaged(replacement.name()));
        }
        if target == replacement || target.has_same_definition(replacement) {
            return Ok(());
        }
        if replacement.depends_on(target) {
            return Err(FieldError::Cycle {
                field: target.name(),
                dependency: replacement.name(),
            });
        }
        let current = target.number_of_components();
        let requested = replacement.number_of_components();
        if current != requested && self.is_in_use(target) {
            return Err(FieldError::ComponentCountLocked {
                field: target.name(),
                current,
                requested,
            });
        }
        let core = replacement.core().copy_definition();
        target.install_definition(
            core,
            requested,
            replacement.source_fields(),
            replacement.source_values(),
        )?;
        debug!(
            "redefined '{}' as {}",
            target.name(),
            target.command_string()
        );
        self.field_changed(target, ChangeFlags::OBJECT_NOT_IDENTIFIER);
        Ok(())
    }

    // --- Change batching ---

    pub fn begin_change(&self) {
        self.0.state.borrow_mut().change_level += 1;
    }

    pub fn end_change(&self) {
        let outermost = {
            let mut state = self.0.state.borrow_mut();
            if state.change_level == 0 {
                warn!("end_change called without matching begin_change");
                return;
            }
            state.change_level -= 1;
            state.change_level == 0
        };
        if outermost {
            self.update();
        }
    }

    /// Begin a change bracket that ends when the guard drops.
    pub fn change_scope(&self) -> ChangeScope {
        self.begin_change();
        ChangeScope {
            manager: self.clone(),
        }
    }

    pub fn change_level(&self) -> usize {
        self.0.state.borrow().change_level
    }

    /// Pending change flags of `field` since the last message.
    pub fn change_status(&self, field: &Field) -> ChangeFlags {
        self.0
            .state
            .borrow()
            .changes
            .get(&field.id())
            .map_or(ChangeFlags::NONE, |(_, flags)| *flags)
    }

    pub(crate) fn field_changed(&self, field: &Field, flags: ChangeFlags) {
        if !self.contains(field) {
            return;
        }
        self.record_change(field, flags);
        self.update_if_idle();
    }

    fn record_change(&self, field: &Field, flags: ChangeFlags) {
        let mut state = self.0.state.borrow_mut();
        let entry = state
            .changes
            .entry(field.id())
            .or_insert_with(|| (field.clone(), ChangeFlags::NONE));
        entry.1 |= flags;
    }

    fn update_if_idle(&self) {
        if self.0.state.borrow().change_level == 0 {
            self.update();
        }
    }

    // --- Subscribers ---

    /// Register `callback` for change messages; dropping the returned
    /// subscription unregisters it.
    pub fn subscribe(&self, callback: impl Fn(&ManagerMessage) + 'static) -> Subscription {
        let id = self.0.next_listener.get();
        self.0.next_listener.set(id.wrapping_add(1));
        self.0.listeners.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            manager: Rc::downgrade(&self.0),
            id,
        }
    }

    pub fn number_of_subscribers(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Send pending changes. Listeners run with changes cached, so anything
    /// they change goes out in a follow-up message.
    fn update(&self) {
        loop {
            self.collect_unmanaged();
            self.propagate_dependencies();
            let message = {
                let mut state = self.0.state.borrow_mut();
                if state.changes.is_empty() {
                    return;
                }
                let changes: Vec<(Field, ChangeFlags)> =
                    state.changes.drain(..).map(|(_, change)| change).collect();
                state.dispatching = true;
                state.change_level += 1;
                ManagerMessage::new(changes)
            };
            let listeners: Vec<Listener> = self
                .0
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            trace!(
                "dispatching {} change(s) [{}] to {} listener(s)",
                message.len(),
                message.change_summary(),
                listeners.len()
            );
            for listener in listeners {
                listener(&message);
            }
            let mut state = self.0.state.borrow_mut();
            state.dispatching = false;
            state.change_level -= 1;
        }
    }

    /// Mark fields whose sources' results changed: FULL_RESULT if any source
    /// changed fully, else PARTIAL_RESULT if any changed partially.
    fn propagate_dependencies(&self) {
        let fields = self.fields();
        let mut known: HashMap<FieldId, ChangeFlags> = HashMap::new();
        for field in &fields {
            let derived = self.result_change(field, &mut known);
            let own = self.change_status(field);
            if !derived.is_empty() && !own.contains(derived) {
                self.record_change(field, derived);
            }
        }
    }

    fn result_change(&self, field: &Field, known: &mut HashMap<FieldId, ChangeFlags>) -> ChangeFlags {
        if let Some(flags) = known.get(&field.id()) {
            return *flags;
        }
        let mut result = self.change_status(field) & ChangeFlags::RESULT;
        if !result.contains(ChangeFlags::FULL_RESULT) {
            for source in field.source_fields() {
                let source_change = self.result_change(&source, known);
                if source_change.contains(ChangeFlags::FULL_RESULT) {
                    result |= ChangeFlags::FULL_RESULT;
                    break;
                }
                if source_change.contains(ChangeFlags::PARTIAL_RESULT) {
                    result |= ChangeFlags::PARTIAL_RESULT;
                }
            }
        }
        known.insert(field.id(), result);
        result
    }

    /// Drop unmanaged fields referenced only by this manager.
    fn collect_unmanaged(&self) {
        loop {
            let unreferenced = {
                let state = self.0.state.borrow();
                state
                    .fields
                    .values()
                    .find(|field| {
                        let pending = usize::from(state.changes.contains_key(&field.id()));
                        !field.is_managed() && field.access_count() == 1 + pending
                    })
                    .cloned()
            };
            let Some(field) = unreferenced else {
                return;
            };
            trace!("removing unreferenced field '{}'", field.name());
            {
                let mut state = self.0.state.borrow_mut();
                state.fields.shift_remove(&field.name());
            }
            self.record_change(&field, ChangeFlags::REMOVE);
        }
    }
}

/// Ends a change bracket when dropped.
#[must_use = "the change bracket ends when the scope is dropped"]
pub struct ChangeScope {
    manager: Manager,
}

impl Drop for ChangeScope {
    fn drop(&mut self) {
        self.manager.end_change();
    }
}

/// Unregisters its listener when dropped.
#[must_use = "dropping the subscription unregisters the listener"]
pub struct Subscription {
    manager: Weak<ManagerInner>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

struct MessageInner {
    summary: ChangeFlags,
    changes: Vec<(Field, ChangeFlags)>,
}

/// Coalesced changes of one dispatch. Cheap to clone and keep.
#[derive(Clone)]
pub struct ManagerMessage(Rc<MessageInner>);

impl fmt::Debug for ManagerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.0
                    .changes
                    .iter()
                    .map(|(field, flags)| (field.name(), flags.to_string())),
            )
            .finish()
    }
}

impl ManagerMessage {
    fn new(changes: Vec<(Field, ChangeFlags)>) -> Self {
        let summary = changes
            .iter()
            .fold(ChangeFlags::NONE, |acc, (_, flags)| acc | *flags);
        ManagerMessage(Rc::new(MessageInner { summary, changes }))
    }

    /// Union of every change in the message.
    pub fn change_summary(&self) -> ChangeFlags {
        self.0.summary
    }

    pub fn object_change(&self, field: &Field) -> ChangeFlags {
        self.0
            .changes
            .iter()
            .find(|(f, _)| f == field)
            .map_or(ChangeFlags::NONE, |(_, flags)| *flags)
    }

    /// Changed fields with any of the `filter` flags set.
    pub fn changed_fields(&self, filter: ChangeFlags) -> Vec<Field> {
        self.0
            .changes
            .iter()
            .filter(|(_, flags)| flags.intersects(filter))
            .map(|(field, _)| field.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.changes.is_empty()
    }
}
