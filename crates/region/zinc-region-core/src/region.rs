use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    Element, ElementId, NodalParameters, Node, NodeId, RegionError, TimeSequence,
};

/// A single structural or value change published to region callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionChange {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    NodeFieldChanged { node: NodeId, field: String },
    ElementAdded(ElementId),
    ElementRemoved(ElementId),
}

impl RegionChange {
    /// The node touched by this change, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            RegionChange::NodeAdded(id) | RegionChange::NodeRemoved(id) => Some(*id),
            RegionChange::NodeFieldChanged { node, .. } => Some(*node),
            _ => None,
        }
    }
}

type RegionCallback = Rc<dyn Fn(&[RegionChange])>;

struct RegionInner {
    name: String,
    nodes: RefCell<IndexMap<NodeId, Node>>,
    elements: RefCell<IndexMap<ElementId, Element>>,
    children: RefCell<Vec<Region>>,
    callbacks: RefCell<Vec<(u64, RegionCallback)>>,
    next_callback: Cell<u64>,
    change_level: Cell<usize>,
    pending: RefCell<Vec<RegionChange>>,
}

/// Shared handle to a region. Clones refer to the same region.
#[derive(Clone)]
pub struct Region(Rc<RegionInner>);

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.0.name)
            .field("nodes", &self.0.nodes.borrow().len())
            .field("elements", &self.0.elements.borrow().len())
            .finish()
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Region {}

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Region(Rc::new(RegionInner {
            name: name.into(),
            nodes: RefCell::new(IndexMap::new()),
            elements: RefCell::new(IndexMap::new()),
            children: RefCell::new(Vec::new()),
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(1),
            change_level: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    // --- Child regions ---

    pub fn create_child(&self, name: impl Into<String>) -> Result<Region, RegionError> {
        let name = name.into();
        if self.find_child(&name).is_some() {
            return Err(RegionError::DuplicateRegion(name));
        }
        let child = Region::new(name);
        self.0.children.borrow_mut().push(child.clone());
        Ok(child)
    }

    pub fn find_child(&self, name: &str) -> Option<Region> {
        self.0
            .children
            .borrow()
            .iter()
            .find(|child| child.name() == name)
            .cloned()
    }

    /// Resolve a `/`-separated path of child names relative to this region.
    pub fn find_subregion(&self, path: &str) -> Result<Region, RegionError> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.clone(), |region, part| {
                region
                    .find_child(part)
                    .ok_or_else(|| RegionError::RegionNotFound(path.to_string()))
            })
    }

    pub fn children(&self) -> Vec<Region> {
        self.0.children.borrow().clone()
    }

    // --- Nodes ---

    pub fn add_node(&self, node: Node) -> Result<NodeHandle, RegionError> {
        let id = node.identifier();
        {
            let mut nodes = self.0.nodes.borrow_mut();
            if nodes.contains_key(&id) {
                return Err(RegionError::DuplicateNode {
                    region: self.0.name.clone(),
                    id,
                });
            }
            nodes.insert(id, node);
        }
        self.notify(RegionChange::NodeAdded(id));
        Ok(NodeHandle {
            region: self.clone(),
            identifier: id,
        })
    }

    pub fn remove_node(&self, id: NodeId) -> Result<Node, RegionError> {
        let removed = self.0.nodes.borrow_mut().shift_remove(&id);
        let node = removed.ok_or_else(|| self.node_not_found(id))?;
        self.notify(RegionChange::NodeRemoved(id));
        Ok(node)
    }

    /// Find a node by identifier.
    pub fn node(&self, id: NodeId) -> Option<NodeHandle> {
        self.contains_node(id).then(|| NodeHandle {
            region: self.clone(),
            identifier: id,
        })
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.0.nodes.borrow().contains_key(&id)
    }

    /// Node identifiers in container (insertion) order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.0.nodes.borrow().keys().copied().collect()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.0.nodes.borrow().len()
    }

    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.0.nodes.borrow().get(&id).map(f)
    }

    pub fn node_field_values(
        &self,
        id: NodeId,
        field: &str,
        time: f64,
    ) -> Result<Vec<f64>, RegionError> {
        let nodes = self.0.nodes.borrow();
        let node = nodes.get(&id).ok_or_else(|| self.node_not_found(id))?;
        node.parameters(field)
            .map(|p| p.values_at_time(time))
            .ok_or_else(|| RegionError::FieldNotDefined {
                node: id,
                field: field.to_string(),
            })
    }

    pub fn node_time_sequence(&self, id: NodeId, field: &str) -> Option<TimeSequence> {
        self.0
            .nodes
            .borrow()
            .get(&id)
            .and_then(|node| node.parameters(field))
            .and_then(|p| p.time_sequence().cloned())
    }

    pub fn define_node_field(
        &self,
        id: NodeId,
        field: &str,
        parameters: NodalParameters,
    ) -> Result<(), RegionError> {
        {
            let mut nodes = self.0.nodes.borrow_mut();
            let node = nodes.get_mut(&id).ok_or_else(|| self.node_not_found(id))?;
            node.define(field, parameters);
        }
        self.notify(RegionChange::NodeFieldChanged {
            node: id,
            field: field.to_string(),
        });
        Ok(())
    }

    pub fn undefine_node_field(&self, id: NodeId, field: &str) -> Result<bool, RegionError> {
        let removed = {
            let mut nodes = self.0.nodes.borrow_mut();
            let node = nodes.get_mut(&id).ok_or_else(|| self.node_not_found(id))?;
            node.undefine(field)
        };
        if removed {
            self.notify(RegionChange::NodeFieldChanged {
                node: id,
                field: field.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn set_node_field_values(
        &self,
        id: NodeId,
        field: &str,
        time: f64,
        values: &[f64],
        tolerance: f64,
    ) -> Result<(), RegionError> {
        {
            let mut nodes = self.0.nodes.borrow_mut();
            let node = nodes.get_mut(&id).ok_or_else(|| self.node_not_found(id))?;
            let parameters =
                node.parameters_mut(field)
                    .ok_or_else(|| RegionError::FieldNotDefined {
                        node: id,
                        field: field.to_string(),
                    })?;
            parameters
                .set_values_at_time(time, values, tolerance)
                .map_err(|e| e.for_field(field))?;
        }
        self.notify(RegionChange::NodeFieldChanged {
            node: id,
            field: field.to_string(),
        });
        Ok(())
    }

    // --- Elements ---

    pub fn add_element(&self, element: Element) -> Result<ElementHandle, RegionError> {
        let id = element.identifier;
        if element.dimension == 0 || element.dimension > Element::MAX_DIMENSION {
            return Err(RegionError::InvalidElementDimension {
                id,
                dimension: element.dimension,
            });
        }
        {
            let mut elements = self.0.elements.borrow_mut();
            if elements.contains_key(&id) {
                return Err(RegionError::DuplicateElement {
                    region: self.0.name.clone(),
                    id,
                });
            }
            elements.insert(id, element);
        }
        self.notify(RegionChange::ElementAdded(id));
        Ok(ElementHandle {
            region: self.clone(),
            identifier: id,
        })
    }

    pub fn remove_element(&self, id: ElementId) -> Option<Element> {
        let removed = self.0.elements.borrow_mut().shift_remove(&id);
        if removed.is_some() {
            self.notify(RegionChange::ElementRemoved(id));
        }
        removed
    }

    pub fn element(&self, id: ElementId) -> Option<ElementHandle> {
        self.0
            .elements
            .borrow()
            .contains_key(&id)
            .then(|| ElementHandle {
                region: self.clone(),
                identifier: id,
            })
    }

    /// Element handles in container order.
    pub fn elements(&self) -> Vec<ElementHandle> {
        self.0
            .elements
            .borrow()
            .keys()
            .map(|&identifier| ElementHandle {
                region: self.clone(),
                identifier,
            })
            .collect()
    }

    pub fn element_dimension(&self, id: ElementId) -> Option<usize> {
        self.0.elements.borrow().get(&id).map(|e| e.dimension)
    }

    // --- Change callbacks ---

    /// Register a callback receiving batches of changes. Dropping the returned
    /// subscription unregisters it.
    pub fn add_callback(&self, callback: impl Fn(&[RegionChange]) + 'static) -> RegionSubscription {
        let id = self.0.next_callback.get();
        self.0.next_callback.set(id.wrapping_add(1));
        self.0.callbacks.borrow_mut().push((id, Rc::new(callback)));
        RegionSubscription {
            region: Rc::downgrade(&self.0),
            id,
        }
    }

    pub fn number_of_callbacks(&self) -> usize {
        self.0.callbacks.borrow().len()
    }

    /// Start caching changes; callbacks fire once the outermost `end_change` runs.
    pub fn begin_change(&self) {
        self.0.change_level.set(self.0.change_level.get() + 1);
    }

    pub fn end_change(&self) {
        let level = self.0.change_level.get();
        if level == 0 {
            debug!("region '{}': end_change without begin_change", self.0.name);
            return;
        }
        self.0.change_level.set(level - 1);
        if level == 1 {
            let pending = std::mem::take(&mut *self.0.pending.borrow_mut());
            if !pending.is_empty() {
                self.dispatch(&pending);
            }
        }
    }

    fn notify(&self, change: RegionChange) {
        if self.0.change_level.get() > 0 {
            self.0.pending.borrow_mut().push(change);
        } else {
            self.dispatch(std::slice::from_ref(&change));
        }
    }

    fn dispatch(&self, changes: &[RegionChange]) {
        let callbacks: Vec<RegionCallback> = self
            .0
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        trace!(
            "region '{}': dispatching {} change(s) to {} callback(s)",
            self.0.name,
            changes.len(),
            callbacks.len()
        );
        for callback in callbacks {
            callback(changes);
        }
    }

    fn node_not_found(&self, id: NodeId) -> RegionError {
        RegionError::NodeNotFound {
            region: self.0.name.clone(),
            id,
        }
    }
}

/// Unregisters its region callback when dropped.
#[must_use = "dropping the subscription unregisters the callback"]
pub struct RegionSubscription {
    region: Weak<RegionInner>,
    id: u64,
}

impl fmt::Debug for RegionSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionSubscription").field("id", &self.id).finish()
    }
}

impl Drop for RegionSubscription {
    fn drop(&mut self) {
        if let Some(region) = self.region.upgrade() {
            region.callbacks.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

/// A node identified within its owning region.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeHandle {
    region: Region,
    identifier: NodeId,
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}:{})", self.region.name(), self.identifier)
    }
}

impl NodeHandle {
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn identifier(&self) -> NodeId {
        self.identifier
    }

    /// Whether the node still belongs to its region.
    pub fn exists(&self) -> bool {
        self.region.contains_node(self.identifier)
    }

    pub fn defines(&self, field: &str) -> bool {
        self.region
            .with_node(self.identifier, |node| node.defines(field))
            .unwrap_or(false)
    }

    pub fn field_values(&self, field: &str, time: f64) -> Result<Vec<f64>, RegionError> {
        self.region.node_field_values(self.identifier, field, time)
    }

    pub fn time_sequence(&self, field: &str) -> Option<TimeSequence> {
        self.region.node_time_sequence(self.identifier, field)
    }

    pub fn set_field_values(
        &self,
        field: &str,
        time: f64,
        values: &[f64],
        tolerance: f64,
    ) -> Result<(), RegionError> {
        self.region
            .set_node_field_values(self.identifier, field, time, values, tolerance)
    }
}

/// An element identified within its owning region.
#[derive(Clone, PartialEq, Eq)]
pub struct ElementHandle {
    region: Region,
    identifier: ElementId,
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementHandle({}:{})", self.region.name(), self.identifier)
    }
}

impl ElementHandle {
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn identifier(&self) -> ElementId {
        self.identifier
    }

    /// Dimension of the element, or 0 when it no longer exists.
    pub fn dimension(&self) -> usize {
        self.region.element_dimension(self.identifier).unwrap_or(0)
    }

    pub fn exists(&self) -> bool {
        self.region.element_dimension(self.identifier).is_some()
    }
}
