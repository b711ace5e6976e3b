//! The inspector tree arena.
//!
//! Nodes live in a flat `Vec` indexed by [`NodeId`]; parents own their
//! children through ordered id lists and children point back through plain
//! ids. Every structural change funnels through [`InspectorTree::set_parent`],
//! which keeps both directions consistent and emits the change events.
//!
//! ```text
//! Player                 (value, root)
//! +-- members            (members group, transparent: only child)
//!     +-- health         (value, bound to Player.health)
//!     +-- position       (value, bound to Player.position)
//!     |   +-- members
//!     |       +-- x, y, z
//!     +-- inventory      (array, bound to Player.inventory)
//!         +-- elements
//!             +-- [0], [1]
//! ```

use crate::binding::ValueBinding;
use crate::error::{InspectError, Result};
use crate::reflect::{
    AccessorCompiler, CachingAccessorCompiler, TypeId, TypeTable, Value,
};
use crate::render::SearchFilter;
use crate::selection::{NodeKindId, NodeRegistry};
use crate::state::{NodeState, NodeStateStore, StateStore};
use crate::tree::behavior::NodeBehavior;
use crate::tree::events::{NodeEvent, NodeObserver};
use crate::tree::id::NodeId;
use crate::tree::node::{DisplayData, Node};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared collaborators every tree operation may consult.
#[derive(Clone)]
pub struct InspectorContext {
    pub types: Rc<TypeTable>,
    pub registry: Rc<NodeRegistry>,
    pub accessors: Rc<dyn AccessorCompiler>,
    pub state: Rc<RefCell<dyn NodeStateStore>>,
}

impl InspectorContext {
    /// Builtin node kinds, a caching accessor compiler and an empty state store.
    pub fn new(types: TypeTable) -> Self {
        Self {
            types: Rc::new(types),
            registry: Rc::new(NodeRegistry::new()),
            accessors: Rc::new(CachingAccessorCompiler::new()),
            state: Rc::new(RefCell::new(StateStore::new())),
        }
    }

    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = Rc::new(registry);
        self
    }

    pub fn with_state(mut self, state: Rc<RefCell<dyn NodeStateStore>>) -> Self {
        self.state = state;
        self
    }

    pub fn with_accessors(mut self, accessors: Rc<dyn AccessorCompiler>) -> Self {
        self.accessors = accessors;
        self
    }
}

impl std::fmt::Debug for InspectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorContext")
            .field("types", &self.types.len())
            .field("kinds", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Arena-backed inspection tree.
pub struct InspectorTree {
    ctx: InspectorContext,
    nodes: Vec<Option<Node>>,
    observers: Vec<Box<dyn NodeObserver>>,
    live: usize,
}

impl std::fmt::Debug for InspectorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectorTree")
            .field("live", &self.live)
            .field("slots", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl InspectorTree {
    pub fn new(ctx: InspectorContext) -> Self {
        Self {
            ctx,
            nodes: Vec::new(),
            observers: Vec::new(),
            live: 0,
        }
    }

    pub fn context(&self) -> &InspectorContext {
        &self.ctx
    }

    pub fn types(&self) -> &TypeTable {
        &self.ctx.types
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.ctx.registry
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_valid() {
            self.nodes.get(id.index()).and_then(Option::as_ref)
        } else {
            None
        }
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(InspectError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        if !id.is_valid() {
            return Err(InspectError::UnknownNode(id));
        }
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(InspectError::UnknownNode(id))
    }

    /// Live nodes without a parent, in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| n.parent.is_none())
            .map(|n| n.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn add_observer(&mut self, observer: impl NodeObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: NodeEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }

    pub fn behavior(&self, id: NodeId) -> Rc<dyn NodeBehavior> {
        let kind = self.get(id).map(|n| n.kind).unwrap_or(NodeKindId::INVALID);
        self.ctx.registry.behavior(kind)
    }

    // ==================== Construction ====================

    /// Create a parentless node of the given kind.
    pub fn create_root(&mut self, kind: NodeKindId, name: &str) -> Result<NodeId> {
        self.construct(kind, name, None)
    }

    /// Create a root showing `value`, with its kind selected for a slot
    /// declared as `declared`.
    pub fn create_root_for(&mut self, name: &str, value: Value, declared: TypeId) -> Result<NodeId> {
        let value_type = value.runtime_type().unwrap_or(declared);
        let kind = self
            .ctx
            .registry
            .select_declared(&self.ctx.types, declared, Some(declared), value_type)
            .ok_or_else(|| {
                InspectError::ArgumentError(format!(
                    "no node kind can display '{}'",
                    self.ctx.types.name(value_type)
                ))
            })?;
        let id = self.construct(kind, name, None)?;
        self.node_mut(id)?.subject = value;
        Ok(id)
    }

    /// Create a node and append it to `parent` (or leave it parentless).
    pub fn create_node(
        &mut self,
        kind: NodeKindId,
        name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        match parent {
            Some(parent) => {
                let index = self.node(parent)?.children.len();
                self.construct(kind, name, Some((parent, index)))
            }
            None => self.construct(kind, name, None),
        }
    }

    /// Create a node and insert it at `index` among `parent`'s children.
    pub fn create_node_at(
        &mut self,
        kind: NodeKindId,
        name: &str,
        parent: NodeId,
        index: usize,
    ) -> Result<NodeId> {
        self.construct(kind, name, Some((parent, index)))
    }

    fn construct(
        &mut self,
        kind: NodeKindId,
        name: &str,
        parent: Option<(NodeId, usize)>,
    ) -> Result<NodeId> {
        if self.ctx.registry.get(kind).is_none() {
            return Err(InspectError::ArgumentError(format!(
                "unknown node kind {:?}",
                kind
            )));
        }
        if let Some((parent, index)) = parent {
            self.check_attach(parent, index)?;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(id, kind, name)));
        self.live += 1;

        if let Some((parent, index)) = parent {
            self.set_parent(id, Some(parent), index)?;
        }

        let path = self.path(id)?;
        let persisted = self.ctx.state.borrow().get(&path);
        let is_root = parent.is_none();
        let node = self.node_mut(id)?;
        match persisted {
            Some(state) => {
                node.self_visible = state.self_visible;
                node.children_visible = state.children_visible;
            }
            None => {
                node.self_visible = true;
                node.children_visible = is_root;
            }
        }

        tracing::debug!("Created {} '{}' ({})", id, path, self.ctx.registry.name(kind));
        self.emit(NodeEvent::Created { node: id });
        Ok(id)
    }

    // ==================== Structure ====================

    fn check_attach(&self, parent: NodeId, index: usize) -> Result<()> {
        let p = self.node(parent)?;
        if p.enumerating > 0 {
            return Err(InspectError::ConcurrentStructuralChange(format!(
                "children of {} are being enumerated",
                parent
            )));
        }
        if index > p.children.len() {
            return Err(InspectError::InvalidState(format!(
                "insertion index {} out of range 0..={} for {}",
                index,
                p.children.len(),
                parent
            )));
        }
        if !self.behavior(parent).accepts_children() {
            return Err(InspectError::InvalidState(format!(
                "{} ({}) does not accept children",
                parent,
                self.ctx.registry.name(p.kind)
            )));
        }
        Ok(())
    }

    /// Everything that can make moving `id` from `old_parent` to `new_parent`
    /// fail, checked before any change is made.
    fn check_move(
        &self,
        id: NodeId,
        old_parent: Option<NodeId>,
        new_parent: Option<NodeId>,
        index: usize,
    ) -> Result<()> {
        if let Some(old) = old_parent {
            if self.node(old)?.enumerating > 0 {
                return Err(InspectError::ConcurrentStructuralChange(format!(
                    "cannot detach {}: children of {} are being enumerated",
                    id, old
                )));
            }
        }
        if let Some(parent) = new_parent {
            self.check_attach(parent, index)?;
            if parent == id || self.is_ancestor(id, parent) {
                return Err(InspectError::InvalidState(format!(
                    "cannot move {} under its own subtree ({})",
                    id, parent
                )));
            }
        }
        Ok(())
    }

    /// True when `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.get(p).and_then(|n| n.parent);
        }
        false
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            out.push(p);
            current = self.get(p).and_then(|n| n.parent);
        }
        Ok(out)
    }

    /// Move `id` under `new_parent` at `index`, or detach it with `None`.
    /// Returns false when `new_parent` already is the parent.
    pub fn set_parent(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        index: usize,
    ) -> Result<bool> {
        let old_parent = self.node(id)?.parent;
        if old_parent == new_parent {
            return Ok(false);
        }
        self.check_move(id, old_parent, new_parent, index)?;

        self.emit(NodeEvent::ParentChanging {
            node: id,
            old_parent,
            new_parent,
        });

        if let Some(old) = old_parent {
            let old_node = self.node_mut(old)?;
            old_node.children.retain(|c| *c != id);
            if let Some(mapped) = old_node.mapped.as_mut() {
                mapped.forget_node(id);
            }
        }
        if let Some(parent) = new_parent {
            self.node_mut(parent)?.children.insert(index, id);
        }
        self.node_mut(id)?.parent = new_parent;

        self.refresh_depth_and_root(id)?;
        self.mark_path_dirty(id);
        if let Some(old) = old_parent {
            self.mark_path_dirty(old);
        }

        tracing::debug!("Moved {} from {:?} to {:?}", id, old_parent, new_parent);
        self.emit(NodeEvent::ParentChanged {
            node: id,
            old_parent,
            new_parent,
        });

        if let Some(old) = old_parent {
            self.emit(NodeEvent::ChildRemoved {
                parent: old,
                child: id,
            });
            for ancestor in self.ancestors(old)? {
                self.emit(NodeEvent::ChildRemovedInHierarchy { ancestor, child: id });
            }
        }
        if let Some(parent) = new_parent {
            self.emit(NodeEvent::ChildAdded { parent, child: id });
            for ancestor in self.ancestors(parent)? {
                self.emit(NodeEvent::ChildAddedInHierarchy { ancestor, child: id });
            }
        }
        Ok(true)
    }

    fn refresh_depth_and_root(&mut self, id: NodeId) -> Result<()> {
        let (depth, root) = match self.node(id)?.parent {
            Some(p) => {
                let parent = self.node(p)?;
                (parent.depth + 1, parent.root)
            }
            None => (0, id),
        };
        let mut stack = vec![(id, depth)];
        while let Some((current, depth)) = stack.pop() {
            let node = self.node_mut(current)?;
            node.depth = depth;
            node.root = root;
            stack.extend(node.children.iter().map(|c| (*c, depth + 1)));
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let index = self.node(parent)?.children.len();
        self.set_parent(child, Some(parent), index)
    }

    /// Reorder an existing child of `parent` to `index`.
    pub fn move_child(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<()> {
        let p = self.node(parent)?;
        if p.enumerating > 0 {
            return Err(InspectError::ConcurrentStructuralChange(format!(
                "cannot reorder children of {} while they are enumerated",
                parent
            )));
        }
        let Some(from) = p.children.iter().position(|c| *c == child) else {
            return Err(InspectError::InvalidState(format!(
                "{} is not a child of {}",
                child, parent
            )));
        };
        if index >= p.children.len() {
            return Err(InspectError::InvalidState(format!(
                "index {} out of range for {} children",
                index,
                p.children.len()
            )));
        }
        if from != index {
            let children = &mut self.node_mut(parent)?.children;
            let moved = children.remove(from);
            children.insert(index, moved);
        }
        Ok(())
    }

    /// Destroy the child at `index` and put `new_node` in its place.
    pub fn replace_child(&mut self, parent: NodeId, index: usize, new_node: NodeId) -> Result<()> {
        let p = self.node(parent)?;
        if self.node(new_node)?.parent == Some(parent) {
            return Err(InspectError::InvalidState(format!(
                "{} is already a child of {}",
                new_node, parent
            )));
        }
        let Some(&old) = p.children.get(index) else {
            return Err(InspectError::InvalidState(format!(
                "no child at index {} of {}",
                index, parent
            )));
        };
        if old == new_node || self.is_ancestor(old, new_node) {
            return Err(InspectError::InvalidState(format!(
                "{} would be destroyed along with {}",
                new_node, old
            )));
        }
        let new_parent_of = self.node(new_node)?.parent;
        self.check_move(new_node, new_parent_of, Some(parent), index)?;

        self.destroy(old)?;
        self.set_parent(new_node, Some(parent), index)?;
        Ok(())
    }

    /// Destroy every child, last first.
    pub fn clear_children(&mut self, id: NodeId) -> Result<()> {
        if self.node(id)?.enumerating > 0 {
            return Err(InspectError::ConcurrentStructuralChange(format!(
                "cannot clear children of {} while they are enumerated",
                id
            )));
        }
        while let Some(&last) = self.node(id)?.children.last() {
            self.destroy(last)?;
        }
        Ok(())
    }

    /// Clear children, detach, drop the binding and free the slot.
    pub fn destroy(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        if node.enumerating > 0 {
            return Err(InspectError::ConcurrentStructuralChange(format!(
                "cannot destroy {} while its children are enumerated",
                id
            )));
        }
        if let Some(parent) = node.parent {
            if self.node(parent)?.enumerating > 0 {
                return Err(InspectError::ConcurrentStructuralChange(format!(
                    "cannot destroy {}: children of {} are being enumerated",
                    id, parent
                )));
            }
        }

        self.clear_children(id)?;
        self.set_parent(id, None, 0)?;

        if let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) {
            tracing::debug!("Destroyed {} '{}'", id, node.name);
            self.live -= 1;
        }
        self.emit(NodeEvent::Destroyed { node: id });
        Ok(())
    }

    // ==================== Names & paths ====================

    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.name == name {
            return Ok(());
        }
        let old = std::mem::replace(&mut node.name, name.to_string());
        self.mark_path_dirty(id);
        self.emit(NodeEvent::Renamed {
            node: id,
            old,
            new: name.to_string(),
        });
        Ok(())
    }

    /// Dirty the cached path of `id` and its whole subtree. A dirty node never
    /// has clean descendants, so already dirty subtrees are skipped.
    fn mark_path_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else { continue };
            if node.is_path_dirty() {
                continue;
            }
            node.path.borrow_mut().take();
            stack.extend(node.children.iter().copied());
        }
    }

    /// Names from the root down to `id`, joined with `.`.
    pub fn path(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        if let Some(cached) = node.path.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let path = match node.parent {
            Some(parent) => format!("{}.{}", self.path(parent)?, node.name),
            None => node.name.clone(),
        };
        *node.path.borrow_mut() = Some(path.clone());
        Ok(path)
    }

    // ==================== Visibility ====================

    /// Groups that are their parent's only child render as if absent.
    pub fn is_transparent(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let Some(parent) = node.parent.and_then(|p| self.get(p)) else {
            return false;
        };
        parent.children.len() == 1 && self.behavior(id).is_group()
    }

    pub fn self_visible(&self, id: NodeId) -> bool {
        if self.is_transparent(id) {
            return false;
        }
        self.get(id).map(|n| n.self_visible).unwrap_or(false)
    }

    pub fn children_visible(&self, id: NodeId) -> bool {
        if self.is_transparent(id) {
            return true;
        }
        self.get(id).map(|n| n.children_visible).unwrap_or(false)
    }

    fn ancestors_expanded(&self, id: NodeId) -> bool {
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(p) = current {
            if !self.children_visible(p) {
                return false;
            }
            current = self.get(p).and_then(|n| n.parent);
        }
        true
    }

    pub fn self_visible_in_hierarchy(&self, id: NodeId) -> bool {
        self.self_visible(id) && self.ancestors_expanded(id)
    }

    pub fn children_visible_in_hierarchy(&self, id: NodeId) -> bool {
        self.children_visible(id) && self.ancestors_expanded(id)
    }

    pub fn set_self_visible(&mut self, id: NodeId, visible: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.self_visible == visible {
            return Ok(());
        }
        node.self_visible = visible;
        let children_visible = node.children_visible;
        self.emit(NodeEvent::VisibilityChanged {
            node: id,
            self_visible: visible,
            children_visible,
        });
        Ok(())
    }

    pub fn set_children_visible(&mut self, id: NodeId, visible: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.children_visible == visible {
            return Ok(());
        }
        node.children_visible = visible;
        let self_visible = node.self_visible;
        self.emit(NodeEvent::VisibilityChanged {
            node: id,
            self_visible,
            children_visible: visible,
        });
        Ok(())
    }

    // ==================== Enumeration ====================

    /// Run `f` with `id`'s child list marked as under enumeration. Structural
    /// changes to that list inside `f` fail; additions queued with
    /// [`queue_child`](Self::queue_child) are applied once the outermost
    /// enumeration ends.
    pub fn with_enumeration<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.node_mut(id)?.enumerating += 1;
        let result = f(self);

        let mut pending = Vec::new();
        if let Ok(node) = self.node_mut(id) {
            node.enumerating -= 1;
            if node.enumerating == 0 {
                pending = std::mem::take(&mut node.pending);
            }
        }
        let mut flushed = Ok(());
        for child in pending {
            if !self.contains(child) {
                continue;
            }
            if let Err(e) = self.append_child(id, child) {
                tracing::warn!("Failed to apply queued child {} of {}: {}", child, id, e);
                if flushed.is_ok() {
                    flushed = Err(e);
                }
            }
        }

        let value = result?;
        flushed?;
        Ok(value)
    }

    /// Visit each child of `id` in order under an enumeration guard.
    pub fn enumerate_children(
        &mut self,
        id: NodeId,
        mut f: impl FnMut(&mut Self, NodeId) -> Result<()>,
    ) -> Result<()> {
        self.with_enumeration(id, |tree| {
            let children = tree.node(id)?.children.clone();
            for child in children {
                if tree.contains(child) {
                    f(tree, child)?;
                }
            }
            Ok(())
        })
    }

    /// Append `child` to `parent`, or queue it when `parent`'s children are
    /// being enumerated. Returns true when the addition was deferred.
    pub fn queue_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.node(child)?;
        let node = self.node_mut(parent)?;
        if node.enumerating > 0 {
            if !node.pending.contains(&child) {
                node.pending.push(child);
            }
            return Ok(true);
        }
        self.append_child(parent, child)?;
        Ok(false)
    }

    // ==================== Node data ====================

    pub fn set_binding(&mut self, id: NodeId, binding: ValueBinding) -> Result<()> {
        self.node_mut(id)?.binding = Some(binding);
        Ok(())
    }

    pub fn set_subject(&mut self, id: NodeId, subject: Value) -> Result<()> {
        self.node_mut(id)?.subject = subject;
        Ok(())
    }

    pub fn set_display(&mut self, id: NodeId, display: DisplayData) -> Result<()> {
        self.node_mut(id)?.display = display;
        Ok(())
    }

    // ==================== Traversal ====================

    /// `id` and all its descendants, depth first, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else { continue };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Materialized nodes accepted by `filter`, in tree order. Never creates nodes.
    pub fn search(&self, filter: &dyn SearchFilter) -> Vec<NodeId> {
        self.roots()
            .into_iter()
            .flat_map(|root| self.subtree(root))
            .filter(|id| filter.matches(self, *id))
            .collect()
    }

    // ==================== Persistence ====================

    /// Write every live node's stored visibility into the state store.
    pub fn save_state(&self) -> Result<usize> {
        let mut entries = Vec::with_capacity(self.live);
        for node in self.iter() {
            entries.push((
                self.path(node.id)?,
                NodeState {
                    self_visible: node.self_visible,
                    children_visible: node.children_visible,
                },
            ));
        }
        let count = entries.len();
        let mut store = self.ctx.state.borrow_mut();
        for (path, state) in entries {
            store.set(&path, state);
        }
        tracing::debug!("Saved visibility of {} nodes", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::kinds::GroupBehavior;
    use proptest::prelude::*;

    fn tree() -> InspectorTree {
        InspectorTree::new(InspectorContext::new(TypeTable::new()))
    }

    fn recording(tree: &mut InspectorTree) -> Rc<RefCell<Vec<NodeEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        tree.add_observer(move |e: &NodeEvent| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_set_parent_to_current_parent_is_noop() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "child", Some(root)).unwrap();
        let events = recording(&mut tree);

        assert!(!tree.set_parent(child, Some(root), 0).unwrap());
        assert!(!tree.set_parent(root, None, 5).unwrap());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_path_follows_renames() {
        let mut tree = tree();
        let foo = tree.create_root(NodeRegistry::VALUE, "Foo").unwrap();
        let bar = tree.create_node(NodeRegistry::VALUE, "Bar", Some(foo)).unwrap();
        assert_eq!(tree.path(bar).unwrap(), "Foo.Bar");

        tree.set_name(foo, "Foo2").unwrap();
        assert!(tree.node(bar).unwrap().is_path_dirty());
        assert_eq!(tree.path(bar).unwrap(), "Foo2.Bar");
    }

    #[test]
    fn test_reparent_updates_depth_root_and_paths() {
        let mut tree = tree();
        let a = tree.create_root(NodeRegistry::VALUE, "A").unwrap();
        let b = tree.create_root(NodeRegistry::VALUE, "B").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "c", Some(a)).unwrap();
        let grandchild = tree.create_node(NodeRegistry::VALUE, "g", Some(child)).unwrap();
        assert_eq!(tree.path(grandchild).unwrap(), "A.c.g");

        assert!(tree.set_parent(child, Some(b), 0).unwrap());
        assert_eq!(tree.node(grandchild).unwrap().root(), b);
        assert_eq!(tree.node(grandchild).unwrap().depth(), 2);
        assert_eq!(tree.path(grandchild).unwrap(), "B.c.g");
        assert!(tree.node(a).unwrap().children().is_empty());
        assert_eq!(tree.node(b).unwrap().children(), &[child]);
    }

    #[test]
    fn test_set_parent_event_order() {
        let mut tree = tree();
        let a = tree.create_root(NodeRegistry::VALUE, "A").unwrap();
        let mid = tree.create_node(NodeRegistry::VALUE, "mid", Some(a)).unwrap();
        let b = tree.create_root(NodeRegistry::VALUE, "B").unwrap();
        let node = tree.create_node(NodeRegistry::VALUE, "n", Some(mid)).unwrap();
        let events = recording(&mut tree);

        tree.set_parent(node, Some(b), 0).unwrap();
        let events = events.borrow();
        assert_eq!(
            events.as_slice(),
            &[
                NodeEvent::ParentChanging {
                    node,
                    old_parent: Some(mid),
                    new_parent: Some(b)
                },
                NodeEvent::ParentChanged {
                    node,
                    old_parent: Some(mid),
                    new_parent: Some(b)
                },
                NodeEvent::ChildRemoved {
                    parent: mid,
                    child: node
                },
                NodeEvent::ChildRemovedInHierarchy {
                    ancestor: a,
                    child: node
                },
                NodeEvent::ChildAdded {
                    parent: b,
                    child: node
                },
            ]
        );
    }

    #[test]
    fn test_cannot_parent_under_own_subtree() {
        let mut tree = tree();
        let a = tree.create_root(NodeRegistry::VALUE, "A").unwrap();
        let b = tree.create_node(NodeRegistry::VALUE, "B", Some(a)).unwrap();
        assert!(matches!(
            tree.set_parent(a, Some(b), 0),
            Err(InspectError::InvalidState(_))
        ));
        assert!(matches!(
            tree.set_parent(a, Some(a), 0),
            Err(InspectError::InvalidState(_))
        ));
    }

    #[test]
    fn test_insertion_index_checked() {
        let mut tree = tree();
        let a = tree.create_root(NodeRegistry::VALUE, "A").unwrap();
        let b = tree.create_root(NodeRegistry::VALUE, "B").unwrap();
        assert!(matches!(
            tree.set_parent(b, Some(a), 1),
            Err(InspectError::InvalidState(_))
        ));
    }

    #[test]
    fn test_mutation_during_enumeration_fails() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "child", Some(root)).unwrap();
        let other = tree.create_root(NodeRegistry::VALUE, "other").unwrap();

        let result = tree.enumerate_children(root, |tree, c| {
            assert_eq!(c, child);
            tree.set_parent(other, Some(root), 0).map(|_| ())
        });
        assert!(matches!(
            result,
            Err(InspectError::ConcurrentStructuralChange(_))
        ));

        let result = tree.with_enumeration(root, |tree| tree.destroy(child));
        assert!(matches!(
            result,
            Err(InspectError::ConcurrentStructuralChange(_))
        ));
        // Guard released afterwards
        assert!(!tree.node(root).unwrap().is_enumerating());
        tree.destroy(child).unwrap();
    }

    #[test]
    fn test_queued_child_added_after_enumeration() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        tree.create_node(NodeRegistry::VALUE, "first", Some(root)).unwrap();
        let late = tree.create_root(NodeRegistry::VALUE, "late").unwrap();

        tree.with_enumeration(root, |tree| {
            assert!(tree.queue_child(root, late)?);
            assert_eq!(tree.node(root)?.pending_count(), 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(tree.node(late).unwrap().parent(), Some(root));
        assert_eq!(tree.node(root).unwrap().child_count(), 2);
    }

    #[test]
    fn test_replace_child() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let old = tree.create_node(NodeRegistry::VALUE, "old", Some(root)).unwrap();
        let new = tree.create_root(NodeRegistry::VALUE, "new").unwrap();

        tree.replace_child(root, 0, new).unwrap();
        assert!(!tree.contains(old));
        assert_eq!(tree.node(root).unwrap().children(), &[new]);
        assert!(matches!(
            tree.replace_child(root, 0, new),
            Err(InspectError::InvalidState(_))
        ));
    }

    #[test]
    fn test_failed_replace_child_leaves_tree_unchanged() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let parent = tree.create_node(NodeRegistry::VALUE, "parent", Some(root)).unwrap();
        let old = tree.create_node(NodeRegistry::VALUE, "old", Some(parent)).unwrap();
        let inner = tree.create_node(NodeRegistry::VALUE, "inner", Some(old)).unwrap();

        // An ancestor of the parent would form a cycle
        assert!(matches!(
            tree.replace_child(parent, 0, root),
            Err(InspectError::InvalidState(_))
        ));
        // A node inside the replaced child would be destroyed with it
        assert!(matches!(
            tree.replace_child(parent, 0, inner),
            Err(InspectError::InvalidState(_))
        ));

        assert!(tree.contains(old));
        assert!(tree.contains(inner));
        assert_eq!(tree.node(parent).unwrap().children(), &[old]);
        assert_eq!(tree.node(root).unwrap().children(), &[parent]);
    }

    #[test]
    fn test_clear_children_destroys_last_first() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let a = tree.create_node(NodeRegistry::VALUE, "a", Some(root)).unwrap();
        let b = tree.create_node(NodeRegistry::VALUE, "b", Some(root)).unwrap();
        let nested = tree.create_node(NodeRegistry::VALUE, "n", Some(a)).unwrap();
        let events = recording(&mut tree);

        tree.clear_children(root).unwrap();
        let destroyed: Vec<NodeId> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                NodeEvent::Destroyed { node } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![b, nested, a]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_destroyed_slots_not_reused() {
        let mut tree = tree();
        let a = tree.create_root(NodeRegistry::VALUE, "a").unwrap();
        tree.destroy(a).unwrap();
        let b = tree.create_root(NodeRegistry::VALUE, "b").unwrap();
        assert_ne!(a, b);
        assert!(matches!(tree.node(a), Err(InspectError::UnknownNode(_))));
    }

    #[test]
    fn test_singleton_group_is_transparent() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let group = tree.create_node(NodeRegistry::GROUP, "group", Some(root)).unwrap();
        tree.set_children_visible(group, false).unwrap();
        tree.set_self_visible(group, true).unwrap();

        assert!(!tree.self_visible(group));
        assert!(tree.children_visible(group));

        tree.create_node(NodeRegistry::VALUE, "sibling", Some(root)).unwrap();
        assert!(tree.self_visible(group));
        assert!(!tree.children_visible(group));
    }

    #[test]
    fn test_visibility_in_hierarchy() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "child", Some(root)).unwrap();
        let leaf = tree.create_node(NodeRegistry::VALUE, "leaf", Some(child)).unwrap();

        // Non-root nodes start collapsed
        assert!(tree.self_visible_in_hierarchy(child));
        assert!(!tree.self_visible_in_hierarchy(leaf));

        tree.set_children_visible(child, true).unwrap();
        assert!(tree.self_visible_in_hierarchy(leaf));
        tree.set_children_visible(root, false).unwrap();
        assert!(!tree.self_visible_in_hierarchy(leaf));
        assert!(!tree.children_visible_in_hierarchy(child));
    }

    #[test]
    fn test_persisted_state_applied_on_construction() {
        let mut tree = tree();
        tree.context().state.borrow_mut().set(
            "root.child",
            NodeState {
                self_visible: false,
                children_visible: true,
            },
        );
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "child", Some(root)).unwrap();
        assert!(!tree.node(child).unwrap().stored_self_visible());
        assert!(tree.node(child).unwrap().stored_children_visible());
        assert!(tree.node(root).unwrap().stored_children_visible());
    }

    #[test]
    fn test_save_state_writes_every_node() {
        let mut tree = tree();
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let child = tree.create_node(NodeRegistry::VALUE, "child", Some(root)).unwrap();
        tree.set_children_visible(child, true).unwrap();

        assert_eq!(tree.save_state().unwrap(), 2);
        let state = tree.context().state.borrow().get("root.child").unwrap();
        assert!(state.children_visible);
    }

    #[test]
    fn test_kind_without_children_rejects_attach() {
        struct Leaf;
        impl NodeBehavior for Leaf {
            fn accepts_children(&self) -> bool {
                false
            }
        }
        let mut registry = NodeRegistry::new();
        let leaf = registry
            .define_kind("leaf", NodeRegistry::ROOT, TypeTable::OBJECT, Rc::new(Leaf))
            .id();
        let mut tree = InspectorTree::new(
            InspectorContext::new(TypeTable::new()).with_registry(registry),
        );
        let parent = tree.create_root(leaf, "p").unwrap();
        assert!(matches!(
            tree.create_node(NodeRegistry::VALUE, "c", Some(parent)),
            Err(InspectError::InvalidState(_))
        ));
        // Nothing was allocated for the rejected node
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_group_behavior_flag() {
        assert!(GroupBehavior.is_group());
    }

    proptest! {
        #[test]
        fn prop_parent_child_links_stay_consistent(moves in proptest::collection::vec((0usize..8, 0usize..9), 0..40)) {
            let mut tree = tree();
            let ids: Vec<NodeId> = (0..8)
                .map(|i| tree.create_root(NodeRegistry::VALUE, &format!("n{}", i)).unwrap())
                .collect();

            for (node, target) in moves {
                let parent = if target == 8 { None } else { Some(ids[target]) };
                let index = parent.map(|p| tree.node(p).unwrap().child_count()).unwrap_or(0);
                // Cycles are rejected, everything else must succeed
                let _ = tree.set_parent(ids[node], parent, index);
            }

            for id in &ids {
                let node = tree.node(*id).unwrap();
                if let Some(parent) = node.parent() {
                    let p = tree.node(parent).unwrap();
                    prop_assert_eq!(p.children().iter().filter(|c| **c == *id).count(), 1);
                    prop_assert_eq!(node.depth(), p.depth() + 1);
                    prop_assert_eq!(node.root(), p.root());
                } else {
                    prop_assert_eq!(node.depth(), 0);
                    prop_assert_eq!(node.root(), *id);
                }
                for child in node.children() {
                    prop_assert_eq!(tree.node(*child).unwrap().parent(), Some(*id));
                }
                let expected: Vec<String> = std::iter::once(*id)
                    .chain(tree.ancestors(*id).unwrap())
                    .map(|n| tree.node(n).unwrap().name().to_string())
                    .rev()
                    .collect();
                prop_assert_eq!(tree.path(*id).unwrap(), expected.join("."));
            }
        }
    }
}
