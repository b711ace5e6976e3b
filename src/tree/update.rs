//! Synchronous depth-limited refresh.

use crate::error::Result;
use crate::tree::{InspectorTree, NodeId};
use std::rc::Rc;

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Decides whether a node's children may be refreshed.
pub type Precondition = Rc<dyn Fn(&InspectorTree, NodeId) -> bool>;

/// Controls how far an update walk goes.
#[derive(Clone)]
pub struct UpdateOptions {
    /// Nodes further than this below the starting node are skipped
    pub max_depth: usize,
    /// Recurse into collapsed nodes too
    pub deep: bool,
    pub precondition: Option<Precondition>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            deep: false,
            precondition: None,
        }
    }
}

impl std::fmt::Debug for UpdateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOptions")
            .field("max_depth", &self.max_depth)
            .field("deep", &self.deep)
            .field("precondition", &self.precondition.is_some())
            .finish()
    }
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn with_precondition(
        mut self,
        precondition: impl Fn(&InspectorTree, NodeId) -> bool + 'static,
    ) -> Self {
        self.precondition = Some(Rc::new(precondition));
        self
    }

    pub(crate) fn allows_children(&self, tree: &InspectorTree, node: NodeId) -> bool {
        self.precondition.as_ref().map_or(true, |p| p(tree, node))
    }
}

impl InspectorTree {
    /// Refresh `node` and, within the depth limit, its visible descendants.
    pub fn update(&mut self, node: NodeId, options: &UpdateOptions) -> Result<()> {
        self.update_at(node, options, 0)
    }

    fn update_at(&mut self, node: NodeId, options: &UpdateOptions, depth: usize) -> Result<()> {
        if depth > options.max_depth {
            self.discard_prefetched(node);
            return Ok(());
        }
        self.update_self(node)?;
        if !options.allows_children(self, node) {
            return Ok(());
        }
        self.update_children(node)?;
        if !self.should_descend(node, options) {
            self.discard_children_prefetched(node);
            return Ok(());
        }
        self.enumerate_children(node, |tree, child| tree.update_at(child, options, depth + 1))
    }

    pub fn update_self(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.behavior(node).update_self(self, node)
    }

    pub fn update_children(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.behavior(node).update_children(self, node)
    }

    /// Drop a read kept from reconciliation that no refresh is going to use.
    pub(crate) fn discard_prefetched(&self, node: NodeId) {
        if let Some(binding) = self.get(node).and_then(|n| n.binding()) {
            binding.clear_prefetched();
        }
    }

    pub(crate) fn discard_children_prefetched(&self, node: NodeId) {
        if let Some(n) = self.get(node) {
            for child in n.children() {
                self.discard_prefetched(*child);
            }
        }
    }

    pub(crate) fn should_descend(&self, node: NodeId, options: &UpdateOptions) -> bool {
        let has_children = self.get(node).is_some_and(|n| !n.children.is_empty());
        has_children && (options.deep || self.children_visible(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{ObjectRef, TypeTable, Value};
    use crate::tree::InspectorContext;

    fn player_tree() -> (InspectorTree, NodeId, ObjectRef) {
        let mut types = TypeTable::new();
        let vec3 = types
            .define_class("Vec3", None)
            .field("x", TypeTable::FLOAT)
            .field("y", TypeTable::FLOAT)
            .id();
        let player = types
            .define_class("Player", None)
            .field("health", TypeTable::INT)
            .field("position", vec3)
            .id();
        let position = ObjectRef::new(vec3).with_field("x", 1.5).with_field("y", -2.0);
        let obj = ObjectRef::new(player)
            .with_field("health", 100i64)
            .with_field("position", position);
        let mut tree = InspectorTree::new(InspectorContext::new(types));
        let root = tree
            .create_root_for("Player", Value::Object(obj.clone()), player)
            .unwrap();
        (tree, root, obj)
    }

    fn find(tree: &InspectorTree, path: &str) -> Option<NodeId> {
        tree.iter()
            .find(|n| tree.path(n.id()).unwrap() == path)
            .map(|n| n.id())
    }

    #[test]
    fn test_update_materializes_visible_levels() {
        let (mut tree, root, _) = player_tree();
        tree.update(root, &UpdateOptions::default()).unwrap();

        let health = find(&tree, "Player.members.health").unwrap();
        assert_eq!(tree.node(health).unwrap().display().value_text, "100");
        let position = find(&tree, "Player.members.position").unwrap();
        assert_eq!(tree.node(position).unwrap().display().value_text, "Vec3");
        // Collapsed: its group exists but has not been filled
        let group = find(&tree, "Player.members.position.members").unwrap();
        assert_eq!(tree.node(group).unwrap().child_count(), 0);
    }

    #[test]
    fn test_deep_update_reaches_collapsed_nodes() {
        let (mut tree, root, _) = player_tree();
        tree.update(root, &UpdateOptions::default().deep(true)).unwrap();
        let x = find(&tree, "Player.members.position.members.x").unwrap();
        assert_eq!(tree.node(x).unwrap().display().value_text, "1.500");
    }

    #[test]
    fn test_max_depth_limits_walk() {
        let (mut tree, root, _) = player_tree();
        let options = UpdateOptions::default().with_max_depth(0);
        tree.update(root, &options).unwrap();
        // Root refreshed its children list, but the group was not refreshed
        let group = find(&tree, "Player.members").unwrap();
        assert_eq!(tree.node(group).unwrap().child_count(), 0);
    }

    #[test]
    fn test_precondition_blocks_children() {
        let (mut tree, root, _) = player_tree();
        let options = UpdateOptions::default().with_precondition(|_, _| false);
        tree.update(root, &options).unwrap();
        assert_eq!(tree.node(root).unwrap().child_count(), 0);
    }

    #[test]
    fn test_update_reflects_changed_values() {
        let (mut tree, root, obj) = player_tree();
        tree.update(root, &UpdateOptions::default()).unwrap();
        let health = find(&tree, "Player.members.health").unwrap();

        obj.set_field("health", Value::Int(42));
        tree.update(root, &UpdateOptions::default()).unwrap();
        assert_eq!(find(&tree, "Player.members.health"), Some(health));
        assert_eq!(tree.node(health).unwrap().display().value_text, "42");
    }
}
