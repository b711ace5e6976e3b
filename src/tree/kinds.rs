//! Behaviors of the builtin node kinds.

use crate::binding::AccessOptions;
use crate::error::Result;
use crate::reflect::Value;
use crate::render::ContentSink;
use crate::selection::{NodeKindId, NodeRegistry};
use crate::tree::behavior::NodeBehavior;
use crate::tree::mapped::{reconcile_mapped, MappedItem};
use crate::tree::node::DisplayData;
use crate::tree::{InspectorTree, NodeId};

/// Elements shown per list before the rest are elided.
pub const DEFAULT_MAX_ELEMENTS: usize = 256;

/// The abstract root kind: name only.
#[derive(Debug, Default)]
pub struct PlainBehavior;

impl NodeBehavior for PlainBehavior {}

/// Pure grouping node.
#[derive(Debug, Default)]
pub struct GroupBehavior;

impl NodeBehavior for GroupBehavior {
    fn is_group(&self) -> bool {
        true
    }

    fn draw_content(&self, tree: &InspectorTree, node: NodeId, sink: &mut dyn ContentSink) {
        if let Some(n) = tree.get(node) {
            sink.label(n.name());
        }
    }
}

/// Group listing the members of the object in its subject.
#[derive(Debug, Default)]
pub struct MembersBehavior;

impl NodeBehavior for MembersBehavior {
    fn is_group(&self) -> bool {
        true
    }

    fn update_self(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let count = match tree.node(node)?.subject() {
            Value::Object(obj) => tree.types().members(obj.type_id()).len(),
            _ => 0,
        };
        let display = DisplayData {
            value_text: format!("{} members", count),
            ..DisplayData::default()
        };
        tree.set_display(node, display)
    }

    fn update_children(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let subject = tree.node(node)?.subject().clone();
        let items: Vec<MappedItem> = match &subject {
            Value::Object(obj) => {
                let owner_type = obj.type_id();
                tree.types()
                    .members(owner_type)
                    .iter()
                    .filter(|m| m.can_read())
                    .map(|m| MappedItem::member(&subject, owner_type, m.clone()))
                    .collect()
            }
            _ => Vec::new(),
        };
        reconcile_mapped(tree, node, &items, false).map(|_| ())
    }

    fn draw_content(&self, tree: &InspectorTree, node: NodeId, sink: &mut dyn ContentSink) {
        GroupBehavior.draw_content(tree, node, sink);
    }
}

/// Group listing the slots of the list in its subject, up to a cap.
#[derive(Debug)]
pub struct ElementsBehavior {
    pub max_elements: usize,
}

impl Default for ElementsBehavior {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

impl NodeBehavior for ElementsBehavior {
    fn is_group(&self) -> bool {
        true
    }

    fn update_self(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let len = tree.node(node)?.subject().as_list().map_or(0, |l| l.len());
        let value_text = if len > self.max_elements {
            format!("{} of {} elements", self.max_elements, len)
        } else {
            format!("{} elements", len)
        };
        tree.set_display(
            node,
            DisplayData {
                value_text,
                ..DisplayData::default()
            },
        )
    }

    fn update_children(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let items: Vec<MappedItem> = match tree.node(node)?.subject().as_list() {
            Some(list) => (0..list.len().min(self.max_elements))
                .map(|i| MappedItem::element(list, i))
                .collect(),
            None => Vec::new(),
        };
        reconcile_mapped(tree, node, &items, false).map(|_| ())
    }

    fn draw_content(&self, tree: &InspectorTree, node: NodeId, sink: &mut dyn ContentSink) {
        GroupBehavior.draw_content(tree, node, sink);
    }
}

/// Leaf or composite value; objects expand into a members group.
#[derive(Debug, Default)]
pub struct ValueBehavior;

impl NodeBehavior for ValueBehavior {
    fn update_self(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        refresh_value(tree, node)
    }

    fn update_children(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let subject = tree.node(node)?.subject().clone();
        match subject {
            Value::Object(_) => ensure_group(tree, node, NodeRegistry::MEMBERS, "members", subject)
                .map(|_| ()),
            _ => tree.clear_children(node),
        }
    }
}

/// Value whose subject is a list; expands into an elements group.
#[derive(Debug, Default)]
pub struct ListBehavior;

impl NodeBehavior for ListBehavior {
    fn update_self(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        refresh_value(tree, node)
    }

    fn update_children(&self, tree: &mut InspectorTree, node: NodeId) -> Result<()> {
        let subject = tree.node(node)?.subject().clone();
        match subject {
            Value::List(_) => ensure_group(tree, node, NodeRegistry::ELEMENTS, "elements", subject)
                .map(|_| ()),
            _ => tree.clear_children(node),
        }
    }
}

/// Read the node's binding (if any) into its subject and display data.
/// Failed reads keep the node alive and show the error instead of a value.
fn refresh_value(tree: &mut InspectorTree, node: NodeId) -> Result<()> {
    let n = tree.node(node)?;
    let (subject, error) = match n.binding() {
        Some(binding) => {
            let accessed = match binding.take_prefetched() {
                Some(accessed) => accessed,
                None => binding.get_with(AccessOptions::ISOLATED)?,
            };
            let error = accessed.outcome.error.as_ref().map(|e| e.to_string());
            (accessed.value, error)
        }
        None => (n.subject().clone(), None),
    };

    let types = tree.types();
    let type_name = subject
        .runtime_type()
        .or_else(|| n.binding().map(|b| b.member().value_type()))
        .map(|t| types.name(t).to_string())
        .unwrap_or_default();
    let display = DisplayData {
        value_text: subject.display_text(types),
        type_name,
        error,
    };
    tree.set_subject(node, subject)?;
    tree.set_display(node, display)
}

/// Make `node`'s only child a group of `kind` showing `subject`, reusing the
/// existing group when there is one.
pub fn ensure_group(
    tree: &mut InspectorTree,
    node: NodeId,
    kind: NodeKindId,
    name: &str,
    subject: Value,
) -> Result<NodeId> {
    if let [only] = tree.node(node)?.children() {
        let only = *only;
        if tree.node(only)?.kind() == kind {
            tree.set_subject(only, subject)?;
            return Ok(only);
        }
    }
    tree.clear_children(node)?;
    let group = tree.create_node(kind, name, Some(node))?;
    tree.set_subject(group, subject)?;
    Ok(group)
}
