//! Per-kind node behavior.

use crate::error::Result;
use crate::render::ContentSink;
use crate::tree::{InspectorTree, NodeId};

/// Hooks a node kind plugs into the tree's refresh and draw passes.
///
/// Hooks receive the whole tree and the node's id rather than the node itself,
/// so they can create, reconcile and destroy children.
pub trait NodeBehavior {
    /// Pure groups turn transparent when they are their parent's only child.
    fn is_group(&self) -> bool {
        false
    }

    fn accepts_children(&self) -> bool {
        true
    }

    /// Refresh the node's own display data.
    fn update_self(&self, _tree: &mut InspectorTree, _node: NodeId) -> Result<()> {
        Ok(())
    }

    /// Bring the node's children in line with what it currently shows.
    fn update_children(&self, _tree: &mut InspectorTree, _node: NodeId) -> Result<()> {
        Ok(())
    }

    /// Emit the node's own content. Called only from inside a layout bracket.
    fn draw_content(&self, tree: &InspectorTree, node: NodeId, sink: &mut dyn ContentSink) {
        let Some(n) = tree.get(node) else { return };
        sink.label(n.name());
        let display = n.display();
        if let Some(error) = &display.error {
            sink.error(error);
        } else if !display.value_text.is_empty() {
            sink.value(&display.value_text);
        }
    }
}
