//! Drawing the tree through a host renderer.
//!
//! The tree never paints anything itself. [`draw_tree`] walks the visible
//! nodes and hands each one to a [`Renderer`] together with a content callback
//! that reaches the node kind's own draw hook. Every `draw` call happens
//! inside a [`LayoutBracket`], which opens the renderer's layout on creation
//! and closes it on drop.

pub mod filter;
pub mod text;

pub use filter::{NameFilter, SearchFilter};
pub use text::TextRenderer;

use crate::error::Result;
use crate::reflect::Value;
use crate::selection::NodeKindId;
use crate::tree::{InspectorTree, NodeId};

/// Receives a node's own content, piece by piece.
pub trait ContentSink {
    fn label(&mut self, text: &str);
    fn value(&mut self, text: &str);
    fn error(&mut self, text: &str);
}

/// How a node row should look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStyle {
    pub indent: usize,
    pub kind: NodeKindId,
    /// Shows an expand/collapse toggle
    pub expandable: bool,
    pub expanded: bool,
    pub has_error: bool,
}

/// What the user did with a drawn row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawResponse {
    /// The expand/collapse toggle was clicked
    pub toggled: bool,
}

/// Host-side painter.
pub trait Renderer {
    fn begin_layout(&mut self);
    fn end_layout(&mut self);
    /// Paint one node row. `content` emits the node's own content.
    fn draw(
        &mut self,
        node: NodeId,
        style: &NodeStyle,
        content: &mut dyn FnMut(&mut dyn ContentSink),
    ) -> DrawResponse;
}

/// Open layout on a renderer; closed when dropped.
pub struct LayoutBracket<'a> {
    renderer: &'a mut dyn Renderer,
}

impl<'a> LayoutBracket<'a> {
    pub fn open(renderer: &'a mut dyn Renderer) -> Self {
        renderer.begin_layout();
        Self { renderer }
    }

    pub fn draw(
        &mut self,
        node: NodeId,
        style: &NodeStyle,
        content: &mut dyn FnMut(&mut dyn ContentSink),
    ) -> DrawResponse {
        self.renderer.draw(node, style, content)
    }
}

impl Drop for LayoutBracket<'_> {
    fn drop(&mut self) {
        self.renderer.end_layout();
    }
}

/// Draw `root` and its visible descendants. Toggles reported by the renderer
/// flip the node's stored `children_visible`. Returns the number of rows drawn.
pub fn draw_tree(
    tree: &mut InspectorTree,
    renderer: &mut dyn Renderer,
    root: NodeId,
) -> Result<usize> {
    let mut drawn = 0;
    draw_node(tree, renderer, root, 0, &mut drawn)?;
    Ok(drawn)
}

fn draw_node(
    tree: &mut InspectorTree,
    renderer: &mut dyn Renderer,
    node: NodeId,
    indent: usize,
    drawn: &mut usize,
) -> Result<()> {
    let mut child_indent = indent;
    if tree.self_visible(node) {
        let style = style_for(tree, node, indent)?;
        let response = {
            let view: &InspectorTree = tree;
            let behavior = view.behavior(node);
            let mut content = |sink: &mut dyn ContentSink| behavior.draw_content(view, node, sink);
            let mut bracket = LayoutBracket::open(renderer);
            bracket.draw(node, &style, &mut content)
        };
        *drawn += 1;
        if response.toggled {
            let expanded = tree.node(node)?.stored_children_visible();
            tree.set_children_visible(node, !expanded)?;
        }
        child_indent += 1;
    }

    if tree.children_visible(node) {
        tree.enumerate_children(node, |tree, child| {
            draw_node(tree, renderer, child, child_indent, drawn)
        })?;
    }
    Ok(())
}

fn style_for(tree: &InspectorTree, node: NodeId, indent: usize) -> Result<NodeStyle> {
    let n = tree.node(node)?;
    let composite = matches!(n.subject(), Value::Object(_) | Value::List(_));
    Ok(NodeStyle {
        indent,
        kind: n.kind(),
        expandable: n.child_count() > 0 || composite,
        expanded: tree.children_visible(node),
        has_error: n.display().error.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::TypeTable;
    use crate::selection::NodeRegistry;
    use crate::tree::InspectorContext;

    #[test]
    fn test_draws_only_inside_brackets() {
        let mut tree = InspectorTree::new(InspectorContext::new(TypeTable::new()));
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        tree.create_node(NodeRegistry::VALUE, "a", Some(root)).unwrap();
        tree.create_node(NodeRegistry::VALUE, "b", Some(root)).unwrap();

        let mut renderer = TextRenderer::new();
        assert_eq!(draw_tree(&mut tree, &mut renderer, root).unwrap(), 3);
        assert_eq!(renderer.violations(), 0);
        assert_eq!(renderer.open_layouts(), 0);
        assert_eq!(renderer.lines().len(), 3);
    }

    #[test]
    fn test_transparent_group_not_drawn() {
        let mut tree = InspectorTree::new(InspectorContext::new(TypeTable::new()));
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let group = tree.create_node(NodeRegistry::GROUP, "group", Some(root)).unwrap();
        tree.create_node(NodeRegistry::VALUE, "leaf", Some(group)).unwrap();

        let mut renderer = TextRenderer::new();
        draw_tree(&mut tree, &mut renderer, root).unwrap();
        assert_eq!(renderer.lines(), &["- root".to_string(), "    leaf".to_string()]);
    }

    #[test]
    fn test_toggle_click_expands() {
        let mut tree = InspectorTree::new(InspectorContext::new(TypeTable::new()));
        let root = tree.create_root(NodeRegistry::VALUE, "root").unwrap();
        let a = tree.create_node(NodeRegistry::VALUE, "a", Some(root)).unwrap();
        tree.create_node(NodeRegistry::VALUE, "a1", Some(a)).unwrap();

        let mut renderer = TextRenderer::new();
        assert_eq!(draw_tree(&mut tree, &mut renderer, root).unwrap(), 2);
        assert_eq!(renderer.lines()[1], "  + a");

        // The click applies before the children are visited
        let mut renderer = TextRenderer::new();
        renderer.click(a);
        assert_eq!(draw_tree(&mut tree, &mut renderer, root).unwrap(), 3);
        assert!(tree.children_visible(a));

        let mut renderer = TextRenderer::new();
        renderer.click(a);
        assert_eq!(draw_tree(&mut tree, &mut renderer, root).unwrap(), 2);
        assert!(!tree.node(a).unwrap().stored_children_visible());
    }
}
