//! Plain-text renderer: one indented line per drawn node.

use crate::render::{ContentSink, DrawResponse, NodeStyle, Renderer};
use crate::tree::NodeId;
use std::collections::HashSet;

/// Renders rows as text lines. Scripted toggle clicks can be queued with
/// [`click`](Self::click); draws outside a layout bracket are counted as
/// violations instead of being rendered.
#[derive(Debug, Default)]
pub struct TextRenderer {
    lines: Vec<String>,
    open: usize,
    violations: usize,
    clicks: HashSet<NodeId>,
}

#[derive(Default)]
struct LineSink {
    text: String,
}

impl ContentSink for LineSink {
    fn label(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn value(&mut self, text: &str) {
        self.text.push_str(" = ");
        self.text.push_str(text);
    }

    fn error(&mut self, text: &str) {
        self.text.push_str(" !! ");
        self.text.push_str(text);
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a toggle click the next time `node` is drawn.
    pub fn click(&mut self, node: NodeId) {
        self.clicks.insert(node);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn violations(&self) -> usize {
        self.violations
    }

    pub fn open_layouts(&self) -> usize {
        self.open
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn output(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

impl Renderer for TextRenderer {
    fn begin_layout(&mut self) {
        self.open += 1;
    }

    fn end_layout(&mut self) {
        if self.open == 0 {
            self.violations += 1;
        } else {
            self.open -= 1;
        }
    }

    fn draw(
        &mut self,
        node: NodeId,
        style: &NodeStyle,
        content: &mut dyn FnMut(&mut dyn ContentSink),
    ) -> DrawResponse {
        if self.open == 0 {
            tracing::warn!("Draw of {} outside a layout bracket", node);
            self.violations += 1;
            return DrawResponse::default();
        }

        let marker = match (style.expandable, style.expanded) {
            (true, true) => "- ",
            (true, false) => "+ ",
            _ => "  ",
        };
        let mut sink = LineSink::default();
        content(&mut sink);
        self.lines
            .push(format!("{}{}{}", "  ".repeat(style.indent), marker, sink.text));

        DrawResponse {
            toggled: self.clicks.remove(&node),
        }
    }
}
