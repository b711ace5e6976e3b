//! Search predicates over materialized nodes.

use crate::tree::{InspectorTree, NodeId};

/// Decides whether a node matches a search query.
pub trait SearchFilter {
    fn matches(&self, tree: &InspectorTree, node: NodeId) -> bool;
}

impl<F: Fn(&InspectorTree, NodeId) -> bool> SearchFilter for F {
    fn matches(&self, tree: &InspectorTree, node: NodeId) -> bool {
        self(tree, node)
    }
}

/// Case-insensitive substring match on a node's name or path.
#[derive(Debug, Clone)]
pub struct NameFilter {
    query: String,
    match_path: bool,
}

impl NameFilter {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_lowercase(),
            match_path: false,
        }
    }

    /// Match against the whole dotted path instead of the name only.
    pub fn with_path(mut self) -> Self {
        self.match_path = true;
        self
    }
}

impl SearchFilter for NameFilter {
    fn matches(&self, tree: &InspectorTree, node: NodeId) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let haystack = if self.match_path {
            match tree.path(node) {
                Ok(path) => path,
                Err(_) => return false,
            }
        } else {
            match tree.get(node) {
                Some(n) => n.name().to_string(),
                None => return false,
            }
        };
        haystack.to_lowercase().contains(&self.query)
    }
}
