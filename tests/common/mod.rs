//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod recorders;

use inspector_rs::tree::{InspectorTree, NodeId};

/// Find a live node by its dotted path
pub fn find(tree: &InspectorTree, path: &str) -> Option<NodeId> {
    tree.iter()
        .map(|n| n.id())
        .find(|id| tree.path(*id).map(|p| p == path).unwrap_or(false))
}

/// Find a live node by path, panicking with the available paths when missing
pub fn expect_node(tree: &InspectorTree, path: &str) -> NodeId {
    find(tree, path).unwrap_or_else(|| {
        let paths: Vec<String> = tree.iter().filter_map(|n| tree.path(n.id()).ok()).collect();
        panic!("No node at '{}', have {:?}", path, paths)
    })
}

/// Names of a node's children, in order
pub fn child_names(tree: &InspectorTree, node: NodeId) -> Vec<String> {
    tree.node(node)
        .unwrap()
        .children()
        .iter()
        .map(|c| tree.node(*c).unwrap().name().to_string())
        .collect()
}
