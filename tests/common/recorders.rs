//! Observers that record what the tree emits

use inspector_rs::tree::{InspectorTree, NodeEvent, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared log of every event emitted by a tree
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<NodeEvent>>>,
}

impl EventLog {
    /// Create a log and register it on `tree`
    pub fn attach(tree: &mut InspectorTree) -> Self {
        let log = Self::default();
        let sink = log.events.clone();
        tree.add_observer(move |event: &NodeEvent| sink.borrow_mut().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn created(&self) -> Vec<NodeId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                NodeEvent::Created { node } => Some(*node),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<NodeId> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                NodeEvent::Destroyed { node } => Some(*node),
                _ => None,
            })
            .collect()
    }
}
