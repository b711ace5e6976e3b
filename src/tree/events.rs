//! Structural and visibility notifications emitted by the tree.

use crate::tree::id::NodeId;
use crossbeam_channel::{Receiver, Sender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Created {
        node: NodeId,
    },
    Destroyed {
        node: NodeId,
    },
    Renamed {
        node: NodeId,
        old: String,
        new: String,
    },
    /// Fired before the move; `new_parent` is where the node is going.
    ParentChanging {
        node: NodeId,
        old_parent: Option<NodeId>,
        new_parent: Option<NodeId>,
    },
    ParentChanged {
        node: NodeId,
        old_parent: Option<NodeId>,
        new_parent: Option<NodeId>,
    },
    ChildAdded {
        parent: NodeId,
        child: NodeId,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
    },
    ChildAddedInHierarchy {
        ancestor: NodeId,
        child: NodeId,
    },
    ChildRemovedInHierarchy {
        ancestor: NodeId,
        child: NodeId,
    },
    VisibilityChanged {
        node: NodeId,
        self_visible: bool,
        children_visible: bool,
    },
}

impl NodeEvent {
    /// Node the event is primarily about.
    pub fn subject(&self) -> NodeId {
        match self {
            NodeEvent::Created { node }
            | NodeEvent::Destroyed { node }
            | NodeEvent::Renamed { node, .. }
            | NodeEvent::ParentChanging { node, .. }
            | NodeEvent::ParentChanged { node, .. }
            | NodeEvent::VisibilityChanged { node, .. } => *node,
            NodeEvent::ChildAdded { parent, .. } | NodeEvent::ChildRemoved { parent, .. } => {
                *parent
            }
            NodeEvent::ChildAddedInHierarchy { ancestor, .. }
            | NodeEvent::ChildRemovedInHierarchy { ancestor, .. } => *ancestor,
        }
    }
}

/// Receives every event the tree emits, in emission order.
pub trait NodeObserver {
    fn on_event(&mut self, event: &NodeEvent);
}

impl<F: FnMut(&NodeEvent)> NodeObserver for F {
    fn on_event(&mut self, event: &NodeEvent) {
        self(event)
    }
}

/// Forwards events over a channel, e.g. to a UI thread.
pub struct ChannelObserver {
    sender: Sender<NodeEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<NodeEvent>) -> Self {
        Self { sender }
    }

    /// Observer plus the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<NodeEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl NodeObserver for ChannelObserver {
    fn on_event(&mut self, event: &NodeEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!("Node event receiver dropped");
        }
    }
}
