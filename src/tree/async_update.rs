//! Incremental refresh spread over scheduler ticks.
//!
//! Each node is visited by its own routine: the node refreshes itself, yields
//! one tick, refreshes its child list and then runs one nested routine per
//! child. Nested routines run inside the budget of the routine awaiting them,
//! so the top-level multiplier is the number of walk steps per tick, and
//! pausing or stopping the top-level routine pauses or stops the whole walk.
//!
//! The walk holds no borrow of the tree across yield points; nodes destroyed
//! while it is suspended are skipped.

use crate::error::{InspectError, Result};
use crate::scheduler::{Routine, Scheduler, Step};
use crate::tree::update::UpdateOptions;
use crate::tree::{InspectorTree, NodeId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub type SharedTree = Rc<RefCell<InspectorTree>>;

/// Start an asynchronous refresh of `node`'s subtree. Walks already running on
/// `node` or on any of its ancestors are stopped first.
pub fn async_update(
    tree: &SharedTree,
    scheduler: &Scheduler,
    node: NodeId,
    options: UpdateOptions,
    multiplier: u32,
) -> Result<Routine> {
    let running: Vec<Routine> = {
        let t = tree
            .try_borrow()
            .map_err(|_| InspectError::InvalidState("tree is mutably borrowed".into()))?;
        let mut chain = vec![node];
        chain.extend(t.ancestors(node)?);
        chain
            .iter()
            .filter_map(|id| t.get(*id).and_then(|n| n.async_routine.clone()))
            .collect()
    };
    for routine in running {
        if scheduler.stop(&routine) {
            tracing::debug!("Stopped previous async update {}", routine.id());
        }
    }

    let routine = walk_routine(tree, node, options, 0, multiplier)?;
    scheduler.start(&routine)
}

fn walk_routine(
    tree: &SharedTree,
    node: NodeId,
    options: UpdateOptions,
    depth: usize,
    multiplier: u32,
) -> Result<Routine> {
    let weak = Rc::downgrade(tree);
    let routine = Routine::new(format!("async-update {}", node), move || AsyncWalk {
        tree: weak.clone(),
        node,
        options: options.clone(),
        depth,
        multiplier,
        phase: Phase::Start,
    });
    routine.set_multiplier(multiplier);
    tree.try_borrow_mut()
        .map_err(|_| InspectError::InvalidState("tree is borrowed".into()))?
        .node_mut(node)?
        .async_routine = Some(routine.clone());
    Ok(routine)
}

enum Phase {
    Start,
    Children,
    Recurse { children: Vec<NodeId>, next: usize },
    Done,
}

struct AsyncWalk {
    tree: Weak<RefCell<InspectorTree>>,
    node: NodeId,
    options: UpdateOptions,
    depth: usize,
    multiplier: u32,
    phase: Phase,
}

impl AsyncWalk {
    fn shared(&self) -> Option<SharedTree> {
        self.tree.upgrade()
    }
}

fn borrowed() -> InspectError {
    InspectError::InvalidState("tree is borrowed during an async update".into())
}

impl Iterator for AsyncWalk {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Result<Step>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Start => {
                    let shared = self.shared()?;
                    let Ok(mut tree) = shared.try_borrow_mut() else {
                        return Some(Err(borrowed()));
                    };
                    if !tree.contains(self.node) {
                        return None;
                    }
                    if self.depth > self.options.max_depth {
                        tree.discard_prefetched(self.node);
                        return None;
                    }
                    if let Err(e) = tree.update_self(self.node) {
                        return Some(Err(e));
                    }
                    self.phase = Phase::Children;
                    return Some(Ok(Step::Tick));
                }
                Phase::Children => {
                    let shared = self.shared()?;
                    let Ok(mut tree) = shared.try_borrow_mut() else {
                        return Some(Err(borrowed()));
                    };
                    if !tree.contains(self.node) || !self.options.allows_children(&tree, self.node) {
                        return None;
                    }
                    if let Err(e) = tree.update_children(self.node) {
                        return Some(Err(e));
                    }
                    if !tree.should_descend(self.node, &self.options) {
                        tree.discard_children_prefetched(self.node);
                        return None;
                    }
                    let children = tree.get(self.node).map(|n| n.children.clone())?;
                    self.phase = Phase::Recurse { children, next: 0 };
                }
                Phase::Recurse { children, next } => {
                    let child = *children.get(next)?;
                    let shared = self.shared()?;
                    self.phase = Phase::Recurse {
                        children,
                        next: next + 1,
                    };
                    let alive = shared.try_borrow().map(|t| t.contains(child)).unwrap_or(false);
                    if !alive {
                        continue;
                    }
                    return Some(
                        walk_routine(
                            &shared,
                            child,
                            self.options.clone(),
                            self.depth + 1,
                            self.multiplier,
                        )
                        .map(Step::Routine),
                    );
                }
                Phase::Done => return None,
            }
        }
    }
}
