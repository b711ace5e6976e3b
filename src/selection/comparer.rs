//! Ordering of candidate node kinds.
//!
//! The comparer is a plain function so it can be handed to `sort_by`, but it
//! reads its parameters (container type, declared type, direction) from a
//! thread-local [`SortContext`]. [`SortScope`] sets them for one sort and puts
//! the previous values back when dropped.

use crate::reflect::{TypeId, TypeTable};
use crate::selection::{NodeKindId, NodeRegistry};
use std::cell::Cell;
use std::cmp::Ordering;

/// Parameters of the sort currently in progress on this thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortContext {
    pub container: TypeId,
    /// Static type of the slot the value sits in, if known
    pub declared: Option<TypeId>,
    pub descending: bool,
}

impl Default for SortContext {
    fn default() -> Self {
        Self {
            container: TypeTable::OBJECT,
            declared: None,
            descending: false,
        }
    }
}

thread_local! {
    static CONTEXT: Cell<SortContext> = Cell::new(SortContext::default());
}

/// Current sort parameters.
pub fn current() -> SortContext {
    CONTEXT.with(|c| c.get())
}

/// RAII override of the sort context.
#[must_use = "the previous context is restored when the scope is dropped"]
pub struct SortScope {
    previous: SortContext,
}

impl SortScope {
    pub fn enter(container: TypeId, declared: Option<TypeId>, descending: bool) -> Self {
        let previous = CONTEXT.with(|c| {
            c.replace(SortContext {
                container,
                declared,
                descending,
            })
        });
        Self { previous }
    }
}

impl Drop for SortScope {
    fn drop(&mut self) {
        CONTEXT.with(|c| c.set(self.previous));
    }
}

/// Total order over candidate kinds, most preferred first.
pub fn compare_kinds(
    registry: &NodeRegistry,
    types: &TypeTable,
    a: NodeKindId,
    b: NodeKindId,
) -> Ordering {
    let ctx = current();
    let ordering = compare_ascending(registry, types, &ctx, a, b);
    if ctx.descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn compare_ascending(
    registry: &NodeRegistry,
    types: &TypeTable,
    ctx: &SortContext,
    a: NodeKindId,
    b: NodeKindId,
) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (Some(kind_a), Some(kind_b)) = (registry.get(a), registry.get(b)) else {
        return Ordering::Equal;
    };

    // 1. Explicit priority list for the container
    if let Some(priorities) = registry.priorities(ctx.container) {
        let rank = |kind: NodeKindId| {
            let definition = registry
                .get(kind)
                .and_then(|k| k.generic_definition)
                .unwrap_or(kind);
            priorities.iter().position(|p| *p == definition)
        };
        match (rank(a), rank(b)) {
            (Some(ra), Some(rb)) if ra != rb => return ra.cmp(&rb),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            _ => {}
        }
    }

    // 2. Interface targets, preferred only for interface-typed slots
    if registry.derives_from_root(a) && registry.derives_from_root(b) {
        let a_iface = types.is_interface(kind_a.target);
        let b_iface = types.is_interface(kind_b.target);
        if a_iface != b_iface {
            let prefer_iface = types.is_interface(ctx.container)
                || ctx.declared.is_some_and(|d| types.is_interface(d));
            return if a_iface == prefer_iface {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
    }

    // 3. More specific value constraint
    if let (Some(ca), Some(cb)) = (kind_a.value_constraint, kind_b.value_constraint) {
        if ca != cb {
            if types.is_assignable(ca, cb) {
                return Ordering::Less;
            }
            if types.is_assignable(cb, ca) {
                return Ordering::Greater;
            }
        }
    }

    // 4. Deeper kinds are more specialized
    registry.depth(b).cmp(&registry.depth(a))
}
