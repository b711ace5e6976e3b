//! Keyed reconciliation of group children.
//!
//! A mapped group remembers which child shows which member (or list index).
//! On every refresh the new item sequence is reconciled against that map so
//! that nodes for surviving keys are kept, with their expansion state and
//! bindings, instead of being rebuilt.

use crate::binding::{AccessOptions, ValueBinding};
use crate::error::{InspectError, Result};
use crate::reflect::{ListRef, MemberDescriptor, MemberKey, TypeId, Value};
use crate::tree::{InspectorTree, NodeId};
use std::collections::{HashMap, HashSet};

/// Bidirectional key <-> child map of a mapped group.
#[derive(Debug, Clone, Default)]
pub struct MappedChildren {
    by_key: HashMap<MemberKey, NodeId>,
    by_node: HashMap<NodeId, MemberKey>,
}

impl MappedChildren {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, key: &MemberKey) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    pub fn key_of(&self, node: NodeId) -> Option<&MemberKey> {
        self.by_node.get(&node)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    pub(crate) fn insert(&mut self, key: MemberKey, node: NodeId) {
        if let Some(previous) = self.by_key.insert(key.clone(), node) {
            self.by_node.remove(&previous);
        }
        self.by_node.insert(node, key);
    }

    /// Drop the entry of a child that left the group.
    pub(crate) fn forget_node(&mut self, node: NodeId) -> Option<MemberKey> {
        let key = self.by_node.remove(&node)?;
        self.by_key.remove(&key);
        Some(key)
    }
}

/// One entry of the sequence a mapped group should show.
#[derive(Debug, Clone)]
pub struct MappedItem {
    pub key: MemberKey,
    pub owner: Value,
    /// Type the member was resolved on
    pub owner_type: TypeId,
    pub member: MemberDescriptor,
}

impl MappedItem {
    pub fn member(owner: &Value, owner_type: TypeId, member: MemberDescriptor) -> Self {
        Self {
            key: member.key(),
            owner: owner.clone(),
            owner_type,
            member,
        }
    }

    /// Slot `index` of `list`.
    pub fn element(list: &ListRef, index: usize) -> Self {
        let member = MemberDescriptor::CollectionIndex {
            index,
            element_type: list.element_type(),
        };
        Self {
            key: member.key(),
            owner: Value::List(list.clone()),
            owner_type: list.type_id(),
            member,
        }
    }
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub retained: usize,
    pub removed: usize,
}

/// Make the children of `group` show exactly `items`, in order.
///
/// With `verify` set, every item's owner must be an instance of the item's
/// owner type; a mismatch fails with `ArgumentError` before anything changes.
pub fn reconcile_mapped(
    tree: &mut InspectorTree,
    group: NodeId,
    items: &[MappedItem],
    verify: bool,
) -> Result<ReconcileStats> {
    if verify {
        verify_items(tree, items)?;
    }

    let node = tree.node_mut(group)?;
    if node.enumerating > 0 {
        return Err(InspectError::ConcurrentStructuralChange(format!(
            "cannot reconcile {} while its children are enumerated",
            group
        )));
    }
    let mapped = node.mapped.get_or_insert_with(MappedChildren::new).clone();
    let mut stats = ReconcileStats::default();

    // Shrink from the end first so trailing list slots go away cheaply
    if items.len() < mapped.len() {
        let children = tree.node(group)?.children.clone();
        let mut excess = mapped.len() - items.len();
        for child in children.into_iter().rev() {
            if excess == 0 {
                break;
            }
            if mapped.contains_node(child) {
                tree.destroy(child)?;
                stats.removed += 1;
                excess -= 1;
            }
        }
    }

    let wanted: HashSet<&MemberKey> = items.iter().map(|i| &i.key).collect();
    let stale: Vec<NodeId> = mapped_entries(tree, group)?
        .into_iter()
        .filter(|(key, _)| !wanted.contains(key))
        .map(|(_, node)| node)
        .collect();
    for child in stale {
        tree.destroy(child)?;
        stats.removed += 1;
    }

    let mut position = 0;
    for item in items {
        let ctx = tree.context().clone();
        let container = item.owner.runtime_type().unwrap_or(item.owner_type);
        let declared = Some(item.member.value_type());
        let existing = tree.node(group)?.mapped.as_ref().and_then(|m| m.get(&item.key));

        let retained = match existing {
            Some(child) => {
                let node = tree.node_mut(child)?;
                let value_type = match node.binding.as_mut() {
                    Some(binding) => {
                        binding.set_owner(item.owner.clone());
                        binding.prefetch_type(AccessOptions::ISOLATED)
                    }
                    None => item.member.value_type(),
                };
                let kind = node.kind;
                let selected =
                    ctx.registry
                        .select_declared(&ctx.types, container, declared, value_type);
                if selected == Some(kind) {
                    Some(child)
                } else {
                    tracing::debug!(
                        "Kind of '{}' changed to {:?}, rebuilding",
                        item.key,
                        selected
                    );
                    tree.destroy(child)?;
                    stats.removed += 1;
                    None
                }
            }
            None => None,
        };

        match retained {
            Some(child) => {
                tree.move_child(group, child, position)?;
                stats.retained += 1;
            }
            None => {
                let binding = ValueBinding::new(
                    item.owner.clone(),
                    item.owner_type,
                    item.member.clone(),
                    ctx.accessors.as_ref(),
                    &ctx.types,
                );
                let value_type = binding.prefetch_type(AccessOptions::ISOLATED);
                let Some(kind) =
                    ctx.registry
                        .select_declared(&ctx.types, container, declared, value_type)
                else {
                    tracing::warn!(
                        "No node kind can display '{}' of type {}",
                        item.key,
                        ctx.types.name(value_type)
                    );
                    continue;
                };
                let child = tree.create_node_at(kind, &item.key.to_string(), group, position)?;
                tree.set_binding(child, binding)?;
                if let Some(mapped) = tree.node_mut(group)?.mapped.as_mut() {
                    mapped.insert(item.key.clone(), child);
                }
                stats.created += 1;
            }
        }
        position += 1;
    }

    tracing::trace!(
        "Reconciled {}: {} created, {} retained, {} removed",
        group,
        stats.created,
        stats.retained,
        stats.removed
    );
    Ok(stats)
}

fn mapped_entries(tree: &InspectorTree, group: NodeId) -> Result<Vec<(MemberKey, NodeId)>> {
    let node = tree.node(group)?;
    let Some(mapped) = node.mapped.as_ref() else {
        return Ok(Vec::new());
    };
    Ok(node
        .children
        .iter()
        .filter_map(|c| mapped.key_of(*c).map(|k| (k.clone(), *c)))
        .collect())
}

fn verify_items(tree: &InspectorTree, items: &[MappedItem]) -> Result<()> {
    let types = tree.types();
    for item in items {
        let Some(actual) = item.owner.runtime_type() else {
            return Err(InspectError::ArgumentError(format!(
                "item '{}' has no owner",
                item.key
            )));
        };
        if !types.is_assignable(actual, item.owner_type) {
            return Err(InspectError::ArgumentError(format!(
                "owner of '{}' is a {}, not a {}",
                item.key,
                types.name(actual),
                types.name(item.owner_type)
            )));
        }
    }
    Ok(())
}
