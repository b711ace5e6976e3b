//! Type-directed node selection
//!
//! Every node in the inspector tree is an instance of a node kind. Kinds form
//! their own single-inheritance hierarchy under the abstract `node` root and
//! each declares the value type it targets. Given the type of the container
//! that holds a value and the value's runtime type, [`NodeRegistry::select`]
//! returns the most specific selectable kind.
//!
//! ```text
//! node
//! +-- group
//! |   +-- mapped
//! |       +-- members    (members of an object)
//! |       +-- elements   (elements of a list)
//! +-- value              (targets object)
//!     +-- list           (targets the `list` interface)
//!         +-- array      (targets the `array` class)
//! ```

pub mod comparer;

pub use comparer::{compare_kinds, SortContext, SortScope};

use crate::reflect::{TypeId, TypeTable};
use crate::tree::behavior::NodeBehavior;
use crate::tree::kinds::{
    ElementsBehavior, GroupBehavior, ListBehavior, MembersBehavior, PlainBehavior, ValueBehavior,
    DEFAULT_MAX_ELEMENTS,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Index into `NodeRegistry::kinds`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeKindId(pub u32);

impl NodeKindId {
    pub const INVALID: NodeKindId = NodeKindId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeKindId(INVALID)")
        } else {
            write!(f, "NodeKindId({})", self.0)
        }
    }
}

/// A registered node kind.
#[derive(Clone)]
pub struct NodeKindDef {
    pub id: NodeKindId,
    pub name: String,
    pub base: Option<NodeKindId>,
    /// Value type this kind displays
    pub target: TypeId,
    /// Extra bound on the value type, narrower than `target`
    pub value_constraint: Option<TypeId>,
    /// Open definition this kind was instantiated from, used by priority lists
    pub generic_definition: Option<NodeKindId>,
    pub selectable: bool,
    pub behavior: Rc<dyn NodeBehavior>,
}

impl fmt::Debug for NodeKindDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKindDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &self.base)
            .field("target", &self.target)
            .field("value_constraint", &self.value_constraint)
            .field("selectable", &self.selectable)
            .finish()
    }
}

type SelectionKey = (TypeId, TypeId, Option<TypeId>);

/// Registry of node kinds, container priority lists and cached selections.
pub struct NodeRegistry {
    kinds: Vec<NodeKindDef>,
    priorities: HashMap<TypeId, Vec<NodeKindId>>,
    cache: RefCell<HashMap<SelectionKey, Option<NodeKindId>>>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub const ROOT: NodeKindId = NodeKindId(0);
    pub const GROUP: NodeKindId = NodeKindId(1);
    pub const MAPPED: NodeKindId = NodeKindId(2);
    pub const MEMBERS: NodeKindId = NodeKindId(3);
    pub const ELEMENTS: NodeKindId = NodeKindId(4);
    pub const VALUE: NodeKindId = NodeKindId(5);
    pub const LIST: NodeKindId = NodeKindId(6);
    pub const ARRAY: NodeKindId = NodeKindId(7);

    pub fn new() -> Self {
        Self::with_max_elements(DEFAULT_MAX_ELEMENTS)
    }

    /// Builtin kinds, with the elements group capped at `max_elements` children.
    pub fn with_max_elements(max_elements: usize) -> Self {
        let mut registry = Self {
            kinds: Vec::new(),
            priorities: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        };
        let object = TypeTable::OBJECT;
        registry.insert("node", None, object, Rc::new(PlainBehavior), false);
        registry.insert("group", Some(Self::ROOT), object, Rc::new(GroupBehavior), false);
        registry.insert("mapped", Some(Self::GROUP), object, Rc::new(GroupBehavior), false);
        registry.insert("members", Some(Self::MAPPED), object, Rc::new(MembersBehavior), false);
        registry.insert(
            "elements",
            Some(Self::MAPPED),
            TypeTable::LIST,
            Rc::new(ElementsBehavior { max_elements }),
            false,
        );
        registry.insert("value", Some(Self::ROOT), object, Rc::new(ValueBehavior), true);
        registry.insert("list", Some(Self::VALUE), TypeTable::LIST, Rc::new(ListBehavior), true);
        registry.insert("array", Some(Self::LIST), TypeTable::ARRAY, Rc::new(ListBehavior), true);
        registry
    }

    fn insert(
        &mut self,
        name: &str,
        base: Option<NodeKindId>,
        target: TypeId,
        behavior: Rc<dyn NodeBehavior>,
        selectable: bool,
    ) -> NodeKindId {
        let id = NodeKindId(self.kinds.len() as u32);
        self.kinds.push(NodeKindDef {
            id,
            name: name.to_string(),
            base,
            target,
            value_constraint: None,
            generic_definition: None,
            selectable,
            behavior,
        });
        self.cache.borrow_mut().clear();
        id
    }

    /// Register a selectable kind deriving from `base`.
    pub fn define_kind(
        &mut self,
        name: &str,
        base: NodeKindId,
        target: TypeId,
        behavior: Rc<dyn NodeBehavior>,
    ) -> KindBuilder<'_> {
        let id = self.insert(name, Some(base), target, behavior, true);
        tracing::debug!("Registered node kind '{}' as {:?}", name, id);
        KindBuilder { registry: self, id }
    }

    /// Explicit ranking of kinds (by generic definition) for one container type.
    pub fn set_priority(&mut self, container: TypeId, order: Vec<NodeKindId>) {
        self.priorities.insert(container, order);
        self.cache.borrow_mut().clear();
    }

    pub fn priorities(&self, container: TypeId) -> Option<&[NodeKindId]> {
        self.priorities.get(&container).map(Vec::as_slice)
    }

    #[inline]
    pub fn get(&self, id: NodeKindId) -> Option<&NodeKindDef> {
        if id.is_valid() {
            self.kinds.get(id.index())
        } else {
            None
        }
    }

    pub fn name(&self, id: NodeKindId) -> &str {
        self.get(id).map(|k| k.name.as_str()).unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Behavior of a kind; unknown ids behave like the plain root kind.
    pub fn behavior(&self, id: NodeKindId) -> Rc<dyn NodeBehavior> {
        self.get(id)
            .map(|k| k.behavior.clone())
            .unwrap_or_else(|| Rc::new(PlainBehavior))
    }

    /// Number of base hops from `id` up to a kind with no base.
    pub fn depth(&self, id: NodeKindId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|k| k.base);
        while let Some(base) = current {
            depth += 1;
            if depth > self.kinds.len() {
                break;
            }
            current = self.get(base).and_then(|k| k.base);
        }
        depth
    }

    /// True when `id` is `ancestor` or derives from it.
    pub fn derives_from(&self, id: NodeKindId, ancestor: NodeKindId) -> bool {
        let mut current = Some(id);
        let mut hops = 0;
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.kinds.len() {
                break;
            }
            current = self.get(kind).and_then(|k| k.base);
        }
        false
    }

    pub fn derives_from_root(&self, id: NodeKindId) -> bool {
        self.derives_from(id, Self::ROOT)
    }

    /// Selectable kinds able to display a value of `value_type`, in registration order.
    pub fn candidates(&self, types: &TypeTable, value_type: TypeId) -> Vec<NodeKindId> {
        self.kinds
            .iter()
            .filter(|k| k.selectable)
            .filter(|k| types.is_assignable(value_type, k.target))
            .filter(|k| {
                k.value_constraint
                    .map_or(true, |c| types.is_assignable(value_type, c))
            })
            .map(|k| k.id)
            .collect()
    }

    /// Candidates ordered by preference for the given slot.
    pub fn ranked(
        &self,
        types: &TypeTable,
        container: TypeId,
        declared: Option<TypeId>,
        value_type: TypeId,
    ) -> Vec<NodeKindId> {
        let mut candidates = self.candidates(types, value_type);
        let _scope = SortScope::enter(container, declared, false);
        candidates.sort_by(|a, b| compare_kinds(self, types, *a, *b));
        candidates
    }

    /// Most specific kind for a value held by `container`, using the declared
    /// type of the sort scope currently in effect.
    pub fn select(
        &self,
        types: &TypeTable,
        container: TypeId,
        value_type: TypeId,
    ) -> Option<NodeKindId> {
        self.select_declared(types, container, comparer::current().declared, value_type)
    }

    /// Most specific kind for a value of `value_type` stored in a slot declared
    /// as `declared` on `container`.
    pub fn select_declared(
        &self,
        types: &TypeTable,
        container: TypeId,
        declared: Option<TypeId>,
        value_type: TypeId,
    ) -> Option<NodeKindId> {
        let key = (container, value_type, declared);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return *hit;
        }

        let selected = self
            .ranked(types, container, declared, value_type)
            .first()
            .copied();
        tracing::trace!(
            "Selected {:?} for {} in {}",
            selected,
            types.name(value_type),
            types.name(container)
        );
        self.cache.borrow_mut().insert(key, selected);
        selected
    }

    pub fn cached_selections(&self) -> usize {
        self.cache.borrow().len()
    }
}

/// Fluent builder returned by [`NodeRegistry::define_kind`].
pub struct KindBuilder<'a> {
    registry: &'a mut NodeRegistry,
    id: NodeKindId,
}

impl KindBuilder<'_> {
    fn def(&mut self) -> &mut NodeKindDef {
        self.registry.cache.borrow_mut().clear();
        &mut self.registry.kinds[self.id.index()]
    }

    pub fn constraint(mut self, constraint: TypeId) -> Self {
        self.def().value_constraint = Some(constraint);
        self
    }

    pub fn generic_of(mut self, definition: NodeKindId) -> Self {
        self.def().generic_definition = Some(definition);
        self
    }

    /// Abstract kinds are never returned by selection.
    pub fn not_selectable(mut self) -> Self {
        self.def().selectable = false;
        self
    }

    pub fn id(self) -> NodeKindId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf() -> Rc<dyn NodeBehavior> {
        Rc::new(ValueBehavior)
    }

    #[test]
    fn test_builtin_hierarchy() {
        let registry = NodeRegistry::new();
        assert_eq!(registry.name(NodeRegistry::MEMBERS), "members");
        assert!(registry.derives_from(NodeRegistry::ELEMENTS, NodeRegistry::GROUP));
        assert!(registry.derives_from_root(NodeRegistry::ARRAY));
        assert_eq!(registry.depth(NodeRegistry::ROOT), 0);
        assert_eq!(registry.depth(NodeRegistry::ARRAY), 3);
    }

    #[test]
    fn test_scalar_selects_value() {
        let types = TypeTable::new();
        let registry = NodeRegistry::new();
        assert_eq!(
            registry.select_declared(&types, TypeTable::OBJECT, Some(TypeTable::INT), TypeTable::INT),
            Some(NodeRegistry::VALUE)
        );
    }

    #[test]
    fn test_array_prefers_deepest_class_kind() {
        let types = TypeTable::new();
        let registry = NodeRegistry::new();
        let ranked = registry.ranked(&types, TypeTable::OBJECT, None, TypeTable::ARRAY);
        assert_eq!(
            ranked,
            vec![NodeRegistry::ARRAY, NodeRegistry::VALUE, NodeRegistry::LIST]
        );
    }

    #[test]
    fn test_interface_container_prefers_interface_kind() {
        let mut types = TypeTable::new();
        let iface = types.define_interface("IShape").id();
        let circle = types.define_class("Circle", None).implements(iface).id();

        let mut registry = NodeRegistry::new();
        let a = registry
            .define_kind("A", NodeRegistry::ROOT, TypeTable::OBJECT, leaf())
            .id();
        let b = registry.define_kind("B", NodeRegistry::ROOT, iface, leaf()).id();

        let ranked = registry.ranked(&types, iface, None, circle);
        let pos_a = ranked.iter().position(|k| *k == a).unwrap();
        let pos_b = ranked.iter().position(|k| *k == b).unwrap();
        assert!(pos_b < pos_a);
        assert_eq!(registry.select_declared(&types, iface, None, circle), Some(b));

        // Class container: the interface kind loses
        let ranked = registry.ranked(&types, TypeTable::OBJECT, None, circle);
        let pos_a = ranked.iter().position(|k| *k == a).unwrap();
        let pos_b = ranked.iter().position(|k| *k == b).unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn test_declared_interface_counts_as_interface_slot() {
        let types = TypeTable::new();
        let registry = NodeRegistry::new();
        assert_eq!(
            registry.select_declared(&types, TypeTable::OBJECT, Some(TypeTable::LIST), TypeTable::ARRAY),
            Some(NodeRegistry::LIST)
        );
        let _scope = SortScope::enter(TypeTable::OBJECT, Some(TypeTable::LIST), false);
        assert_eq!(
            registry.select(&types, TypeTable::OBJECT, TypeTable::ARRAY),
            Some(NodeRegistry::LIST)
        );
    }

    #[test]
    fn test_priority_list_wins() {
        let types = TypeTable::new();
        let mut registry = NodeRegistry::new();
        let container = TypeId(100);
        registry.set_priority(container, vec![NodeRegistry::VALUE]);
        assert_eq!(
            registry.select_declared(&types, container, None, TypeTable::ARRAY),
            Some(NodeRegistry::VALUE)
        );
    }

    #[test]
    fn test_priority_uses_generic_definition() {
        let types = TypeTable::new();
        let mut registry = NodeRegistry::new();
        let open = registry
            .define_kind("Boxed<>", NodeRegistry::VALUE, TypeTable::OBJECT, leaf())
            .not_selectable()
            .id();
        let closed = registry
            .define_kind("Boxed<int>", NodeRegistry::VALUE, TypeTable::INT, leaf())
            .generic_of(open)
            .id();
        let container = TypeId(100);
        registry.set_priority(container, vec![open]);
        assert_eq!(
            registry.select_declared(&types, container, None, TypeTable::INT),
            Some(closed)
        );
    }

    #[test]
    fn test_more_specific_constraint_wins() {
        let mut types = TypeTable::new();
        let entity = types.define_class("Entity", None).id();
        let player = types.define_class("Player", Some(entity)).id();

        let mut registry = NodeRegistry::new();
        let general = registry
            .define_kind("EntityNode", NodeRegistry::VALUE, TypeTable::OBJECT, leaf())
            .constraint(entity)
            .id();
        let specific = registry
            .define_kind("PlayerNode", NodeRegistry::VALUE, TypeTable::OBJECT, leaf())
            .constraint(player)
            .id();

        assert_eq!(
            registry.select_declared(&types, TypeTable::OBJECT, None, player),
            Some(specific)
        );
        assert_eq!(
            registry.select_declared(&types, TypeTable::OBJECT, None, entity),
            Some(general)
        );
    }

    #[test]
    fn test_cache_invalidated_by_registration() {
        let types = TypeTable::new();
        let mut registry = NodeRegistry::new();
        registry.select_declared(&types, TypeTable::OBJECT, None, TypeTable::INT);
        assert_eq!(registry.cached_selections(), 1);

        let deeper = registry
            .define_kind("IntNode", NodeRegistry::VALUE, TypeTable::INT, leaf())
            .id();
        assert_eq!(registry.cached_selections(), 0);
        assert_eq!(
            registry.select_declared(&types, TypeTable::OBJECT, None, TypeTable::INT),
            Some(deeper)
        );
    }

    proptest! {
        #[test]
        fn prop_ranking_is_a_stable_total_order(order in proptest::sample::subsequence(
            vec![NodeRegistry::VALUE, NodeRegistry::LIST, NodeRegistry::ARRAY], 0..=3
        )) {
            let types = TypeTable::new();
            let registry = NodeRegistry::new();
            let _scope = SortScope::enter(TypeTable::OBJECT, None, false);
            let mut sorted = order.clone();
            sorted.sort_by(|a, b| compare_kinds(&registry, &types, *a, *b));
            let mut again = sorted.clone();
            again.sort_by(|a, b| compare_kinds(&registry, &types, *a, *b));
            prop_assert_eq!(sorted, again);
        }
    }
}
