//! Global Type Table for the inspected runtime
//!
//! Every type the inspector can see is stored by index (TypeId) in a single table.
//! Types reference each other by TypeId rather than by nesting, which keeps the
//! supertype walk (base chain plus implemented interfaces) a cheap index chase.
//!
//! The table starts with a small set of builtins:
//!
//! ```text
//! object            (class, root of every class hierarchy)
//! +-- bool, int, float, string   (primitives)
//! +-- array : list  (class implementing the `list` interface)
//! list              (interface)
//! ```
//!
//! Member descriptors are resolved once per type (inherited members first, then
//! own members, derived members replacing base members of the same name) and
//! cached until the table is mutated again.

use crate::reflect::member::{ComputeFn, MemberDescriptor, PropertyGetter, PropertySetter};
use crate::reflect::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A unique identifier for a type in the type table.
/// This is just an index into the types vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The invalid/unresolved type ID
    pub const INVALID: TypeId = TypeId(u32::MAX);

    /// Check if this is a valid type ID
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TypeId(INVALID)")
        } else {
            write!(f, "TypeId({})", self.0)
        }
    }
}

/// The kind of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A class; has a base class (except `object`) and may implement interfaces
    Class,
    /// An interface; may extend other interfaces
    Interface,
    /// A primitive leaf value (bool, int, float, string)
    Primitive,
}

/// A type definition in the type table
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeId,
    pub name: String,
    pub kind: TypeKind,
    /// Base class (None for `object` and for interfaces)
    pub base: Option<TypeId>,
    /// Directly implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<TypeId>,
    /// Members declared on this type only
    pub members: Vec<MemberDescriptor>,
}

impl TypeDef {
    fn new(id: TypeId, name: String, kind: TypeKind, base: Option<TypeId>) -> Self {
        Self {
            id,
            name,
            kind,
            base,
            interfaces: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

/// Flat-storage type table with name lookup and a per-type member cache.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    name_index: HashMap<String, TypeId>,
    member_cache: RefCell<HashMap<TypeId, Rc<[MemberDescriptor]>>>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub const OBJECT: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const FLOAT: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const LIST: TypeId = TypeId(5);
    pub const ARRAY: TypeId = TypeId(6);

    /// Create a table holding only the builtin types.
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            name_index: HashMap::new(),
            member_cache: RefCell::new(HashMap::new()),
        };
        table.insert("object", TypeKind::Class, None);
        table.insert("bool", TypeKind::Primitive, Some(Self::OBJECT));
        table.insert("int", TypeKind::Primitive, Some(Self::OBJECT));
        table.insert("float", TypeKind::Primitive, Some(Self::OBJECT));
        table.insert("string", TypeKind::Primitive, Some(Self::OBJECT));
        table.insert("list", TypeKind::Interface, None);
        let array = table.insert("array", TypeKind::Class, Some(Self::OBJECT));
        table.types[array.index()].interfaces.push(Self::LIST);
        table
    }

    fn insert(&mut self, name: &str, kind: TypeKind, base: Option<TypeId>) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types
            .push(TypeDef::new(id, name.to_string(), kind, base));
        self.name_index.insert(name.to_string(), id);
        self.member_cache.borrow_mut().clear();
        id
    }

    /// Number of types in the table (builtins included)
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Start defining a class deriving from `base` (or `object` when None).
    pub fn define_class(&mut self, name: &str, base: Option<TypeId>) -> TypeBuilder<'_> {
        let id = self.insert(name, TypeKind::Class, Some(base.unwrap_or(Self::OBJECT)));
        TypeBuilder { table: self, id }
    }

    /// Start defining an interface.
    pub fn define_interface(&mut self, name: &str) -> TypeBuilder<'_> {
        let id = self.insert(name, TypeKind::Interface, None);
        TypeBuilder { table: self, id }
    }

    /// Reopen an existing type to add members or interfaces.
    pub fn extend(&mut self, id: TypeId) -> TypeBuilder<'_> {
        TypeBuilder { table: self, id }
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        if id.is_valid() {
            self.types.get(id.index())
        } else {
            None
        }
    }

    /// Look up a type by name.
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.name_index.get(name).copied()
    }

    /// Name of a type, or `"?"` for ids outside the table.
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).map(|t| t.name.as_str()).unwrap_or("?")
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        self.get(id).map(TypeDef::is_interface).unwrap_or(false)
    }

    /// True when a value of type `from` can be stored in a slot of type `to`.
    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to || to == Self::OBJECT {
            return self.get(from).is_some();
        }
        self.supertypes(from).contains(&to)
    }

    /// `from` followed by its base chain, then every interface reachable from any
    /// of those (breadth first, deduplicated), with `object` last.
    pub fn supertypes(&self, from: TypeId) -> Vec<TypeId> {
        let mut chain = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(def) = self.get(id) else { break };
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            current = def.base;
        }

        let mut interfaces: Vec<TypeId> = Vec::new();
        let mut queue: Vec<TypeId> = chain
            .iter()
            .filter_map(|id| self.get(*id))
            .flat_map(|def| def.interfaces.iter().copied())
            .collect();
        let mut cursor = 0;
        while cursor < queue.len() {
            let iface = queue[cursor];
            cursor += 1;
            if chain.contains(&iface) || interfaces.contains(&iface) {
                continue;
            }
            interfaces.push(iface);
            if let Some(def) = self.get(iface) {
                queue.extend(def.interfaces.iter().copied());
            }
        }

        chain.retain(|id| *id != Self::OBJECT);
        chain.extend(interfaces);
        if self.get(from).is_some() {
            chain.push(Self::OBJECT);
        }
        chain
    }

    /// Number of base-class hops between `id` and `object`.
    pub fn inheritance_depth(&self, id: TypeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|t| t.base);
        while let Some(base) = current {
            depth += 1;
            if depth > self.types.len() {
                break;
            }
            current = self.get(base).and_then(|t| t.base);
        }
        depth
    }

    /// Value a slot of this type holds when nothing could be read.
    pub fn default_value(&self, id: TypeId) -> Value {
        match id {
            Self::BOOL => Value::Bool(false),
            Self::INT => Value::Int(0),
            Self::FLOAT => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    /// All members visible on a type, inherited members first. Resolved once and cached.
    pub fn members(&self, id: TypeId) -> Rc<[MemberDescriptor]> {
        if let Some(cached) = self.member_cache.borrow().get(&id) {
            return cached.clone();
        }

        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(type_id) = current {
            let Some(def) = self.get(type_id) else { break };
            if chain.contains(&type_id) {
                break;
            }
            chain.push(type_id);
            current = def.base;
        }

        let mut resolved: Vec<MemberDescriptor> = Vec::new();
        for type_id in chain.iter().rev() {
            let Some(def) = self.get(*type_id) else { continue };
            for member in &def.members {
                match resolved.iter().position(|m| m.key() == member.key()) {
                    Some(slot) => resolved[slot] = member.clone(),
                    None => resolved.push(member.clone()),
                }
            }
        }

        let resolved: Rc<[MemberDescriptor]> = resolved.into();
        self.member_cache.borrow_mut().insert(id, resolved.clone());
        resolved
    }

    fn add_member(&mut self, id: TypeId, member: MemberDescriptor) {
        if let Some(def) = self.types.get_mut(id.index()) {
            def.members.push(member);
        }
        self.member_cache.borrow_mut().clear();
    }

    fn add_interface(&mut self, id: TypeId, iface: TypeId) {
        if let Some(def) = self.types.get_mut(id.index()) {
            if !def.interfaces.contains(&iface) {
                def.interfaces.push(iface);
            }
        }
    }
}

/// Fluent builder returned by [`TypeTable::define_class`] and friends.
pub struct TypeBuilder<'a> {
    table: &'a mut TypeTable,
    id: TypeId,
}

impl TypeBuilder<'_> {
    pub fn implements(self, iface: TypeId) -> Self {
        self.table.add_interface(self.id, iface);
        self
    }

    pub fn field(self, name: &str, value_type: TypeId) -> Self {
        self.table.add_member(
            self.id,
            MemberDescriptor::Field {
                name: name.to_string(),
                value_type,
            },
        );
        self
    }

    pub fn property(
        self,
        name: &str,
        value_type: TypeId,
        getter: Option<PropertyGetter>,
        setter: Option<PropertySetter>,
    ) -> Self {
        self.table.add_member(
            self.id,
            MemberDescriptor::Property {
                name: name.to_string(),
                value_type,
                getter,
                setter,
            },
        );
        self
    }

    pub fn computed(self, name: &str, value_type: TypeId, compute: ComputeFn) -> Self {
        self.table.add_member(
            self.id,
            MemberDescriptor::Computed {
                name: name.to_string(),
                value_type,
                compute,
            },
        );
        self
    }

    /// Finish the definition and return the new type's id.
    pub fn id(self) -> TypeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let table = TypeTable::new();
        assert_eq!(table.find("object"), Some(TypeTable::OBJECT));
        assert_eq!(table.find("array"), Some(TypeTable::ARRAY));
        assert!(table.is_interface(TypeTable::LIST));
        assert!(table.is_assignable(TypeTable::ARRAY, TypeTable::LIST));
        assert!(table.is_assignable(TypeTable::INT, TypeTable::OBJECT));
        assert!(!table.is_assignable(TypeTable::INT, TypeTable::FLOAT));
    }

    #[test]
    fn test_supertypes_order() {
        let mut table = TypeTable::new();
        let named = table.define_interface("INamed").id();
        let entity = table.define_class("Entity", None).implements(named).id();
        let player = table.define_class("Player", Some(entity)).id();

        assert_eq!(
            table.supertypes(player),
            vec![player, entity, named, TypeTable::OBJECT]
        );
        assert_eq!(table.inheritance_depth(player), 2);
        assert_eq!(table.inheritance_depth(TypeTable::OBJECT), 0);
    }

    #[test]
    fn test_interface_extends_interface() {
        let mut table = TypeTable::new();
        let base = table.define_interface("IBase").id();
        let derived = table.define_interface("IDerived").implements(base).id();
        let class = table.define_class("Impl", None).implements(derived).id();

        assert!(table.is_assignable(class, base));
        assert!(table.is_assignable(derived, base));
        assert!(!table.is_assignable(base, derived));
    }

    #[test]
    fn test_members_inherited_and_overridden() {
        let mut table = TypeTable::new();
        let entity = table
            .define_class("Entity", None)
            .field("id", TypeTable::INT)
            .field("label", TypeTable::STRING)
            .id();
        let player = table
            .define_class("Player", Some(entity))
            .field("health", TypeTable::INT)
            .field("label", TypeTable::INT)
            .id();

        let members = table.members(player);
        let names: Vec<String> = members.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["id", "label", "health"]);
        assert_eq!(members[1].value_type(), TypeTable::INT);

        // Second call hits the cache and returns the same allocation
        let again = table.members(player);
        assert!(Rc::ptr_eq(&members, &again));
    }

    #[test]
    fn test_default_values() {
        let table = TypeTable::new();
        assert_eq!(table.default_value(TypeTable::INT), Value::Int(0));
        assert_eq!(table.default_value(TypeTable::BOOL), Value::Bool(false));
        assert_eq!(table.default_value(TypeTable::STRING), Value::Null);
    }
}
