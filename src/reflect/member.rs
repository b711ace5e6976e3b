//! Member descriptors: the closed set of slots a value binding can point at.

use crate::reflect::accessor::AccessError;
use crate::reflect::type_table::TypeId;
use crate::reflect::value::{ObjectRef, Value};
use std::fmt;
use std::rc::Rc;

/// User code run to read a property.
pub type PropertyGetter = Rc<dyn Fn(&ObjectRef) -> Result<Value, AccessError>>;
/// User code run to write a property.
pub type PropertySetter = Rc<dyn Fn(&ObjectRef, Value) -> Result<(), AccessError>>;
/// Derived, read-only value computed from the owner.
pub type ComputeFn = Rc<dyn Fn(&Value) -> Result<Value, AccessError>>;

/// Key identifying a member within its owner: by name, or by position for
/// collection elements. Also the domain key of mapped tree children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKey {
    Named(String),
    Index(usize),
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Named(name) => write!(f, "{}", name),
            MemberKey::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A readable and/or writable slot on an owner value.
#[derive(Clone)]
pub enum MemberDescriptor {
    /// Plain stored field of an object
    Field { name: String, value_type: TypeId },
    /// Field-like member backed by user code
    Property {
        name: String,
        value_type: TypeId,
        getter: Option<PropertyGetter>,
        setter: Option<PropertySetter>,
    },
    /// Element of a list
    CollectionIndex { index: usize, element_type: TypeId },
    /// Read-only value derived from the owner
    Computed {
        name: String,
        value_type: TypeId,
        compute: ComputeFn,
    },
}

impl MemberDescriptor {
    pub fn key(&self) -> MemberKey {
        match self {
            MemberDescriptor::Field { name, .. }
            | MemberDescriptor::Property { name, .. }
            | MemberDescriptor::Computed { name, .. } => MemberKey::Named(name.clone()),
            MemberDescriptor::CollectionIndex { index, .. } => MemberKey::Index(*index),
        }
    }

    /// Display name (`[3]` for collection elements).
    pub fn name(&self) -> String {
        self.key().to_string()
    }

    /// Declared type of the slot.
    pub fn value_type(&self) -> TypeId {
        match self {
            MemberDescriptor::Field { value_type, .. }
            | MemberDescriptor::Property { value_type, .. }
            | MemberDescriptor::Computed { value_type, .. } => *value_type,
            MemberDescriptor::CollectionIndex { element_type, .. } => *element_type,
        }
    }

    pub fn can_read(&self) -> bool {
        match self {
            MemberDescriptor::Property { getter, .. } => getter.is_some(),
            _ => true,
        }
    }

    pub fn can_write(&self) -> bool {
        match self {
            MemberDescriptor::Property { setter, .. } => setter.is_some(),
            MemberDescriptor::Computed { .. } => false,
            _ => true,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            MemberDescriptor::Field { .. } => "Field",
            MemberDescriptor::Property { .. } => "Property",
            MemberDescriptor::CollectionIndex { .. } => "CollectionIndex",
            MemberDescriptor::Computed { .. } => "Computed",
        }
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.variant_name())
            .field("key", &self.key())
            .field("value_type", &self.value_type())
            .field("can_read", &self.can_read())
            .field("can_write", &self.can_write())
            .finish()
    }
}
