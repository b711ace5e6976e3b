//! Runtime values of the inspected object graph.
//!
//! Scalars are stored inline. Objects and lists are shared, interiorly mutable
//! handles: cloning a [`Value::Object`] clones the handle, not the object, and
//! equality on them is identity.

use crate::reflect::type_table::{TypeId, TypeTable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A value read from (or written to) the inspected graph.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
    List(ListRef),
}

impl Value {
    /// Concrete runtime type, or None for null.
    pub fn runtime_type(&self) -> Option<TypeId> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeTable::BOOL),
            Value::Int(_) => Some(TypeTable::INT),
            Value::Float(_) => Some(TypeTable::FLOAT),
            Value::Str(_) => Some(TypeTable::STRING),
            Value::Object(obj) => Some(obj.type_id()),
            Value::List(list) => Some(list.type_id()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Short human-readable text used as a node's value column.
    pub fn display_text(&self, types: &TypeTable) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => format!("{:.3}", v),
            Value::Str(v) => format!("\"{}\"", v),
            Value::Object(obj) => types.name(obj.type_id()).to_string(),
            Value::List(list) => format!("{}[{}]", types.name(list.element_type()), list.len()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Str(v) => write!(f, "Str({:?})", v),
            Value::Object(obj) => write!(f, "Object({}@{:#x})", obj.type_id(), obj.identity()),
            Value::List(list) => write!(f, "List(len={}@{:#x})", list.len(), list.identity()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ListRef> for Value {
    fn from(v: ListRef) -> Self {
        Value::List(v)
    }
}

#[derive(Debug)]
struct ObjectData {
    type_id: TypeId,
    fields: HashMap<String, Value>,
}

/// Shared handle to an object instance.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    pub fn new(type_id: TypeId) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            type_id,
            fields: HashMap::new(),
        })))
    }

    /// Builder-style field assignment.
    pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
        self.set_field(name, value.into());
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.0.borrow().type_id
    }

    /// Current value of a field; None if the field was never assigned.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.borrow().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.0.borrow_mut().fields.insert(name.to_string(), value);
    }

    pub fn remove_field(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().fields.remove(name)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, stable for the lifetime of the object.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.type_id(), self.identity())
    }
}

#[derive(Debug)]
struct ListData {
    type_id: TypeId,
    element_type: TypeId,
    items: Vec<Value>,
}

/// Shared handle to a list instance.
#[derive(Clone)]
pub struct ListRef(Rc<RefCell<ListData>>);

impl ListRef {
    /// A plain `array` of the given element type.
    pub fn new(element_type: TypeId) -> Self {
        Self::with_type(TypeTable::ARRAY, element_type)
    }

    /// A list whose concrete type is a user type implementing `list`.
    pub fn with_type(type_id: TypeId, element_type: TypeId) -> Self {
        Self(Rc::new(RefCell::new(ListData {
            type_id,
            element_type,
            items: Vec::new(),
        })))
    }

    pub fn from_values(element_type: TypeId, items: Vec<Value>) -> Self {
        let list = Self::new(element_type);
        list.0.borrow_mut().items = items;
        list
    }

    pub fn type_id(&self) -> TypeId {
        self.0.borrow().type_id
    }

    pub fn element_type(&self) -> TypeId {
        self.0.borrow().element_type
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    /// Replace the item at `index`; false when out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.borrow_mut().items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().items.push(value.into());
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut data = self.0.borrow_mut();
        if index < data.items.len() {
            Some(data.items.remove(index))
        } else {
            None
        }
    }

    pub fn truncate(&self, len: usize) {
        self.0.borrow_mut().items.truncate(len);
    }

    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRef(len={}@{:#x})", self.len(), self.identity())
    }
}
