//! Compiled accessors
//!
//! A member descriptor is turned into a pair of closures once per
//! (owner type, member) and cached, so every later read or write is a map hit
//! followed by a direct call. Nodes never look at the descriptor again after
//! their binding is built.
//!
//! List slots are the exception: their accessors only capture the index, so
//! they are built on every request and never cached. A long list would
//! otherwise leave one entry per index it ever had.

use crate::reflect::member::{MemberDescriptor, MemberKey};
use crate::reflect::type_table::TypeId;
use crate::reflect::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Failure of a single read or write against an inspected value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("owner is missing")]
    MissingOwner,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("member '{0}' is read-only")]
    ReadOnly(String),

    #[error("member '{0}' is write-only")]
    WriteOnly(String),

    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl AccessError {
    fn mismatch(expected: &str, found: &Value) -> Self {
        AccessError::TypeMismatch {
            expected: expected.to_string(),
            found: format!("{:?}", found),
        }
    }
}

pub type Getter = Rc<dyn Fn(&Value) -> Result<Value, AccessError>>;
pub type Setter = Rc<dyn Fn(&Value, Value) -> Result<(), AccessError>>;

/// Get/set closure pair for one member of one owner type.
#[derive(Clone, Default)]
pub struct CompiledAccessor {
    pub get: Option<Getter>,
    pub set: Option<Setter>,
}

impl std::fmt::Debug for CompiledAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledAccessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// Turns member descriptors into callable accessors.
pub trait AccessorCompiler {
    fn compile(&self, owner_type: TypeId, member: &MemberDescriptor) -> CompiledAccessor;
}

/// Default compiler: builds closures per descriptor variant and caches them
/// per (owner type, member key).
#[derive(Default)]
pub struct CachingAccessorCompiler {
    cache: RefCell<HashMap<(TypeId, MemberKey), CompiledAccessor>>,
    compilations: Cell<usize>,
}

impl CachingAccessorCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache misses so far.
    pub fn compilations(&self) -> usize {
        self.compilations.get()
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    fn build(member: &MemberDescriptor) -> CompiledAccessor {
        match member.clone() {
            MemberDescriptor::Field { name, .. } => {
                let get_name = name.clone();
                let get: Getter = Rc::new(move |owner| {
                    let obj = owner
                        .as_object()
                        .ok_or_else(|| AccessError::mismatch("object", owner))?;
                    Ok(obj.field(&get_name).unwrap_or_default())
                });
                let set: Setter = Rc::new(move |owner, value| {
                    let obj = owner
                        .as_object()
                        .ok_or_else(|| AccessError::mismatch("object", owner))?;
                    obj.set_field(&name, value);
                    Ok(())
                });
                CompiledAccessor {
                    get: Some(get),
                    set: Some(set),
                }
            }
            MemberDescriptor::Property { getter, setter, .. } => CompiledAccessor {
                get: getter.map(|getter| -> Getter {
                    Rc::new(move |owner| {
                        let obj = owner
                            .as_object()
                            .ok_or_else(|| AccessError::mismatch("object", owner))?;
                        getter(obj)
                    })
                }),
                set: setter.map(|setter| -> Setter {
                    Rc::new(move |owner, value| {
                        let obj = owner
                            .as_object()
                            .ok_or_else(|| AccessError::mismatch("object", owner))?;
                        setter(obj, value)
                    })
                }),
            },
            MemberDescriptor::CollectionIndex { index, .. } => {
                let get: Getter = Rc::new(move |owner| {
                    let list = owner
                        .as_list()
                        .ok_or_else(|| AccessError::mismatch("list", owner))?;
                    list.get(index).ok_or(AccessError::IndexOutOfRange {
                        index,
                        len: list.len(),
                    })
                });
                let set: Setter = Rc::new(move |owner, value| {
                    let list = owner
                        .as_list()
                        .ok_or_else(|| AccessError::mismatch("list", owner))?;
                    if list.set(index, value) {
                        Ok(())
                    } else {
                        Err(AccessError::IndexOutOfRange {
                            index,
                            len: list.len(),
                        })
                    }
                });
                CompiledAccessor {
                    get: Some(get),
                    set: Some(set),
                }
            }
            MemberDescriptor::Computed { compute, .. } => CompiledAccessor {
                get: Some(Rc::new(move |owner| compute(owner))),
                set: None,
            },
        }
    }
}

impl AccessorCompiler for CachingAccessorCompiler {
    fn compile(&self, owner_type: TypeId, member: &MemberDescriptor) -> CompiledAccessor {
        if matches!(member, MemberDescriptor::CollectionIndex { .. }) {
            return Self::build(member);
        }

        let key = (owner_type, member.key());
        if let Some(compiled) = self.cache.borrow().get(&key) {
            return compiled.clone();
        }

        let compiled = Self::build(member);
        self.compilations.set(self.compilations.get() + 1);
        tracing::trace!("Compiled accessor for {} on {}", key.1, owner_type);
        self.cache.borrow_mut().insert(key, compiled.clone());
        compiled
    }
}
