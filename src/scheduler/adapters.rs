//! Adapters from foreign suspension values to awaitables.
//!
//! Adapters are keyed by the foreign value's type and looked up along its
//! supertype chain, so one adapter registered for a base type serves every
//! derived type. A thread-local registry is used unless a scheduler was given
//! its own.

use crate::error::{InspectError, Result};
use crate::reflect::{TypeId, TypeTable};
use crate::scheduler::awaitable::Awaitable;
use crate::scheduler::routine::Foreign;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type Adapter = Rc<dyn Fn(Foreign) -> Result<Box<dyn Awaitable>>>;

thread_local! {
    static GLOBAL: RefCell<AwaitableAdapters> = RefCell::new(AwaitableAdapters::default());
}

#[derive(Default, Clone)]
pub struct AwaitableAdapters {
    adapters: HashMap<TypeId, Adapter>,
}

impl std::fmt::Debug for AwaitableAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwaitableAdapters")
            .field("types", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AwaitableAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        type_id: TypeId,
        adapter: impl Fn(Foreign) -> Result<Box<dyn Awaitable>> + 'static,
    ) {
        self.adapters.insert(type_id, Rc::new(adapter));
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapter for `type_id` or its nearest supertype.
    pub fn resolve(&self, types: &TypeTable, type_id: TypeId) -> Option<Adapter> {
        if let Some(adapter) = self.adapters.get(&type_id) {
            return Some(adapter.clone());
        }
        types
            .supertypes(type_id)
            .into_iter()
            .find_map(|t| self.adapters.get(&t).cloned())
    }

    /// Convert a foreign value, failing with `UnsupportedAwaitable` when no
    /// adapter matches.
    pub fn adapt(&self, types: &TypeTable, foreign: Foreign) -> Result<Box<dyn Awaitable>> {
        match self.resolve(types, foreign.type_id) {
            Some(adapter) => adapter(foreign),
            None => Err(unsupported(types, foreign.type_id)),
        }
    }
}

pub(crate) fn unsupported(types: &TypeTable, type_id: TypeId) -> InspectError {
    InspectError::UnsupportedAwaitable(format!(
        "no adapter for '{}' or any of its supertypes",
        types.name(type_id)
    ))
}

/// Install the thread-local registry, replacing whatever was registered.
pub fn init_global(adapters: AwaitableAdapters) {
    GLOBAL.with(|g| *g.borrow_mut() = adapters);
}

/// Register an adapter in the thread-local registry.
pub fn register_global(
    type_id: TypeId,
    adapter: impl Fn(Foreign) -> Result<Box<dyn Awaitable>> + 'static,
) {
    GLOBAL.with(|g| g.borrow_mut().register(type_id, adapter));
}

/// Drop every globally registered adapter.
pub fn reset_global() {
    GLOBAL.with(|g| *g.borrow_mut() = AwaitableAdapters::default());
}

pub fn resolve_global(types: &TypeTable, type_id: TypeId) -> Option<Adapter> {
    GLOBAL.with(|g| g.borrow().resolve(types, type_id))
}
