//! Reflective object model of the inspected runtime.
//!
//! The inspector never touches host objects directly. Everything it shows is
//! described by a [`TypeTable`] (types, supertypes, members), carried as
//! [`Value`]s, and read or written through accessors produced by an
//! [`AccessorCompiler`].

pub mod accessor;
pub mod member;
pub mod type_table;
pub mod value;

pub use accessor::{AccessError, AccessorCompiler, CachingAccessorCompiler, CompiledAccessor};
pub use member::{MemberDescriptor, MemberKey};
pub use type_table::{TypeBuilder, TypeDef, TypeId, TypeKind, TypeTable};
pub use value::{ListRef, ObjectRef, Value};
