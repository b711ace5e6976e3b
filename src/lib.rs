//! # inspector-rs: live reflective inspector engine
//!
//! Mirrors a runtime object graph as a navigable tree that is continuously
//! reconciled against the live values, while isolating the traversal from
//! faults raised by the inspected objects.
//!
//! ## Architecture
//!
//! - **reflect**: type table, values, member descriptors and compiled accessors
//! - **binding**: fault-isolated reads and writes with diagnostic capture
//! - **selection**: picks the most specific node kind for a value in a slot
//! - **tree**: node arena, paths, visibility, reconciliation, sync/async refresh
//! - **scheduler**: cooperative single-threaded routines driven by host ticks
//! - **state**: persisted per-path node visibility
//! - **render**: renderer and search-filter contracts, plus a text renderer
//!
//! ## Example
//!
//! ```ignore
//! use inspector_rs::{
//!     reflect::{ObjectRef, TypeTable, Value},
//!     render::{draw_tree, TextRenderer},
//!     tree::{InspectorContext, InspectorTree, UpdateOptions},
//! };
//!
//! let mut types = TypeTable::new();
//! let player = types.define_class("Player", None).field("health", TypeTable::INT).id();
//! let obj = ObjectRef::new(player).with_field("health", 100i64);
//!
//! let mut tree = InspectorTree::new(InspectorContext::new(types));
//! let root = tree.create_root_for("Player", Value::Object(obj), player)?;
//! tree.update(root, &UpdateOptions::default())?;
//!
//! let mut renderer = TextRenderer::new();
//! draw_tree(&mut tree, &mut renderer, root)?;
//! print!("{}", renderer.output());
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod logging;
pub mod reflect;
pub mod render;
pub mod scheduler;
pub mod selection;
pub mod state;
pub mod tree;

// Re-export commonly used types
pub use binding::{AccessOptions, AccessOutcome, ValueBinding};
pub use config::InspectorConfig;
pub use error::{InspectError, Result, ResultExt};
pub use reflect::{TypeTable, Value};
pub use scheduler::{Routine, Scheduler, Step};
pub use selection::{NodeKindId, NodeRegistry};
pub use state::{NodeState, NodeStateStore, StateStore};
pub use tree::{InspectorContext, InspectorTree, NodeId, UpdateOptions};
