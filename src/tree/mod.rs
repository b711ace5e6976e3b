//! The live inspection tree.
//!
//! - [`arena`]: node storage, structure, paths, visibility and persistence
//! - [`mapped`]: keyed reconciliation of group children
//! - [`update`] / [`async_update`]: synchronous and tick-spread refresh walks
//! - [`kinds`]: behaviors of the builtin node kinds

pub mod arena;
pub mod async_update;
pub mod behavior;
pub mod events;
pub mod id;
pub mod kinds;
pub mod mapped;
pub mod node;
pub mod update;

pub use arena::{InspectorContext, InspectorTree};
pub use async_update::{async_update, SharedTree};
pub use behavior::NodeBehavior;
pub use events::{ChannelObserver, NodeEvent, NodeObserver};
pub use id::NodeId;
pub use mapped::{reconcile_mapped, MappedChildren, MappedItem, ReconcileStats};
pub use node::{DisplayData, Node};
pub use update::{Precondition, UpdateOptions, DEFAULT_MAX_DEPTH};
