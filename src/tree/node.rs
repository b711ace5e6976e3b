//! Node storage.

use crate::binding::ValueBinding;
use crate::reflect::Value;
use crate::scheduler::Routine;
use crate::selection::NodeKindId;
use crate::tree::id::NodeId;
use crate::tree::mapped::MappedChildren;
use std::cell::RefCell;

/// What a node currently shows next to its name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayData {
    pub value_text: String,
    pub type_name: String,
    /// Text of the last failed read, shown instead of the value
    pub error: Option<String>,
}

/// One item of the inspection tree.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKindId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) depth: usize,
    pub(crate) root: NodeId,
    pub(crate) self_visible: bool,
    pub(crate) children_visible: bool,
    /// Cached dotted path; None when dirty
    pub(crate) path: RefCell<Option<String>>,
    pub(crate) binding: Option<ValueBinding>,
    pub(crate) mapped: Option<MappedChildren>,
    /// Value the node shows (leaf) or lists (group)
    pub(crate) subject: Value,
    pub(crate) display: DisplayData,
    pub(crate) enumerating: u32,
    pub(crate) pending: Vec<NodeId>,
    pub(crate) async_routine: Option<Routine>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKindId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            parent: None,
            children: Vec::new(),
            depth: 0,
            root: id,
            self_visible: true,
            children_visible: false,
            path: RefCell::new(None),
            binding: None,
            mapped: None,
            subject: Value::Null,
            display: DisplayData::default(),
            enumerating: 0,
            pending: Vec::new(),
            async_routine: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKindId {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Distance from the root (0 for roots).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Stored flag, ignoring group transparency.
    pub fn stored_self_visible(&self) -> bool {
        self.self_visible
    }

    /// Stored flag, ignoring group transparency.
    pub fn stored_children_visible(&self) -> bool {
        self.children_visible
    }

    pub fn binding(&self) -> Option<&ValueBinding> {
        self.binding.as_ref()
    }

    pub fn subject(&self) -> &Value {
        &self.subject
    }

    pub fn display(&self) -> &DisplayData {
        &self.display
    }

    pub fn is_enumerating(&self) -> bool {
        self.enumerating > 0
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn async_routine(&self) -> Option<&Routine> {
        self.async_routine.as_ref()
    }

    pub fn is_mapped_group(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn mapped(&self) -> Option<&MappedChildren> {
        self.mapped.as_ref()
    }

    pub(crate) fn is_path_dirty(&self) -> bool {
        self.path.borrow().is_none()
    }
}
