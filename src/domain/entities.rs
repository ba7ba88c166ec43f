//! Domain entities: handles into the collaborator's object graph

use std::fmt;

/// Property holding a node's display name.
pub const LABEL_PROPERTY: &str = "label";
pub const KIND_PROPERTY: &str = "kind";

/// Opaque handle into a collaborator's object graph.
///
/// Only the adapter that produced it knows how to follow it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainNode {
    /// Collaborator-side object id, unique within an editing context
    pub object_id: String,
    /// Domain type, e.g. "Resource", "Entity", "Directory"
    pub kind: String,
}

impl DomainNode {
    pub fn new(object_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for DomainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.object_id)
    }
}

/// Names the graph instance a request operates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditingContext {
    pub id: String,
}

impl EditingContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Event of the external change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub editing_context_id: String,
    /// Root target objects whose views may show the change
    pub affected_root_ids: Vec<String>,
}

impl ChangeNotification {
    pub fn new(editing_context_id: impl Into<String>, affected_root_ids: Vec<String>) -> Self {
        Self {
            editing_context_id: editing_context_id.into(),
            affected_root_ids,
        }
    }

    /// Whether a view of `root_target_object_id` in `editing_context_id` must refresh.
    ///
    /// An empty root target names the editing context itself.
    pub fn affects(&self, editing_context_id: &str, root_target_object_id: &str) -> bool {
        let root = if root_target_object_id.is_empty() {
            editing_context_id
        } else {
            root_target_object_id
        };
        self.editing_context_id == editing_context_id
            && self.affected_root_ids.iter().any(|id| id == root)
    }
}

/// Editability flags of one tree item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFlags {
    pub editable: bool,
    pub deletable: bool,
    pub selectable: bool,
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self {
            editable: true,
            deletable: true,
            selectable: true,
        }
    }
}
