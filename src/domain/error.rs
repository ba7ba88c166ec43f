//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the tree model's invariants.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain object cannot be canonically addressed: {0}")]
    UnresolvableIdentity(String),

    #[error("cycle detected in hierarchy at tree item: {0}")]
    CyclicHierarchy(String),

    #[error("tree item is not reachable from root target {root}: {tree_item_id}")]
    UnreachableTarget { tree_item_id: String, root: String },

    #[error("unknown tree item: {0}")]
    UnknownTreeItem(String),

    #[error("unknown domain object: {0}")]
    UnknownObject(String),

    #[error("root target {object_id} is not a {expected}")]
    UnsupportedTarget { object_id: String, expected: String },

    #[error("editing context not found: {0}")]
    EditingContextNotFound(String),

    #[error("duplicate domain object id: {0}")]
    DuplicateObject(String),

    #[error("invalid document: {message}")]
    InvalidDocument { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
