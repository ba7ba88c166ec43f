//! I/O boundary traits for testability
//!
//! These traits abstract the filesystem and the collaborator's domain
//! graph, allowing services to be tested with in-memory implementations.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::{
    CanonicalPath, DomainNode, DomainResult, ExpansionSet, IdentityCodec, KIND_PROPERTY,
};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Canonicalize path (resolve symlinks, make absolute).
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Direct entries of a directory, sorted by file name.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Callback set over one kind of domain graph.
///
/// The tree pipeline never inspects domain types directly; everything it
/// knows about a node comes through these methods.
pub trait DomainModel: Send + Sync {
    /// Name of the model kind, e.g. "in-memory" or "filesystem".
    fn kind(&self) -> &str;

    fn contains_context(&self, editing_context_id: &str) -> bool;

    /// Root-level nodes shown for `target_object_id`.
    fn elements(&self, editing_context_id: &str, target_object_id: &str) -> DomainResult<Vec<DomainNode>>;

    /// Whether `node` is one of the root-level elements of `target_object_id`.
    fn is_element(&self, editing_context_id: &str, target_object_id: &str, node: &DomainNode) -> bool;

    fn has_children(&self, editing_context_id: &str, node: &DomainNode) -> bool;

    /// Children in display order. `expanded` is passed through for models
    /// that compute children differently for expanded ancestors.
    fn children_of(
        &self,
        editing_context_id: &str,
        node: &DomainNode,
        expanded: &ExpansionSet,
    ) -> DomainResult<Vec<DomainNode>>;

    fn parent_of(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<Option<DomainNode>>;

    /// Fails with `UnresolvableIdentity` when the node has no stable address.
    fn canonical_path(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<CanonicalPath>;

    fn codec(&self) -> IdentityCodec;

    fn tree_item_id(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<String> {
        let path = self.canonical_path(editing_context_id, node)?;
        Ok(self.codec().id_of(&path))
    }

    /// Reverse lookup of a tree-item id.
    fn object_for_tree_item(&self, editing_context_id: &str, tree_item_id: &str) -> Option<DomainNode>;

    /// Named property of a node; `label` is the display name by convention.
    fn property(&self, editing_context_id: &str, node: &DomainNode, name: &str) -> Option<String>;

    /// Kind of the object named `object_id`; `None` when there is no such object.
    fn kind_of(&self, editing_context_id: &str, object_id: &str) -> Option<String> {
        self.property(editing_context_id, &DomainNode::new(object_id, ""), KIND_PROPERTY)
    }
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            entries.push(entry.into_path());
        }
        Ok(entries)
    }
}
