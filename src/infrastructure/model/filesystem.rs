//! A directory on disk viewed as a domain graph
//!
//! Object ids are `/`-separated paths relative to the context's root
//! directory. Tree-item ids are cached as they are computed; an id missing
//! from the cache is resolved by walking the mounted directory.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::domain::{
    CanonicalPath, DomainError, DomainNode, DomainResult, ExpansionSet, IdentityCodec,
    KIND_PROPERTY, LABEL_PROPERTY,
};
use crate::infrastructure::traits::{DomainModel, FileSystem};

pub const DIRECTORY_KIND: &str = "Directory";
pub const FILE_KIND: &str = "File";
pub const PATH_PROPERTY: &str = "path";

pub struct FileSystemModel {
    fs: Arc<dyn FileSystem>,
    codec: IdentityCodec,
    /// editing context id -> canonical root directory
    roots: RwLock<HashMap<String, PathBuf>>,
    /// (editing context id, tree-item id) -> node; a cache, never authoritative
    seen: Mutex<HashMap<(String, String), DomainNode>>,
}

impl FileSystemModel {
    pub fn new(fs: Arc<dyn FileSystem>, codec: IdentityCodec) -> Self {
        Self {
            fs,
            codec,
            roots: RwLock::new(HashMap::new()),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Register `dir` as editing context `editing_context_id`.
    #[instrument(level = "debug", skip(self))]
    pub fn mount(&self, editing_context_id: &str, dir: &Path) -> DomainResult<()> {
        if !self.fs.is_dir(dir) {
            return Err(DomainError::UnknownObject(dir.display().to_string()));
        }
        let root = self
            .fs
            .canonicalize(dir)
            .map_err(|_| DomainError::UnresolvableIdentity(dir.display().to_string()))?;
        debug!("Mounted {} as '{}'", root.display(), editing_context_id);
        self.seen
            .lock()
            .retain(|(context, _), _| context != editing_context_id);
        self.roots
            .write()
            .insert(editing_context_id.to_string(), root);
        Ok(())
    }

    fn root(&self, editing_context_id: &str) -> DomainResult<PathBuf> {
        self.roots
            .read()
            .get(editing_context_id)
            .cloned()
            .ok_or_else(|| DomainError::EditingContextNotFound(editing_context_id.to_string()))
    }

    fn absolute(&self, editing_context_id: &str, object_id: &str) -> DomainResult<PathBuf> {
        let root = self.root(editing_context_id)?;
        if object_id.is_empty() {
            return Ok(root);
        }
        let relative = Path::new(object_id);
        // Only plain segments may address an object
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(DomainError::UnresolvableIdentity(object_id.to_string()));
        }
        Ok(root.join(relative))
    }

    fn node_for(&self, root: &Path, path: &Path) -> Option<DomainNode> {
        let relative = path.strip_prefix(root).ok()?;
        let object_id = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let kind = if self.fs.is_dir(path) {
            DIRECTORY_KIND
        } else {
            FILE_KIND
        };
        Some(DomainNode::new(object_id, kind))
    }

    fn list(&self, editing_context_id: &str, object_id: &str) -> DomainResult<Vec<DomainNode>> {
        let root = self.root(editing_context_id)?;
        let dir = self.absolute(editing_context_id, object_id)?;
        if !self.fs.exists(&dir) {
            return Err(DomainError::UnknownObject(object_id.to_string()));
        }
        if !self.fs.is_dir(&dir) {
            return Ok(Vec::new());
        }
        let entries = self.fs.list_dir(&dir).map_err(|e| {
            warn!("Cannot list {}: {}", dir.display(), e);
            DomainError::UnknownObject(object_id.to_string())
        })?;
        Ok(entries
            .iter()
            .filter_map(|entry| self.node_for(&root, entry))
            .collect())
    }

    /// Walk the mounted directory until an entry's id equals `tree_item_id`.
    ///
    /// Every id computed on the way lands in the cache.
    #[instrument(level = "debug", skip(self))]
    fn scan_for(&self, editing_context_id: &str, tree_item_id: &str) -> Option<DomainNode> {
        let mut visited = HashSet::new();
        let mut pending = vec![String::new()];
        while let Some(object_id) = pending.pop() {
            // Symlinked directories can lead back up the tree
            let dir = self.absolute(editing_context_id, &object_id).ok()?;
            if let Ok(real) = self.fs.canonicalize(&dir) {
                if !visited.insert(real) {
                    continue;
                }
            }
            let Ok(children) = self.list(editing_context_id, &object_id) else {
                continue;
            };
            for child in children {
                let Ok(id) = self.tree_item_id(editing_context_id, &child) else {
                    continue;
                };
                if id == tree_item_id {
                    return Some(child);
                }
                if child.kind == DIRECTORY_KIND {
                    pending.push(child.object_id);
                }
            }
        }
        debug!("No entry of '{}' has id {}", editing_context_id, tree_item_id);
        None
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.seen.lock().len()
    }
}

impl DomainModel for FileSystemModel {
    fn kind(&self) -> &str {
        "filesystem"
    }

    fn contains_context(&self, editing_context_id: &str) -> bool {
        self.roots.read().contains_key(editing_context_id)
    }

    fn elements(&self, editing_context_id: &str, target_object_id: &str) -> DomainResult<Vec<DomainNode>> {
        let target = if target_object_id == editing_context_id {
            ""
        } else {
            target_object_id
        };
        self.list(editing_context_id, target)
    }

    fn is_element(&self, editing_context_id: &str, target_object_id: &str, node: &DomainNode) -> bool {
        let target = if target_object_id == editing_context_id {
            ""
        } else {
            target_object_id
        };
        let parent = match node.object_id.rsplit_once('/') {
            Some((parent, _)) => parent,
            None => "",
        };
        parent == target
    }

    fn has_children(&self, editing_context_id: &str, node: &DomainNode) -> bool {
        node.kind == DIRECTORY_KIND
            && self
                .list(editing_context_id, &node.object_id)
                .map(|children| !children.is_empty())
                .unwrap_or(false)
    }

    fn children_of(
        &self,
        editing_context_id: &str,
        node: &DomainNode,
        _expanded: &ExpansionSet,
    ) -> DomainResult<Vec<DomainNode>> {
        self.list(editing_context_id, &node.object_id)
    }

    fn parent_of(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<Option<DomainNode>> {
        self.root(editing_context_id)?;
        Ok(node
            .object_id
            .rsplit_once('/')
            .map(|(parent, _)| DomainNode::new(parent, DIRECTORY_KIND)))
    }

    fn canonical_path(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<CanonicalPath> {
        self.absolute(editing_context_id, &node.object_id)?;
        if node.object_id.is_empty() {
            return Err(DomainError::UnresolvableIdentity(node.object_id.clone()));
        }
        let mut path = CanonicalPath::from_segments([editing_context_id]);
        for segment in node.object_id.split('/') {
            path.push(segment);
        }
        Ok(path)
    }

    fn codec(&self) -> IdentityCodec {
        self.codec
    }

    fn tree_item_id(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<String> {
        let id = self.codec.id_of(&self.canonical_path(editing_context_id, node)?);
        self.seen
            .lock()
            .insert((editing_context_id.to_string(), id.clone()), node.clone());
        Ok(id)
    }

    fn object_for_tree_item(&self, editing_context_id: &str, tree_item_id: &str) -> Option<DomainNode> {
        if !self.contains_context(editing_context_id) {
            return None;
        }
        let key = (editing_context_id.to_string(), tree_item_id.to_string());
        let cached = self.seen.lock().get(&key).cloned();
        let Some(node) = cached else {
            return self.scan_for(editing_context_id, tree_item_id);
        };

        let path = self.absolute(editing_context_id, &node.object_id).ok()?;
        if self.fs.exists(&path) {
            return Some(node);
        }
        // The id is derived from the path, so a vanished file has no object
        debug!("Dropping stale item {} for {}", tree_item_id, node);
        self.seen.lock().remove(&key);
        None
    }

    fn property(&self, editing_context_id: &str, node: &DomainNode, name: &str) -> Option<String> {
        match name {
            LABEL_PROPERTY => node
                .object_id
                .rsplit('/')
                .next()
                .map(str::to_string),
            KIND_PROPERTY => Some(node.kind.clone()),
            PATH_PROPERTY => self
                .absolute(editing_context_id, &node.object_id)
                .ok()
                .map(|p| p.display().to_string()),
            _ => None,
        }
    }

    fn kind_of(&self, editing_context_id: &str, object_id: &str) -> Option<String> {
        let path = self.absolute(editing_context_id, object_id).ok()?;
        if !self.fs.exists(&path) {
            return None;
        }
        let kind = if self.fs.is_dir(&path) {
            DIRECTORY_KIND
        } else {
            FILE_KIND
        };
        Some(kind.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::infrastructure::traits::RealFileSystem;

    fn mounted(dir: &Path) -> FileSystemModel {
        let model = FileSystemModel::new(Arc::new(RealFileSystem), IdentityCodec::default());
        model.mount("root", dir).unwrap();
        model
    }

    fn sample() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/leaf.txt"), "leaf").unwrap();
        fs::write(temp.path().join("top.txt"), "top").unwrap();
        temp
    }

    #[test]
    fn test_uncached_id_found_by_walking_directory() {
        let temp = sample();
        let leaf = DomainNode::new("a/b/leaf.txt", FILE_KIND);
        let id = mounted(temp.path()).tree_item_id("root", &leaf).unwrap();

        let fresh = mounted(temp.path());
        assert_eq!(fresh.cached(), 0);

        assert_eq!(fresh.object_for_tree_item("root", &id), Some(leaf));
        assert!(fresh.cached() > 0);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let temp = sample();
        let model = mounted(temp.path());

        assert_eq!(model.object_for_tree_item("root", "no-such-id"), None);
        assert_eq!(model.object_for_tree_item("missing", "no-such-id"), None);
    }

    #[test]
    fn test_stale_entry_dropped_from_cache() {
        let temp = sample();
        let model = mounted(temp.path());
        let top = DomainNode::new("top.txt", FILE_KIND);
        let id = model.tree_item_id("root", &top).unwrap();
        assert_eq!(model.cached(), 1);

        fs::remove_file(temp.path().join("top.txt")).unwrap();

        assert_eq!(model.object_for_tree_item("root", &id), None);
        assert_eq!(model.cached(), 0);
    }

    #[test]
    fn test_remount_clears_cached_ids() {
        let temp = sample();
        let model = mounted(temp.path());
        model
            .tree_item_id("root", &DomainNode::new("top.txt", FILE_KIND))
            .unwrap();
        model
            .tree_item_id("root", &DomainNode::new("a", DIRECTORY_KIND))
            .unwrap();
        assert_eq!(model.cached(), 2);

        model.mount("root", temp.path()).unwrap();

        assert_eq!(model.cached(), 0);
    }
}
