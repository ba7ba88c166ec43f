//! Arena-backed domain object graph.
//!
//! Objects live in a generational arena and link to each other by index, so
//! removing a subtree invalidates stale handles instead of dangling.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::DomainNode;
use crate::domain::error::{DomainError, DomainResult};

/// Data payload of one domain object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    /// Unique within the graph
    pub object_id: String,
    pub kind: String,
    /// Display name, used by the `label` property
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl ObjectData {
    pub fn new(object_id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            kind: kind.into(),
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn node(&self) -> DomainNode {
        DomainNode::new(&self.object_id, &self.kind)
    }
}

impl fmt::Display for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.kind)
    }
}

/// Object node in the arena-based graph.
#[derive(Debug)]
pub struct ObjectNode {
    pub data: ObjectData,
    /// None for top-level objects
    pub parent: Option<Index>,
    pub children: Vec<Index>,
}

/// Forest of domain objects with an object-id index.
#[derive(Debug, Default)]
pub struct DomainGraph {
    arena: Arena<ObjectNode>,
    roots: Vec<Index>,
    by_object_id: HashMap<String, Index>,
}

impl DomainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_object(&mut self, data: ObjectData, parent: Option<Index>) -> DomainResult<Index> {
        if self.by_object_id.contains_key(&data.object_id) {
            return Err(DomainError::DuplicateObject(data.object_id));
        }
        if let Some(parent_idx) = parent {
            if !self.arena.contains(parent_idx) {
                return Err(DomainError::UnknownObject(format!("{parent_idx:?}")));
            }
        }

        let object_id = data.object_id.clone();
        let node_idx = self.arena.insert(ObjectNode {
            data,
            parent,
            children: Vec::new(),
        });

        match parent.and_then(|parent_idx| self.arena.get_mut(parent_idx)) {
            Some(parent) => parent.children.push(node_idx),
            None => self.roots.push(node_idx),
        }
        self.by_object_id.insert(object_id, node_idx);

        Ok(node_idx)
    }

    /// Link an existing object under another one as an additional child.
    ///
    /// Parent links stay untouched, so this can produce a child hierarchy
    /// that loops back on itself.
    pub fn add_child_link(&mut self, parent_object_id: &str, child_object_id: &str) -> DomainResult<()> {
        let parent_idx = self.index_of(parent_object_id)?;
        let child_idx = self.index_of(child_object_id)?;
        if let Some(parent) = self.arena.get_mut(parent_idx) {
            parent.children.push(child_idx);
        }
        Ok(())
    }

    pub fn get(&self, idx: Index) -> Option<&ObjectNode> {
        self.arena.get(idx)
    }

    pub fn get_by_object_id(&self, object_id: &str) -> Option<&ObjectNode> {
        self.by_object_id
            .get(object_id)
            .and_then(|&idx| self.arena.get(idx))
    }

    pub fn index_of(&self, object_id: &str) -> DomainResult<Index> {
        self.by_object_id
            .get(object_id)
            .copied()
            .ok_or_else(|| DomainError::UnknownObject(object_id.to_string()))
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.by_object_id.contains_key(object_id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ObjectNode> {
        self.roots.iter().filter_map(|&idx| self.arena.get(idx))
    }

    pub fn children(&self, object_id: &str) -> DomainResult<Vec<&ObjectNode>> {
        let node = self.get(self.index_of(object_id)?);
        Ok(node
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|&idx| self.arena.get(idx))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn parent(&self, object_id: &str) -> DomainResult<Option<&ObjectNode>> {
        let node = self.get(self.index_of(object_id)?);
        Ok(node
            .and_then(|node| node.parent)
            .and_then(|idx| self.arena.get(idx)))
    }

    /// Object ids from the top-level ancestor down to, excluding, `object_id`.
    pub fn ancestors(&self, object_id: &str) -> DomainResult<Vec<String>> {
        let mut chain = Vec::new();
        let mut current = self.get(self.index_of(object_id)?).and_then(|n| n.parent);
        while let Some(idx) = current {
            let Some(node) = self.arena.get(idx) else {
                break;
            };
            if chain.len() > self.arena.len() {
                return Err(DomainError::CyclicHierarchy(object_id.to_string()));
            }
            chain.push(node.data.object_id.clone());
            current = node.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn rename(&mut self, object_id: &str, name: &str) -> DomainResult<()> {
        let idx = self.index_of(object_id)?;
        if let Some(node) = self.arena.get_mut(idx) {
            node.data.name = name.to_string();
        }
        Ok(())
    }

    pub fn set_property(&mut self, object_id: &str, key: &str, value: &str) -> DomainResult<()> {
        let idx = self.index_of(object_id)?;
        if let Some(node) = self.arena.get_mut(idx) {
            node.data.properties.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Remove an object with all its descendants. Returns the removed payloads,
    /// children before parents.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_subtree(&mut self, object_id: &str) -> DomainResult<Vec<ObjectData>> {
        let idx = self.index_of(object_id)?;
        let doomed: Vec<Index> = self.iter_postorder_from(idx).map(|(i, _)| i).collect();

        match self.arena.get(idx).and_then(|n| n.parent) {
            Some(parent_idx) => {
                if let Some(parent) = self.arena.get_mut(parent_idx) {
                    parent.children.retain(|&child| child != idx);
                }
            }
            None => self.roots.retain(|&root| root != idx),
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for doomed_idx in doomed {
            if let Some(node) = self.arena.remove(doomed_idx) {
                self.by_object_id.remove(&node.data.object_id);
                removed.push(node.data);
            }
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order walk over every top-level object and its descendants.
    pub fn iter(&self) -> GraphIterator<'_> {
        GraphIterator::new(self, self.roots.iter().rev().copied().collect())
    }

    fn iter_postorder_from(&self, start: Index) -> PostOrderIterator<'_> {
        PostOrderIterator {
            graph: self,
            stack: vec![(start, false)],
            seen: Vec::new(),
        }
    }
}

pub struct GraphIterator<'a> {
    graph: &'a DomainGraph,
    stack: Vec<Index>,
    seen: Vec<Index>,
}

impl<'a> GraphIterator<'a> {
    fn new(graph: &'a DomainGraph, stack: Vec<Index>) -> Self {
        Self {
            graph,
            stack,
            seen: Vec::new(),
        }
    }
}

impl<'a> Iterator for GraphIterator<'a> {
    type Item = (Index, &'a ObjectNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if self.seen.contains(&current_idx) {
                continue;
            }
            if let Some(node) = self.graph.get(current_idx) {
                self.seen.push(current_idx);
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev().copied());
                return Some((current_idx, node));
            }
        }
        None
    }
}

struct PostOrderIterator<'a> {
    graph: &'a DomainGraph,
    stack: Vec<(Index, bool)>,
    seen: Vec<Index>,
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a ObjectNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            let Some(node) = self.graph.get(current_idx) else {
                continue;
            };
            if visited {
                return Some((current_idx, node));
            }
            if self.seen.contains(&current_idx) {
                continue;
            }
            self.seen.push(current_idx);
            self.stack.push((current_idx, true));
            for &child in node.children.iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}
