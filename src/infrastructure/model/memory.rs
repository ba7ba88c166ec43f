//! In-memory domain model over arena graphs, one per editing context

use std::collections::HashMap;

use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::domain::{
    BuiltDocument, CanonicalPath, ChangeNotification, DomainError, DomainGraph, DomainNode,
    DomainResult, EditingContext, ExpansionSet, IdentityCodec, ObjectData, KIND_PROPERTY,
    LABEL_PROPERTY,
};
use crate::infrastructure::feed::ChangeFeed;
use crate::infrastructure::traits::DomainModel;

#[derive(Debug, Default)]
struct ContextGraph {
    graph: DomainGraph,
    /// tree-item id -> object id
    item_index: HashMap<String, String>,
}

impl ContextGraph {
    fn new(editing_context_id: &str, graph: DomainGraph, codec: IdentityCodec) -> Self {
        let mut context = Self {
            graph,
            item_index: HashMap::new(),
        };
        context.reindex(editing_context_id, codec);
        context
    }

    fn reindex(&mut self, editing_context_id: &str, codec: IdentityCodec) {
        let mut index = HashMap::with_capacity(self.graph.len());
        for (_, node) in self.graph.iter() {
            if let Ok(path) = canonical_path_in(&self.graph, editing_context_id, &node.data.object_id) {
                index.insert(codec.id_of(&path), node.data.object_id.clone());
            }
        }
        self.item_index = index;
    }

    /// Context root plus `object_id` and its ancestors.
    fn affected_by(&self, editing_context_id: &str, object_id: &str) -> Vec<String> {
        let mut affected = vec![editing_context_id.to_string()];
        affected.extend(self.graph.ancestors(object_id).unwrap_or_default());
        affected.push(object_id.to_string());
        affected
    }

    fn all_roots(&self, editing_context_id: &str) -> Vec<String> {
        std::iter::once(editing_context_id.to_string())
            .chain(self.graph.iter().map(|(_, n)| n.data.object_id.clone()))
            .collect()
    }
}

fn canonical_path_in(graph: &DomainGraph, editing_context_id: &str, object_id: &str) -> DomainResult<CanonicalPath> {
    let ancestors = graph
        .ancestors(object_id)
        .map_err(|_| DomainError::UnresolvableIdentity(object_id.to_string()))?;
    let mut path = CanonicalPath::from_segments([editing_context_id]);
    for ancestor in ancestors {
        path.push(ancestor);
    }
    path.push(object_id);
    Ok(path)
}

fn is_context_root(editing_context_id: &str, target_object_id: &str) -> bool {
    target_object_id.is_empty() || target_object_id == editing_context_id
}

/// Editing contexts held in memory; every mutation publishes a change notification.
pub struct InMemoryModel {
    codec: IdentityCodec,
    feed: ChangeFeed,
    contexts: RwLock<HashMap<String, ContextGraph>>,
}

impl InMemoryModel {
    pub fn new(codec: IdentityCodec, feed: ChangeFeed) -> Self {
        Self {
            codec,
            feed,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Loaded editing contexts, sorted by id.
    pub fn editing_contexts(&self) -> Vec<EditingContext> {
        self.contexts
            .read()
            .keys()
            .sorted()
            .map(EditingContext::new)
            .collect()
    }

    /// Install or replace a whole editing context.
    #[instrument(level = "debug", skip(self, document), fields(ctx = %document.editing_context))]
    pub fn load(&self, document: BuiltDocument) {
        self.load_graph(&document.editing_context, document.graph);
    }

    pub fn load_graph(&self, editing_context_id: &str, graph: DomainGraph) {
        let context = ContextGraph::new(editing_context_id, graph, self.codec);
        let mut affected = context.all_roots(editing_context_id);
        let previous = self
            .contexts
            .write()
            .insert(editing_context_id.to_string(), context);
        if let Some(previous) = previous {
            affected.extend(previous.all_roots(editing_context_id));
        }
        debug!("Loaded editing context '{}'", editing_context_id);
        self.feed
            .publish(ChangeNotification::new(editing_context_id, affected));
    }

    /// Insert an object under `parent_object_id`, or at top level.
    pub fn insert(
        &self,
        editing_context_id: &str,
        parent_object_id: Option<&str>,
        data: ObjectData,
    ) -> DomainResult<()> {
        let affected = self.mutate(editing_context_id, |context| {
            let parent = parent_object_id
                .map(|id| context.graph.index_of(id))
                .transpose()?;
            let object_id = data.object_id.clone();
            context.graph.insert_object(data, parent)?;
            Ok(context.affected_by(editing_context_id, &object_id))
        })?;
        self.publish(editing_context_id, affected);
        Ok(())
    }

    pub fn remove(&self, editing_context_id: &str, object_id: &str) -> DomainResult<()> {
        let affected = self.mutate(editing_context_id, |context| {
            let mut affected = context.affected_by(editing_context_id, object_id);
            let removed = context.graph.remove_subtree(object_id)?;
            affected.extend(removed.into_iter().map(|data| data.object_id));
            Ok(affected)
        })?;
        self.publish(editing_context_id, affected);
        Ok(())
    }

    pub fn rename(&self, editing_context_id: &str, object_id: &str, name: &str) -> DomainResult<()> {
        let affected = self.mutate(editing_context_id, |context| {
            context.graph.rename(object_id, name)?;
            Ok(context.affected_by(editing_context_id, object_id))
        })?;
        self.publish(editing_context_id, affected);
        Ok(())
    }

    pub fn set_property(
        &self,
        editing_context_id: &str,
        object_id: &str,
        key: &str,
        value: &str,
    ) -> DomainResult<()> {
        let affected = self.mutate(editing_context_id, |context| {
            context.graph.set_property(object_id, key, value)?;
            Ok(context.affected_by(editing_context_id, object_id))
        })?;
        self.publish(editing_context_id, affected);
        Ok(())
    }

    /// Add an extra child link; used to model malformed hierarchies.
    pub fn link_child(
        &self,
        editing_context_id: &str,
        parent_object_id: &str,
        child_object_id: &str,
    ) -> DomainResult<()> {
        let affected = self.mutate(editing_context_id, |context| {
            context.graph.add_child_link(parent_object_id, child_object_id)?;
            Ok(context.affected_by(editing_context_id, parent_object_id))
        })?;
        self.publish(editing_context_id, affected);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn drop_context(&self, editing_context_id: &str) -> DomainResult<()> {
        let removed = self
            .contexts
            .write()
            .remove(editing_context_id)
            .ok_or_else(|| DomainError::EditingContextNotFound(editing_context_id.to_string()))?;
        self.publish(editing_context_id, removed.all_roots(editing_context_id));
        Ok(())
    }

    fn mutate<F>(&self, editing_context_id: &str, change: F) -> DomainResult<Vec<String>>
    where
        F: FnOnce(&mut ContextGraph) -> DomainResult<Vec<String>>,
    {
        let mut contexts = self.contexts.write();
        let context = contexts
            .get_mut(editing_context_id)
            .ok_or_else(|| DomainError::EditingContextNotFound(editing_context_id.to_string()))?;
        let affected = change(context)?;
        context.reindex(editing_context_id, self.codec);
        Ok(affected)
    }

    fn publish(&self, editing_context_id: &str, affected: Vec<String>) {
        self.feed
            .publish(ChangeNotification::new(editing_context_id, affected));
    }

    fn with_context<T>(
        &self,
        editing_context_id: &str,
        read: impl FnOnce(&ContextGraph) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let contexts = self.contexts.read();
        let context = contexts
            .get(editing_context_id)
            .ok_or_else(|| DomainError::EditingContextNotFound(editing_context_id.to_string()))?;
        read(context)
    }
}

impl DomainModel for InMemoryModel {
    fn kind(&self) -> &str {
        "in-memory"
    }

    fn contains_context(&self, editing_context_id: &str) -> bool {
        self.contexts.read().contains_key(editing_context_id)
    }

    fn elements(&self, editing_context_id: &str, target_object_id: &str) -> DomainResult<Vec<DomainNode>> {
        self.with_context(editing_context_id, |context| {
            if is_context_root(editing_context_id, target_object_id) {
                return Ok(context.graph.roots().map(|n| n.data.node()).collect());
            }
            Ok(context
                .graph
                .children(target_object_id)?
                .into_iter()
                .map(|n| n.data.node())
                .collect())
        })
    }

    fn is_element(&self, editing_context_id: &str, target_object_id: &str, node: &DomainNode) -> bool {
        self.with_context(editing_context_id, |context| {
            let parent = context.graph.parent(&node.object_id)?;
            Ok(match parent {
                Some(parent) => parent.data.object_id == target_object_id,
                None => is_context_root(editing_context_id, target_object_id),
            })
        })
        .unwrap_or(false)
    }

    fn has_children(&self, editing_context_id: &str, node: &DomainNode) -> bool {
        self.with_context(editing_context_id, |context| {
            Ok(!context.graph.children(&node.object_id)?.is_empty())
        })
        .unwrap_or(false)
    }

    fn children_of(
        &self,
        editing_context_id: &str,
        node: &DomainNode,
        _expanded: &ExpansionSet,
    ) -> DomainResult<Vec<DomainNode>> {
        self.with_context(editing_context_id, |context| {
            Ok(context
                .graph
                .children(&node.object_id)?
                .into_iter()
                .map(|n| n.data.node())
                .collect())
        })
    }

    fn parent_of(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<Option<DomainNode>> {
        self.with_context(editing_context_id, |context| {
            Ok(context
                .graph
                .parent(&node.object_id)?
                .map(|parent| parent.data.node()))
        })
    }

    fn canonical_path(&self, editing_context_id: &str, node: &DomainNode) -> DomainResult<CanonicalPath> {
        self.with_context(editing_context_id, |context| {
            canonical_path_in(&context.graph, editing_context_id, &node.object_id)
        })
    }

    fn codec(&self) -> IdentityCodec {
        self.codec
    }

    fn object_for_tree_item(&self, editing_context_id: &str, tree_item_id: &str) -> Option<DomainNode> {
        let contexts = self.contexts.read();
        let context = contexts.get(editing_context_id)?;
        let object_id = context.item_index.get(tree_item_id)?;
        context
            .graph
            .get_by_object_id(object_id)
            .map(|n| n.data.node())
    }

    fn property(&self, editing_context_id: &str, node: &DomainNode, name: &str) -> Option<String> {
        let contexts = self.contexts.read();
        let object = contexts
            .get(editing_context_id)?
            .graph
            .get_by_object_id(&node.object_id)?;
        match name {
            LABEL_PROPERTY => Some(object.data.name.clone()),
            KIND_PROPERTY => Some(object.data.kind.clone()),
            _ => object.data.properties.get(name).cloned(),
        }
    }
}
