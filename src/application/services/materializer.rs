//! Tree materialization: description + root + expansion set => bounded snapshot

use tracing::{debug, instrument, trace, warn};

use crate::application::description::TreeDescription;
use crate::application::ApplicationResult;
use crate::domain::{DomainError, DomainNode, ExpansionSet, ItemError, Tree, TreeItem};

/// Builds `Tree` snapshots. Only items whose ids are in the expansion set
/// have their children computed.
pub struct TreeMaterializer<'a> {
    description: &'a TreeDescription,
    editing_context_id: &'a str,
    expanded: &'a ExpansionSet,
    /// Ids on the current recursion path
    stack: Vec<String>,
}

impl<'a> TreeMaterializer<'a> {
    pub fn new(
        description: &'a TreeDescription,
        editing_context_id: &'a str,
        expanded: &'a ExpansionSet,
    ) -> Self {
        Self {
            description,
            editing_context_id,
            expanded,
            stack: Vec::new(),
        }
    }

    /// Materialize the tree rooted at `root_target_object_id`.
    ///
    /// A missing editing context or an unknown root target fails the whole
    /// materialization; anything below the root degrades per item.
    #[instrument(level = "debug", skip(self), fields(description = self.description.name()))]
    pub fn materialize(mut self, root_target_object_id: &str) -> ApplicationResult<Tree> {
        let model = self.description.model();
        if !model.contains_context(self.editing_context_id) {
            return Err(DomainError::EditingContextNotFound(self.editing_context_id.to_string()).into());
        }
        self.description
            .check_target(self.editing_context_id, root_target_object_id)?;

        let elements = model.elements(self.editing_context_id, root_target_object_id)?;
        let children: Vec<TreeItem> = elements
            .iter()
            .filter_map(|node| self.render(node))
            .collect();

        debug!(
            "Materialized {} root items for '{}' ({} expanded)",
            children.len(),
            root_target_object_id,
            self.expanded.len()
        );
        Ok(Tree::new(
            self.description.id(),
            root_target_object_id,
            self.description.capabilities(),
            children,
        ))
    }

    fn render(&mut self, node: &DomainNode) -> Option<TreeItem> {
        let ctx = self.editing_context_id;
        let description = self.description;
        let model = description.model();

        if !description.accepts(ctx, node) {
            trace!("Skipping {}: precondition", node);
            return None;
        }

        let id = match model.tree_item_id(ctx, node) {
            Ok(id) => id,
            Err(DomainError::UnresolvableIdentity(_)) => {
                debug!("Skipping {}: no canonical path", node);
                return None;
            }
            Err(e) => {
                warn!("Skipping {}: {}", node, e);
                return None;
            }
        };

        let flags = description.flags_for(ctx, node);
        let mut item = TreeItem {
            id,
            object_id: node.object_id.clone(),
            kind: node.kind.clone(),
            label: description.label_for(ctx, node),
            icon_urls: description.icons_for(ctx, node),
            editable: flags.editable,
            deletable: flags.deletable,
            selectable: flags.selectable,
            has_children: false,
            expanded: false,
            children: Vec::new(),
            error: None,
        };

        if self.stack.contains(&item.id) {
            warn!("Cycle at {}: item already on the current path", node);
            item.error = Some(ItemError::CyclicHierarchy);
            return Some(item);
        }

        item.has_children = model.has_children(ctx, node);
        if !(item.has_children && self.expanded.contains(&item.id)) {
            return Some(item);
        }

        item.expanded = true;
        match model.children_of(ctx, node, self.expanded) {
            Ok(children) => {
                self.stack.push(item.id.clone());
                item.children = children
                    .iter()
                    .filter_map(|child| self.render(child))
                    .collect();
                self.stack.pop();
            }
            Err(e) => warn!("Children of {} unavailable: {}", node, e),
        }
        Some(item)
    }
}

/// Convenience wrapper over `TreeMaterializer`.
pub fn materialize(
    description: &TreeDescription,
    root_target_object_id: &str,
    expanded: &ExpansionSet,
    editing_context_id: &str,
) -> ApplicationResult<Tree> {
    TreeMaterializer::new(description, editing_context_id, expanded).materialize(root_target_object_id)
}
