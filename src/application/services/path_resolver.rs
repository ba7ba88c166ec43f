//! Ancestor path resolution ("expand to") and subtree expansion ("expand all")

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::application::description::TreeDescription;
use crate::application::ApplicationResult;
use crate::domain::{DomainError, DomainNode, ExpansionSet};

/// Ancestor ids, root-first, that must be expanded to reveal `target_tree_item_id`.
///
/// The target's own id is not part of the result. Cost is proportional to
/// the target's depth.
#[instrument(level = "debug", skip(description))]
pub fn path_to(
    description: &TreeDescription,
    root_target_object_id: &str,
    target_tree_item_id: &str,
    editing_context_id: &str,
) -> ApplicationResult<Vec<String>> {
    let model = description.model();
    let unreachable = || DomainError::UnreachableTarget {
        tree_item_id: target_tree_item_id.to_string(),
        root: root_target_object_id.to_string(),
    };

    let mut node = model
        .object_for_tree_item(editing_context_id, target_tree_item_id)
        .ok_or_else(|| DomainError::UnknownTreeItem(target_tree_item_id.to_string()))?;

    let mut ancestors = Vec::new();
    let mut visited = HashSet::new();
    while !model.is_element(editing_context_id, root_target_object_id, &node) {
        let parent = model
            .parent_of(editing_context_id, &node)?
            .ok_or_else(unreachable)?;
        let parent_id = model.tree_item_id(editing_context_id, &parent)?;
        if !visited.insert(parent_id.clone()) {
            return Err(unreachable().into());
        }
        ancestors.push(parent_id);
        node = parent;
    }

    ancestors.reverse();
    debug!("{} ancestors above {}", ancestors.len(), target_tree_item_id);
    Ok(ancestors)
}

/// `path_to` followed by the target id and the ids of every descendant that
/// has children, depth-first in callback order.
///
/// Merged into an expansion set, the result reveals at most `max_depth`
/// levels below the target.
#[instrument(level = "debug", skip(description))]
pub fn expand_subtree(
    description: &TreeDescription,
    root_target_object_id: &str,
    target_tree_item_id: &str,
    editing_context_id: &str,
    max_depth: usize,
) -> ApplicationResult<Vec<String>> {
    let mut ids = path_to(
        description,
        root_target_object_id,
        target_tree_item_id,
        editing_context_id,
    )?;
    if max_depth == 0 {
        return Ok(ids);
    }

    let model = description.model();
    let target = model
        .object_for_tree_item(editing_context_id, target_tree_item_id)
        .ok_or_else(|| DomainError::UnknownTreeItem(target_tree_item_id.to_string()))?;
    ids.push(target_tree_item_id.to_string());

    // Children callbacks see the expansion accumulated so far
    let mut expanded: ExpansionSet = ids.iter().cloned().collect();
    let mut visited: HashSet<String> = expanded.iter().map(str::to_string).collect();
    let mut stack: Vec<(DomainNode, Option<String>, usize)> = vec![(target, None, 0)];

    while let Some((node, id, depth)) = stack.pop() {
        if let Some(id) = id {
            ids.push(id.clone());
            expanded.insert(id);
        }
        if depth + 1 >= max_depth {
            continue;
        }

        let mut next = Vec::new();
        for child in model.children_of(editing_context_id, &node, &expanded)? {
            if !description.accepts(editing_context_id, &child)
                || !model.has_children(editing_context_id, &child)
            {
                continue;
            }
            let Ok(child_id) = model.tree_item_id(editing_context_id, &child) else {
                continue;
            };
            if visited.insert(child_id.clone()) {
                next.push((child, Some(child_id), depth + 1));
            }
        }
        // Reverse so the first child is expanded first
        stack.extend(next.into_iter().rev());
    }

    Ok(ids)
}
