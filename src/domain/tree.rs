//! Materialized tree snapshots
//!
//! A `Tree` is produced fresh by every materialization and never mutated
//! afterwards; the next materialization supersedes it.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Text style applied to one label fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub foreground: Option<String>,
}

impl TextStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::default()
        }
    }

    pub fn with_foreground(mut self, color: impl Into<String>) -> Self {
        self.foreground = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelFragment {
    pub text: String,
    pub style: TextStyle,
}

/// Label made of styled fragments, rendered by concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyledLabel {
    pub fragments: Vec<LabelFragment>,
}

impl StyledLabel {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![LabelFragment {
                text: text.into(),
                style: TextStyle::default(),
            }],
        }
    }
}

impl fmt::Display for StyledLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            f.write_str(&fragment.text)?;
        }
        Ok(())
    }
}

/// Marker on an item whose subtree could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemError {
    CyclicHierarchy,
}

/// Where a representation takes layout data from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum LayoutSource {
    /// Layout travels inside the snapshot.
    #[default]
    Inline,
    /// Layout is served from a separate layout-data channel.
    SideChannel,
}

/// Typed capability flags declared by a tree description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepresentationCapabilities {
    pub layout_source: LayoutSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    pub id: String,
    pub object_id: String,
    pub kind: String,
    pub label: StyledLabel,
    pub icon_urls: Vec<String>,
    pub editable: bool,
    pub deletable: bool,
    pub selectable: bool,
    pub has_children: bool,
    pub expanded: bool,
    pub children: Vec<TreeItem>,
    pub error: Option<ItemError>,
}

impl TreeItem {
    /// Depth-first search for an item by id.
    pub fn find(&self, id: &str) -> Option<&TreeItem> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Pre-order iterator over this item and its materialized descendants.
    pub fn iter(&self) -> TreeItemIter<'_> {
        TreeItemIter { stack: vec![self] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    /// Snapshot id, minted per materialization.
    pub id: String,
    pub description_id: String,
    pub target_object_id: String,
    pub capabilities: RepresentationCapabilities,
    pub children: Vec<TreeItem>,
}

impl Tree {
    pub fn new(
        description_id: impl Into<String>,
        target_object_id: impl Into<String>,
        capabilities: RepresentationCapabilities,
        children: Vec<TreeItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description_id: description_id.into(),
            target_object_id: target_object_id.into(),
            capabilities,
            children,
        }
    }

    /// Structural equality, ignoring the minted snapshot id.
    pub fn same_content(&self, other: &Tree) -> bool {
        self.description_id == other.description_id
            && self.target_object_id == other.target_object_id
            && self.capabilities == other.capabilities
            && self.children == other.children
    }

    pub fn find(&self, id: &str) -> Option<&TreeItem> {
        self.children.iter().find_map(|item| item.find(id))
    }

    /// Pre-order iterator over every materialized item.
    pub fn items(&self) -> TreeItemIter<'_> {
        TreeItemIter {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct TreeItemIter<'a> {
    stack: Vec<&'a TreeItem>,
}

impl<'a> Iterator for TreeItemIter<'a> {
    type Item = &'a TreeItem;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        // Push children in reverse order for left-to-right traversal
        self.stack.extend(current.children.iter().rev());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, children: Vec<TreeItem>) -> TreeItem {
        TreeItem {
            id: id.to_string(),
            object_id: id.to_string(),
            kind: "Entity".to_string(),
            label: StyledLabel::plain(id),
            icon_urls: vec![],
            editable: true,
            deletable: true,
            selectable: true,
            has_children: !children.is_empty(),
            expanded: !children.is_empty(),
            children,
            error: None,
        }
    }

    #[test]
    fn test_same_content_ignores_snapshot_id() {
        let a = Tree::new("d", "t", Default::default(), vec![item("x", vec![])]);
        let b = Tree::new("d", "t", Default::default(), vec![item("x", vec![])]);
        assert_ne!(a.id, b.id);
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_items_preorder() {
        let tree = Tree::new(
            "d",
            "t",
            Default::default(),
            vec![item("a", vec![item("a1", vec![]), item("a2", vec![])]), item("b", vec![])],
        );
        let ids: Vec<_> = tree.items().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "a2", "b"]);
        assert!(tree.find("a2").is_some());
    }

    #[test]
    fn test_styled_label_display_concatenates() {
        let label = StyledLabel {
            fragments: vec![
                LabelFragment {
                    text: "[Entity] ".into(),
                    style: TextStyle::bold(),
                },
                LabelFragment {
                    text: "Person".into(),
                    style: TextStyle::default(),
                },
            ],
        };
        assert_eq!(label.to_string(), "[Entity] Person");
    }
}
