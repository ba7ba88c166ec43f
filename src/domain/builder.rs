//! Builds domain graphs from declarative TOML documents.
//!
//! ```toml
//! editing_context = "demo"
//!
//! [[objects]]
//! name = "Project"
//! kind = "Project"
//!
//! [[objects.children]]
//! name = "model.domain"
//! kind = "Resource"
//! ```

use std::collections::BTreeMap;

use generational_arena::Index;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::arena::{DomainGraph, ObjectData};
use crate::domain::error::{DomainError, DomainResult};

pub const ICON_PROPERTY: &str = "icon";

/// Top-level document layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentSpec {
    pub editing_context: String,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectSpec {
    /// Defaults to the `/`-joined name path
    pub id: Option<String>,
    pub name: String,
    pub kind: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<ObjectSpec>,
}

/// A built graph together with the editing context it belongs to.
#[derive(Debug)]
pub struct BuiltDocument {
    pub editing_context: String,
    pub graph: DomainGraph,
}

/// Constructs a `DomainGraph` from a document.
#[derive(Debug, Default)]
pub struct DomainGraphBuilder {
    graph: DomainGraph,
}

impl DomainGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and build a TOML document.
    #[instrument(level = "debug", skip(source))]
    pub fn from_toml(source: &str) -> DomainResult<BuiltDocument> {
        let doc: DocumentSpec = toml::from_str(source).map_err(|e| DomainError::InvalidDocument {
            message: e.message().to_string(),
        })?;
        Self::new().build(doc)
    }

    pub fn build(mut self, doc: DocumentSpec) -> DomainResult<BuiltDocument> {
        if doc.editing_context.trim().is_empty() {
            return Err(DomainError::InvalidDocument {
                message: "editing_context must not be empty".to_string(),
            });
        }

        // Explicit stack instead of recursion; children pushed in reverse so
        // insertion keeps document order
        let mut stack: Vec<(ObjectSpec, Option<(Index, String)>)> =
            doc.objects.into_iter().rev().map(|o| (o, None)).collect();

        while let Some((object, parent)) = stack.pop() {
            if object.name.trim().is_empty() || object.kind.trim().is_empty() {
                return Err(DomainError::InvalidDocument {
                    message: "objects need a non-empty name and kind".to_string(),
                });
            }

            let path = match &parent {
                Some((_, parent_path)) => format!("{parent_path}/{}", object.name),
                None => object.name.clone(),
            };
            let object_id = object.id.clone().unwrap_or_else(|| path.clone());

            let mut data = ObjectData::new(object_id, object.kind, object.name);
            data.properties = object.properties;
            if let Some(icon) = object.icon {
                data.properties.insert(ICON_PROPERTY.to_string(), icon);
            }

            let idx = self
                .graph
                .insert_object(data, parent.as_ref().map(|(idx, _)| *idx))?;

            for child in object.children.into_iter().rev() {
                stack.push((child, Some((idx, path.clone()))));
            }
        }

        debug!(
            "Built graph for '{}' with {} objects",
            doc.editing_context,
            self.graph.len()
        );
        Ok(BuiltDocument {
            editing_context: doc.editing_context,
            graph: self.graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
editing_context = "demo"

[[objects]]
name = "Project"
kind = "Project"

[[objects.children]]
name = "model.domain"
kind = "Resource"
icon = "/icons/Resource.svg"

[[objects.children.children]]
id = "person"
name = "Person"
kind = "Entity"
properties = { abstract = "false" }

[[objects.children]]
name = "notes"
kind = "Resource"
"#;

    #[test]
    fn test_builds_nested_objects_in_document_order() {
        let built = DomainGraphBuilder::from_toml(DOC).unwrap();
        assert_eq!(built.editing_context, "demo");

        let ids: Vec<_> = built
            .graph
            .iter()
            .map(|(_, n)| n.data.object_id.clone())
            .collect();
        assert_eq!(
            ids,
            vec!["Project", "Project/model.domain", "person", "Project/notes"]
        );

        let resource = built.graph.get_by_object_id("Project/model.domain").unwrap();
        assert_eq!(
            resource.data.properties.get(ICON_PROPERTY).map(String::as_str),
            Some("/icons/Resource.svg")
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let doc = r#"
editing_context = "demo"
[[objects]]
name = "a"
kind = "Resource"
[[objects]]
name = "a"
kind = "Resource"
"#;
        let result = DomainGraphBuilder::from_toml(doc);
        assert!(matches!(result, Err(DomainError::DuplicateObject(id)) if id == "a"));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let result = DomainGraphBuilder::from_toml("objects = 3");
        assert!(matches!(result, Err(DomainError::InvalidDocument { .. })));
    }
}
