//! Tree descriptions and their registry
//!
//! A description bundles the declarative rules of one kind of tree view with
//! the domain model adapter that answers its callbacks. Descriptions are
//! created at start-up and shared by every representation built from them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::rules::{select_icons, select_label};
use crate::domain::{
    CanonicalPath, DomainError, DomainNode, DomainResult, FragmentRule, IconRule, ItemFlags, LabelRule, Precondition,
    RepresentationCapabilities, StyledLabel, TextStyle, ICON_PROPERTY, LABEL_PROPERTY,
};
use crate::infrastructure::model::filesystem::{DIRECTORY_KIND, FILE_KIND};
use crate::infrastructure::traits::DomainModel;

pub const ENTITY_KIND: &str = "Entity";
pub const ATTRIBUTE_KIND: &str = "Attribute";
pub const RESOURCE_KIND: &str = "Resource";
pub const PROJECT_KIND: &str = "Project";

const ENTITY_COLOR: &str = "#c29e00";
const ATTRIBUTE_COLOR: &str = "#6584e2";

pub struct TreeDescription {
    id: String,
    name: String,
    message: String,
    /// Kind of root target the description opens on; any kind when `None`
    domain_type: Option<String>,
    item_precondition: Precondition,
    label_rules: Vec<LabelRule>,
    icon_rules: Vec<IconRule>,
    editable: Precondition,
    deletable: Precondition,
    selectable: Precondition,
    capabilities: RepresentationCapabilities,
    model: Arc<dyn DomainModel>,
}

impl fmt::Debug for TreeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeDescription")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model", &self.model.kind())
            .finish()
    }
}

impl TreeDescription {
    pub fn builder(name: impl Into<String>, model: Arc<dyn DomainModel>) -> TreeDescriptionBuilder {
        TreeDescriptionBuilder::new(name, model)
    }

    /// Project explorer: entity, attribute and default label styles, one icon per kind.
    pub fn explorer(model: Arc<dyn DomainModel>) -> Self {
        let label = || FragmentRule::property(LABEL_PROPERTY, TextStyle::default());
        Self::builder("Explorer", model)
            .message("Explorer")
            .label_rule(LabelRule::new(
                "entity",
                Precondition::kind_is(ENTITY_KIND),
                vec![
                    FragmentRule::literal(
                        "[Entity] ",
                        TextStyle::bold().with_foreground(ENTITY_COLOR),
                    ),
                    label(),
                ],
            ))
            .label_rule(LabelRule::new(
                "attribute",
                Precondition::kind_is(ATTRIBUTE_KIND),
                vec![
                    FragmentRule::literal(
                        "[Attribute] ",
                        TextStyle::italic().with_foreground(ATTRIBUTE_COLOR),
                    ),
                    label(),
                ],
            ))
            .label_rule(LabelRule::new("default", Precondition::Always, vec![label()]))
            .icon_rule(IconRule::new(Precondition::kind_is(PROJECT_KIND), "/icons/Project.svg"))
            .icon_rule(IconRule::new(Precondition::kind_is(RESOURCE_KIND), "/icons/Resource.svg"))
            .icon_rule(IconRule::new(Precondition::kind_is(ENTITY_KIND), "/icons/Entity.svg"))
            .icon_rule(IconRule::new(Precondition::kind_is(ATTRIBUTE_KIND), "/icons/Attribute.svg"))
            .deletable(Precondition::Not(Box::new(Precondition::kind_is(PROJECT_KIND))))
            .build()
    }

    /// Read-only view of a directory tree.
    pub fn filesystem(model: Arc<dyn DomainModel>) -> Self {
        Self::builder("Files", model)
            .message("Files")
            .label_rule(LabelRule::new(
                "directory",
                Precondition::kind_is(DIRECTORY_KIND),
                vec![FragmentRule::property(LABEL_PROPERTY, TextStyle::bold())],
            ))
            .label_rule(LabelRule::new(
                "file",
                Precondition::Always,
                vec![FragmentRule::property(LABEL_PROPERTY, TextStyle::default())],
            ))
            .icon_rule(IconRule::new(Precondition::kind_is(DIRECTORY_KIND), "/icons/Folder.svg"))
            .icon_rule(IconRule::new(Precondition::kind_is(FILE_KIND), "/icons/File.svg"))
            .editable(Precondition::Never)
            .deletable(Precondition::Never)
            .build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn domain_type(&self) -> Option<&str> {
        self.domain_type.as_deref()
    }

    pub fn capabilities(&self) -> RepresentationCapabilities {
        self.capabilities
    }

    pub fn model(&self) -> &dyn DomainModel {
        self.model.as_ref()
    }

    /// Checks that the description may open on `target_object_id`.
    ///
    /// The context root is always accepted. Any other target must exist and,
    /// when a domain type is declared, be of that kind.
    pub fn check_target(&self, editing_context_id: &str, target_object_id: &str) -> DomainResult<()> {
        let Some(expected) = self.domain_type.as_deref() else {
            return Ok(());
        };
        if target_object_id.is_empty() || target_object_id == editing_context_id {
            return Ok(());
        }
        match self.model.kind_of(editing_context_id, target_object_id) {
            Some(kind) if kind == expected => Ok(()),
            Some(_) => Err(DomainError::UnsupportedTarget {
                object_id: target_object_id.to_string(),
                expected: expected.to_string(),
            }),
            None => Err(DomainError::UnknownObject(target_object_id.to_string())),
        }
    }

    pub fn accepts(&self, editing_context_id: &str, node: &DomainNode) -> bool {
        let property = |name: &str| self.model.property(editing_context_id, node, name);
        self.item_precondition.holds(node, &property)
    }

    /// First matching label rule; else the `label` property; else the object id.
    pub fn label_for(&self, editing_context_id: &str, node: &DomainNode) -> StyledLabel {
        let property = |name: &str| self.model.property(editing_context_id, node, name);
        select_label(&self.label_rules, node, &property)
            .or_else(|| property(LABEL_PROPERTY).map(StyledLabel::plain))
            .unwrap_or_else(|| StyledLabel::plain(&node.object_id))
    }

    /// An explicit `icon` property overrides the icon rules.
    pub fn icons_for(&self, editing_context_id: &str, node: &DomainNode) -> Vec<String> {
        let property = |name: &str| self.model.property(editing_context_id, node, name);
        match property(ICON_PROPERTY) {
            Some(icon) => vec![icon],
            None => select_icons(&self.icon_rules, node, &property),
        }
    }

    pub fn flags_for(&self, editing_context_id: &str, node: &DomainNode) -> ItemFlags {
        let property = |name: &str| self.model.property(editing_context_id, node, name);
        ItemFlags {
            editable: self.editable.holds(node, &property),
            deletable: self.deletable.holds(node, &property),
            selectable: self.selectable.holds(node, &property),
        }
    }
}

pub struct TreeDescriptionBuilder {
    name: String,
    message: Option<String>,
    domain_type: Option<String>,
    item_precondition: Precondition,
    label_rules: Vec<LabelRule>,
    icon_rules: Vec<IconRule>,
    editable: Precondition,
    deletable: Precondition,
    selectable: Precondition,
    capabilities: RepresentationCapabilities,
    model: Arc<dyn DomainModel>,
}

impl TreeDescriptionBuilder {
    fn new(name: impl Into<String>, model: Arc<dyn DomainModel>) -> Self {
        Self {
            name: name.into(),
            message: None,
            domain_type: None,
            item_precondition: Precondition::Always,
            label_rules: Vec::new(),
            icon_rules: Vec::new(),
            editable: Precondition::Always,
            deletable: Precondition::Always,
            selectable: Precondition::Always,
            capabilities: RepresentationCapabilities::default(),
            model,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn domain_type(mut self, kind: impl Into<String>) -> Self {
        self.domain_type = Some(kind.into());
        self
    }

    pub fn item_precondition(mut self, precondition: Precondition) -> Self {
        self.item_precondition = precondition;
        self
    }

    pub fn label_rule(mut self, rule: LabelRule) -> Self {
        self.label_rules.push(rule);
        self
    }

    pub fn icon_rule(mut self, rule: IconRule) -> Self {
        self.icon_rules.push(rule);
        self
    }

    pub fn editable(mut self, precondition: Precondition) -> Self {
        self.editable = precondition;
        self
    }

    pub fn deletable(mut self, precondition: Precondition) -> Self {
        self.deletable = precondition;
        self
    }

    pub fn selectable(mut self, precondition: Precondition) -> Self {
        self.selectable = precondition;
        self
    }

    pub fn capabilities(mut self, capabilities: RepresentationCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn build(self) -> TreeDescription {
        let path = CanonicalPath::from_segments(["descriptions", self.name.as_str()]);
        TreeDescription {
            id: self.model.codec().id_of(&path),
            message: self.message.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            domain_type: self.domain_type,
            item_precondition: self.item_precondition,
            label_rules: self.label_rules,
            icon_rules: self.icon_rules,
            editable: self.editable,
            deletable: self.deletable,
            selectable: self.selectable,
            capabilities: self.capabilities,
            model: self.model,
        }
    }
}

/// Process-wide set of tree descriptions, looked up by id.
#[derive(Debug, Default)]
pub struct DescriptionRegistry {
    descriptions: RwLock<HashMap<String, Arc<TreeDescription>>>,
}

impl DescriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a description, replacing one with the same id. Returns its id.
    pub fn register(&self, description: TreeDescription) -> String {
        let id = description.id().to_string();
        debug!("Registering description '{}' as {}", description.name(), id);
        self.descriptions
            .write()
            .insert(id.clone(), Arc::new(description));
        id
    }

    pub fn get(&self, id: &str) -> ApplicationResult<Arc<TreeDescription>> {
        self.descriptions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ApplicationError::UnknownDescription(id.to_string()))
    }
}
