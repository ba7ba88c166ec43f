//! Declarative rules of a tree description: preconditions, label styles, icons

use crate::domain::entities::DomainNode;
use crate::domain::tree::{LabelFragment, StyledLabel, TextStyle};

/// Predicate over a domain node.
///
/// `property` looks up a named property of the node through the domain
/// model adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Always,
    Never,
    KindIs(String),
    KindIn(Vec<String>),
    HasProperty(String),
    PropertyEquals { name: String, value: String },
    Not(Box<Precondition>),
}

impl Precondition {
    pub fn kind_is(kind: impl Into<String>) -> Self {
        Self::KindIs(kind.into())
    }

    pub fn holds(&self, node: &DomainNode, property: &dyn Fn(&str) -> Option<String>) -> bool {
        match self {
            Precondition::Always => true,
            Precondition::Never => false,
            Precondition::KindIs(kind) => &node.kind == kind,
            Precondition::KindIn(kinds) => kinds.iter().any(|k| k == &node.kind),
            Precondition::HasProperty(name) => property(name).is_some(),
            Precondition::PropertyEquals { name, value } => {
                property(name).as_deref() == Some(value.as_str())
            }
            Precondition::Not(inner) => !inner.holds(node, property),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSource {
    Literal(String),
    Property(String),
    ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRule {
    pub source: FragmentSource,
    pub style: TextStyle,
}

impl FragmentRule {
    pub fn literal(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            source: FragmentSource::Literal(text.into()),
            style,
        }
    }

    pub fn property(name: impl Into<String>, style: TextStyle) -> Self {
        Self {
            source: FragmentSource::Property(name.into()),
            style,
        }
    }
}

/// One link of the label precondition chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRule {
    pub name: String,
    pub precondition: Precondition,
    pub fragments: Vec<FragmentRule>,
}

impl LabelRule {
    pub fn new(name: impl Into<String>, precondition: Precondition, fragments: Vec<FragmentRule>) -> Self {
        Self {
            name: name.into(),
            precondition,
            fragments,
        }
    }

    /// Evaluate every fragment; a missing property renders as empty text.
    pub fn render(&self, node: &DomainNode, property: &dyn Fn(&str) -> Option<String>) -> StyledLabel {
        let fragments = self
            .fragments
            .iter()
            .map(|fragment| LabelFragment {
                text: match &fragment.source {
                    FragmentSource::Literal(text) => text.clone(),
                    FragmentSource::Property(name) => property(name).unwrap_or_default(),
                    FragmentSource::ObjectId => node.object_id.clone(),
                },
                style: fragment.style.clone(),
            })
            .collect();
        StyledLabel { fragments }
    }
}

/// First rule whose precondition holds wins.
pub fn select_label(
    rules: &[LabelRule],
    node: &DomainNode,
    property: &dyn Fn(&str) -> Option<String>,
) -> Option<StyledLabel> {
    rules
        .iter()
        .find(|rule| rule.precondition.holds(node, property))
        .map(|rule| rule.render(node, property))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRule {
    pub precondition: Precondition,
    pub icon_url: String,
}

impl IconRule {
    pub fn new(precondition: Precondition, icon_url: impl Into<String>) -> Self {
        Self {
            precondition,
            icon_url: icon_url.into(),
        }
    }
}

/// Icons of every matching rule, in rule order.
pub fn select_icons(
    rules: &[IconRule],
    node: &DomainNode,
    property: &dyn Fn(&str) -> Option<String>,
) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.precondition.holds(node, property))
        .map(|rule| rule.icon_url.clone())
        .collect()
}
