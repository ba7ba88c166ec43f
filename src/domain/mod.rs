//! Domain layer: tree model, codecs and identity
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod expansion;
pub mod identity;
pub mod representation;
pub mod rules;
pub mod tree;

pub use arena::{DomainGraph, ObjectData, ObjectNode};
pub use builder::{BuiltDocument, DocumentSpec, DomainGraphBuilder, ObjectSpec, ICON_PROPERTY};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use expansion::ExpansionSet;
pub use identity::{CanonicalPath, IdentityCodec};
pub use representation::{RepresentationIdentifier, DEFAULT_SCHEME};
pub use rules::{FragmentRule, FragmentSource, IconRule, LabelRule, Precondition};
pub use tree::{
    ItemError, LabelFragment, LayoutSource, RepresentationCapabilities, StyledLabel, TextStyle,
    Tree, TreeItem,
};
