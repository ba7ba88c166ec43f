//! Representation identifiers: the opaque address of one tree view
//!
//! Format: `<scheme>://?treeDescriptionId=<d>&targetObjectId=<t>&expanded=[<e1>,<e2>]`
//!
//! Decoding never fails. Absent or malformed parameters decode to empty values.

use std::collections::BTreeMap;

use itertools::Itertools;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use tracing::instrument;

use crate::domain::expansion::ExpansionSet;
use crate::domain::identity::COMPONENT;

pub const DEFAULT_SCHEME: &str = "tree";
pub const TREE_DESCRIPTION_ID: &str = "treeDescriptionId";
pub const TARGET_OBJECT_ID: &str = "targetObjectId";
pub const EXPANDED: &str = "expanded";

/// Decoded query parameters. Repeated keys keep every value in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterValues {
    values: BTreeMap<String, Vec<String>>,
}

impl ParameterValues {
    /// All values for `key`, empty if absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse the query part of `input`.
///
/// The query is the text after the first `?` (all of `input` if there is none),
/// cut at `#`. Pairs split on the first `=`; a pair with a blank key or value
/// is dropped.
#[instrument(level = "trace")]
pub fn parse_query(input: &str) -> ParameterValues {
    let query = match input.split_once('?') {
        Some((_, query)) => query,
        None => input,
    };
    let query = query.split('#').next().unwrap_or_default();

    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.trim().is_empty() || value.trim().is_empty() {
            continue;
        }
        values
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }

    ParameterValues { values }
}

/// Split a bracketed list value (`[a,b,c]`) into its raw entries.
///
/// Anything that does not start with `[`, end with `]` and run longer than
/// three characters is not a list and yields no entries.
pub fn parameter_entries(value: &str) -> Vec<String> {
    if !(value.starts_with('[') && value.ends_with(']') && value.len() > 3) {
        return Vec::new();
    }
    let payload = &value[1..];
    let payload = match payload.find(']') {
        Some(end) => &payload[..end],
        None => payload,
    };
    payload.split(',').map(str::to_string).collect()
}

/// Percent-decode one component as UTF-8; `+` is a space.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Encode one expanded id so it survives the value-level decode and the
/// list split. A one-character result is written as an escaped byte, which
/// keeps a single-entry list longer than three characters.
fn encode_entry(id: &str) -> String {
    let inner = encode_component(id);
    let inner = if inner.len() == 1 {
        format!("%{:02X}", inner.as_bytes()[0])
    } else {
        inner
    };
    encode_component(&inner)
}

/// Decoded `{treeDescriptionId, rootTargetObjectId, expansionSet}` triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RepresentationIdentifier {
    pub description_id: String,
    pub target_object_id: String,
    pub expanded: ExpansionSet,
}

impl RepresentationIdentifier {
    pub fn new(
        description_id: impl Into<String>,
        target_object_id: impl Into<String>,
        expanded: ExpansionSet,
    ) -> Self {
        Self {
            description_id: description_id.into(),
            target_object_id: target_object_id.into(),
            expanded,
        }
    }

    /// Same description and target with a different expansion set.
    pub fn with_expanded(&self, expanded: ExpansionSet) -> Self {
        Self {
            expanded,
            ..self.clone()
        }
    }

    /// Decode a representation identifier. Never fails.
    pub fn decode(input: &str) -> Self {
        let parameters = parse_query(input);

        let expanded = parameters
            .get_all(EXPANDED)
            .iter()
            .flat_map(|value| parameter_entries(value))
            .map(|entry| decode_component(&entry))
            .filter(|id| !id.is_empty())
            .collect();

        Self {
            description_id: parameters
                .first(TREE_DESCRIPTION_ID)
                .unwrap_or_default()
                .to_string(),
            target_object_id: parameters
                .first(TARGET_OBJECT_ID)
                .unwrap_or_default()
                .to_string(),
            expanded,
        }
    }

    /// Encode with the given URI scheme. Empty ids are not addressable and are skipped.
    pub fn encode(&self, scheme: &str) -> String {
        let entries = self
            .expanded
            .iter()
            .filter(|id| !id.is_empty())
            .map(encode_entry)
            .join(",");

        format!(
            "{scheme}://?{TREE_DESCRIPTION_ID}={}&{TARGET_OBJECT_ID}={}&{EXPANDED}=[{entries}]",
            encode_component(&self.description_id),
            encode_component(&self.target_object_id),
        )
    }
}
